// 该文件是 Qianli （千里眼） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use crate::model::core::Detection;

/// 按类别进行贪心非极大值抑制
///
/// 置信度降序排列后，同一类别中与已保留框 IoU 不低于 `iou_threshold` 的框被丢弃。
pub fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
  detections.sort_by(|a, b| b.prob.total_cmp(&a.prob));

  let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
  for det in detections {
    let suppressed = kept
      .iter()
      .any(|k| k.label == det.label && k.rect.iou(&det.rect) >= iou_threshold);
    if !suppressed {
      kept.push(det);
    }
  }
  kept
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::core::Rect;

  fn det(x: f32, label: usize, prob: f32) -> Detection {
    Detection {
      rect: Rect::new(x, 0.0, 10.0, 10.0),
      label,
      prob,
    }
  }

  #[test]
  fn overlapping_same_class_keeps_best() {
    let kept = nms(vec![det(0.0, 0, 0.6), det(1.0, 0, 0.9), det(50.0, 0, 0.3)], 0.45);
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].prob, 0.9);
    assert_eq!(kept[1].prob, 0.3);
  }

  #[test]
  fn different_classes_do_not_suppress_each_other() {
    let kept = nms(vec![det(0.0, 0, 0.6), det(0.0, 1, 0.9)], 0.45);
    assert_eq!(kept.len(), 2);
  }

  #[test]
  fn low_overlap_survives() {
    // IoU = 50 / 150
    let kept = nms(vec![det(0.0, 0, 0.6), det(5.0, 0, 0.9)], 0.45);
    assert_eq!(kept.len(), 2);
  }
}
