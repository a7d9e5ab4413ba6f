// 该文件是 Qianli （千里眼） 项目的一部分。
// src/model/proposal.rs - 候选框生成
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

use tracing::debug;

use crate::model::{
  core::{DetectError, Detection, Rect},
  dfl::decode_edges,
  tensor::OutputTensor,
};

/// 在类别分数切片中找出最大值及其索引，相同分数取第一个
fn arg_max(scores: &[f32]) -> (usize, f32) {
  let mut best = (0usize, f32::NEG_INFINITY);
  for (idx, &score) in scores.iter().enumerate() {
    if score > best.1 {
      best = (idx, score);
    }
  }
  best
}

/// 遍历输出网格，为每个分数不低于阈值的网格单元生成一个候选框
///
/// 类别分数直接与阈值比较，不做任何激活；这是模型训练时的约定。
/// 边框分布则经过 softmax 期望解码。两者的处理方式不同，不要把类别分数归一化。
///
/// 返回的坐标位于填充后的网络输入空间，单位为像素。此处不做重叠抑制。
pub fn generate_proposals(
  tensor: &OutputTensor,
  prob_threshold: f32,
  stride: u32,
  bins: usize,
) -> Result<Vec<Detection>, DetectError> {
  if bins == 0 {
    return Err(DetectError::InvalidConfig("bin 数必须为正数".to_string()));
  }
  let num_classes = tensor.num_classes(bins)?;
  let box_channels = 4 * bins;
  let stride = stride as f32;

  debug!(
    "输出网格 {}x{}, 类别数 {}, 阈值 {}",
    tensor.grid_y(),
    tensor.grid_x(),
    num_classes,
    prob_threshold
  );

  let mut proposals = Vec::new();
  for i in 0..tensor.grid_y() {
    for j in 0..tensor.grid_x() {
      let cell = tensor
        .cell(i, j)
        .ok_or_else(|| DetectError::ShapeMismatch {
          expected: format!("连续存储的网格单元 ({}, {})", i, j),
          actual: tensor.shape(),
        })?;

      let (label, score) = arg_max(&cell[box_channels..]);
      if score < prob_threshold {
        continue;
      }

      let [d_left, d_top, d_right, d_bottom] = decode_edges(&cell[..box_channels], bins);

      let cx = j as f32 + 0.5;
      let cy = i as f32 + 0.5;
      let x0 = (cx - d_left) * stride;
      let y0 = (cy - d_top) * stride;
      let x1 = (cx + d_right) * stride;
      let y1 = (cy + d_bottom) * stride;

      proposals.push(Detection {
        rect: Rect::from_corners(x0, y0, x1, y1),
        label,
        prob: score,
      });
    }
  }

  debug!("生成 {} 个候选框", proposals.len());
  Ok(proposals)
}
