// 该文件是 Qianli （千里眼） 项目的一部分。
// src/model/label.rs - 类别名称表
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

use std::path::Path;

use tracing::{info, warn};

/// 超出类别表范围的标签显示为该名称
pub const UNKNOWN_LABEL: &str = "unknown";

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

/// 按索引排列的类别名称表
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTable {
  names: Vec<String>,
}

impl Default for LabelTable {
  fn default() -> Self {
    Self::coco()
  }
}

impl LabelTable {
  pub fn coco() -> Self {
    Self::from_names(COCO_CLASSES.iter().map(|s| s.to_string()).collect())
  }

  pub fn from_names(names: Vec<String>) -> Self {
    Self { names }
  }

  /// 从文本文件读取类别名称，每行一个，忽略空行
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let names: Vec<String> = content
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty())
      .map(str::to_string)
      .collect();
    info!("从 {} 加载 {} 个类别名称", path.display(), names.len());
    Ok(Self::from_names(names))
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn get(&self, label: usize) -> Option<&str> {
    self.names.get(label).map(String::as_str)
  }

  /// 类别名称；越界的索引返回 [`UNKNOWN_LABEL`]
  pub fn name(&self, label: usize) -> &str {
    match self.get(label) {
      Some(name) => name,
      None => {
        warn!("类别索引 {} 超出类别表范围 ({})", label, self.len());
        UNKNOWN_LABEL
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn coco_table_has_eighty_classes() {
    let labels = LabelTable::coco();
    assert_eq!(labels.len(), 80);
    assert_eq!(labels.name(0), "person");
    assert_eq!(labels.name(79), "toothbrush");
  }

  #[test]
  fn out_of_range_label_is_unknown() {
    let labels = LabelTable::coco();
    assert_eq!(labels.name(80), UNKNOWN_LABEL);
    assert_eq!(labels.name(usize::MAX), UNKNOWN_LABEL);
    assert_eq!(labels.get(80), None);
  }

  #[test]
  fn labels_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "cat\n\n  dog  \nbird").unwrap();
    let labels = LabelTable::from_file(file.path()).unwrap();
    assert_eq!(labels.len(), 3);
    assert_eq!(labels.name(1), "dog");
  }
}
