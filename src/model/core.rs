// 该文件是 Qianli （千里眼） 项目的一部分。
// src/model/core.rs - 模型核心定义
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

use std::sync::Arc;

use thiserror::Error;

use crate::model::{
  label::LabelTable,
  tensor::{InputTensor, OutputTensor},
};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 推理引擎：不透明的张量输入、张量输出函数
///
/// 引擎在进程启动时加载一次，之后由检测器持有。
pub trait InferenceEngine {
  type Error: std::error::Error + Send + Sync + 'static;

  fn forward(&self, input: &InputTensor) -> Result<OutputTensor, Self::Error>;
}

/// 单帧检测过程中的错误，只影响当前帧
#[derive(Error, Debug)]
pub enum DetectError {
  #[error("输出张量形状不匹配: 期望 {expected}, 实际 {actual:?}")]
  ShapeMismatch {
    expected: String,
    actual: Vec<usize>,
  },
  #[error("输入图像尺寸无效: {width}x{height}")]
  DegenerateInput { width: u32, height: u32 },
  #[error("检测配置无效: {0}")]
  InvalidConfig(String),
  #[error("推理引擎错误: {0}")]
  Engine(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// 轴对齐矩形，(x, y) 为左上角
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl Rect {
  pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  pub fn from_corners(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
    Self::new(x0, y0, x1 - x0, y1 - y0)
  }

  pub fn x_max(&self) -> f32 {
    self.x + self.width
  }

  pub fn y_max(&self) -> f32 {
    self.y + self.height
  }

  pub fn area(&self) -> f32 {
    self.width.max(0.0) * self.height.max(0.0)
  }

  pub fn intersection_area(&self, other: &Rect) -> f32 {
    let x0 = self.x.max(other.x);
    let y0 = self.y.max(other.y);
    let x1 = self.x_max().min(other.x_max());
    let y1 = self.y_max().min(other.y_max());
    (x1 - x0).max(0.0) * (y1 - y0).max(0.0)
  }

  /// 计算两个矩形的 IoU
  pub fn iou(&self, other: &Rect) -> f32 {
    let inter = self.intersection_area(other);
    let union = self.area() + other.area() - inter;
    if union > 0.0 { inter / union } else { 0.0 }
  }

  /// 裁剪到 [0, width] x [0, height]
  pub fn clip(&self, width: f32, height: f32) -> Rect {
    let x0 = self.x.clamp(0.0, width);
    let y0 = self.y.clamp(0.0, height);
    let x1 = self.x_max().clamp(0.0, width);
    let y1 = self.y_max().clamp(0.0, height);
    Rect::from_corners(x0, y0, x1, y1)
  }
}

/// 单个检测结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
  pub rect: Rect,
  /// 类别索引
  pub label: usize,
  /// 置信度
  pub prob: f32,
}

/// 一帧的检测结果
#[derive(Debug, Clone)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
  pub labels: Arc<LabelTable>,
}

impl DetectResult {
  pub fn new(items: Vec<Detection>, labels: Arc<LabelTable>) -> Self {
    Self {
      items: items.into_boxed_slice(),
      labels,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }

  pub fn label_name(&self, detection: &Detection) -> &str {
    self.labels.name(detection.label)
  }
}
