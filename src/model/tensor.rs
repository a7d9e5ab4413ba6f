// 该文件是 Qianli （千里眼） 项目的一部分。
// src/model/tensor.rs - 输入输出张量
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

use std::str::FromStr;

use ndarray::{Array3, ArrayViewD, Axis, Ix3, s};

use crate::model::core::DetectError;

/// 引擎输出张量（去掉批次维度后）的排列方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
  /// (channels, grid_y, grid_x)
  #[default]
  Nchw,
  /// (grid_y, grid_x, channels)
  Nhwc,
}

impl FromStr for TensorLayout {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "nchw" | "chw" => Ok(TensorLayout::Nchw),
      "nhwc" | "hwc" => Ok(TensorLayout::Nhwc),
      _ => Err(format!("未知的张量排列: {}", s)),
    }
  }
}

/// 网络输入张量，CHW 排列，数值范围 [0, 1]
#[derive(Debug, Clone)]
pub struct InputTensor {
  data: Array3<f32>,
}

impl InputTensor {
  pub fn from_array(data: Array3<f32>) -> Self {
    Self { data }
  }

  pub fn channels(&self) -> usize {
    self.data.dim().0
  }

  pub fn height(&self) -> usize {
    self.data.dim().1
  }

  pub fn width(&self) -> usize {
    self.data.dim().2
  }

  pub fn get(&self, c: usize, y: usize, x: usize) -> Option<f32> {
    self.data.get((c, y, x)).copied()
  }

  pub fn as_array(&self) -> &Array3<f32> {
    &self.data
  }
}

/// 网络输出张量，(grid_y, grid_x, channels) 排列
///
/// 每个网格单元的通道布局为 `4 * bins` 个边框分布值，随后是 `num_classes` 个类别分数。
#[derive(Debug, Clone)]
pub struct OutputTensor {
  data: Array3<f32>,
}

impl OutputTensor {
  pub fn from_array(data: Array3<f32>) -> Self {
    let data = if data.is_standard_layout() {
      data
    } else {
      data.as_standard_layout().into_owned()
    };
    Self { data }
  }

  pub fn from_shape_vec(
    grid_y: usize,
    grid_x: usize,
    channels: usize,
    data: Vec<f32>,
  ) -> Result<Self, DetectError> {
    let len = data.len();
    let data =
      Array3::from_shape_vec((grid_y, grid_x, channels), data).map_err(|_| {
        DetectError::ShapeMismatch {
          expected: format!("{} 个元素 ({}x{}x{})", grid_y * grid_x * channels, grid_y, grid_x, channels),
          actual: vec![len],
        }
      })?;
    Ok(Self { data })
  }

  /// 由通道优先 (channels, grid_y, grid_x) 的数组构造
  pub fn from_channels_first(data: Array3<f32>) -> Self {
    Self::from_array(data.permuted_axes([1, 2, 0]))
  }

  pub fn from_layout(data: Array3<f32>, layout: TensorLayout) -> Self {
    match layout {
      TensorLayout::Nchw => Self::from_channels_first(data),
      TensorLayout::Nhwc => Self::from_array(data),
    }
  }

  /// 由引擎给出的任意维数组构造
  ///
  /// 接受 `(1, a, b, c)` 或 `(a, b, c)`，批次大于 1 或其他维数均视为形状错误。
  pub fn from_dyn(data: ArrayViewD<'_, f32>, layout: TensorLayout) -> Result<Self, DetectError> {
    let shape_error = || DetectError::ShapeMismatch {
      expected: "(1, a, b, c) 或 (a, b, c)".to_string(),
      actual: data.shape().to_vec(),
    };
    let unbatched = match data.ndim() {
      4 if data.shape()[0] == 1 => data.index_axis(Axis(0), 0),
      3 => data.view(),
      _ => return Err(shape_error()),
    };
    let unbatched = unbatched
      .into_dimensionality::<Ix3>()
      .map_err(|_| shape_error())?;
    Ok(Self::from_layout(unbatched.to_owned(), layout))
  }

  pub fn grid_y(&self) -> usize {
    self.data.dim().0
  }

  pub fn grid_x(&self) -> usize {
    self.data.dim().1
  }

  pub fn channels(&self) -> usize {
    self.data.dim().2
  }

  pub fn shape(&self) -> Vec<usize> {
    self.data.shape().to_vec()
  }

  pub fn get(&self, i: usize, j: usize, c: usize) -> Option<f32> {
    self.data.get((i, j, c)).copied()
  }

  /// 第 i 行、第 j 列网格单元的全部通道
  pub fn cell(&self, i: usize, j: usize) -> Option<&[f32]> {
    if i >= self.grid_y() || j >= self.grid_x() {
      return None;
    }
    self.data.slice(s![i, j, ..]).to_slice()
  }

  /// 根据边框分布的 bin 数推算类别数
  pub fn num_classes(&self, bins: usize) -> Result<usize, DetectError> {
    let box_channels = 4 * bins;
    if self.channels() <= box_channels {
      return Err(DetectError::ShapeMismatch {
        expected: format!("通道数大于 4 x {} = {}", bins, box_channels),
        actual: self.shape(),
      });
    }
    Ok(self.channels() - box_channels)
  }
}
