// 该文件是 Qianli （千里眼） 项目的一部分。
// src/model/letterbox.rs - 等比缩放与填充 (letterbox)
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

use image::{Rgb, RgbImage, imageops::FilterType};
use ndarray::Array3;
use tracing::debug;

use crate::model::{
  core::{DetectError, Detection, Rect},
  tensor::InputTensor,
};

/// 填充区域的像素值
pub const LETTERBOX_FILL: u8 = 114;

/// 一张输入图像的 letterbox 方案，创建后不再修改
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxPlan {
  pub scale: f32,
  pub pad_top: u32,
  pub pad_bottom: u32,
  pub pad_left: u32,
  pub pad_right: u32,
  pub network_size: u32,
  /// 缩放后（未填充）的宽度
  pub resized_width: u32,
  /// 缩放后（未填充）的高度
  pub resized_height: u32,
}

impl LetterboxPlan {
  /// 计算缩放比例和对齐到 `stride` 倍数的对称填充
  ///
  /// 长边缩放到 `target_size`，短边按比例缩放后向上补齐到 `stride` 的倍数，
  /// 填充在两侧平分，前侧向下取整。
  pub fn new(img_w: u32, img_h: u32, target_size: u32, stride: u32) -> Result<Self, DetectError> {
    if img_w == 0 || img_h == 0 {
      return Err(DetectError::DegenerateInput {
        width: img_w,
        height: img_h,
      });
    }
    if target_size == 0 || stride == 0 {
      return Err(DetectError::InvalidConfig(format!(
        "目标尺寸 {} 与步长 {} 必须为正数",
        target_size, stride
      )));
    }

    let scale = target_size as f32 / img_w.max(img_h) as f32;
    let resized_width = ((img_w as f32 * scale).round() as u32).max(1);
    let resized_height = ((img_h as f32 * scale).round() as u32).max(1);

    let wpad = resized_width.div_ceil(stride) * stride - resized_width;
    let hpad = resized_height.div_ceil(stride) * stride - resized_height;

    let plan = LetterboxPlan {
      scale,
      pad_top: hpad / 2,
      pad_bottom: hpad - hpad / 2,
      pad_left: wpad / 2,
      pad_right: wpad - wpad / 2,
      network_size: target_size,
      resized_width,
      resized_height,
    };
    debug!("letterbox 方案: {}x{} -> {:?}", img_w, img_h, plan);
    Ok(plan)
  }

  pub fn padded_width(&self) -> u32 {
    self.pad_left + self.resized_width + self.pad_right
  }

  pub fn padded_height(&self) -> u32 {
    self.pad_top + self.resized_height + self.pad_bottom
  }

  /// 原图坐标映射到填充后的网络输入坐标
  pub fn forward_rect(&self, rect: &Rect) -> Rect {
    Rect::new(
      rect.x * self.scale + self.pad_left as f32,
      rect.y * self.scale + self.pad_top as f32,
      rect.width * self.scale,
      rect.height * self.scale,
    )
  }

  /// 网络输入坐标映射回原图坐标：先去填充，再除以缩放比例
  pub fn unmap_rect(&self, rect: &Rect) -> Rect {
    Rect::new(
      (rect.x - self.pad_left as f32) / self.scale,
      (rect.y - self.pad_top as f32) / self.scale,
      rect.width / self.scale,
      rect.height / self.scale,
    )
  }

  pub fn unmap(&self, detection: &mut Detection) {
    detection.rect = self.unmap_rect(&detection.rect);
  }

  /// 缩放、填充并归一化为 CHW 浮点张量
  pub fn apply(&self, image: &RgbImage) -> InputTensor {
    let resized = if image.dimensions() == (self.resized_width, self.resized_height) {
      image.clone()
    } else {
      image::imageops::resize(
        image,
        self.resized_width,
        self.resized_height,
        FilterType::Triangle,
      )
    };

    let mut canvas = RgbImage::from_pixel(
      self.padded_width(),
      self.padded_height(),
      Rgb([LETTERBOX_FILL; 3]),
    );
    image::imageops::replace(
      &mut canvas,
      &resized,
      self.pad_left as i64,
      self.pad_top as i64,
    );

    let (width, height) = canvas.dimensions();
    let data = Array3::from_shape_fn((3, height as usize, width as usize), |(c, y, x)| {
      canvas.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    });

    InputTensor::from_array(data)
  }
}
