// 该文件是 Qianli （千里眼） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect as PixelRect};

use crate::model::{DetectResult, Detection};

const BORDER_THICKNESS: u32 = 2;

/// 按类别着色的边框绘制
#[derive(Debug, Clone)]
pub struct Draw {
  thickness: u32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      thickness: BORDER_THICKNESS,
    }
  }
}

/// 类别颜色，色相按黄金分割角度分布，饱和度和亮度固定
pub fn label_color(label: usize) -> Rgb<u8> {
  let hue = (label as f32 * 137.508) % 360.0;
  let (s, v) = (0.85f32, 0.95f32);
  let c = v * s;
  let x = c * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;
  let (r, g, b) = match (hue / 60.0) as u32 {
    0 => (c, x, 0.0),
    1 => (x, c, 0.0),
    2 => (0.0, c, x),
    3 => (0.0, x, c),
    4 => (x, 0.0, c),
    _ => (c, 0.0, x),
  };
  let to_u8 = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
  Rgb([to_u8(r), to_u8(g), to_u8(b)])
}

impl Draw {
  pub fn with_thickness(mut self, thickness: u32) -> Self {
    self.thickness = thickness.max(1);
    self
  }

  // 坐标为原图像素，超出部分裁掉
  fn draw_box(&self, image: &mut RgbImage, detection: &Detection) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    let rect = &detection.rect;
    if rect.x_max() < 0.0 || rect.y_max() < 0.0 || rect.x >= w as f32 || rect.y >= h as f32 {
      return;
    }
    let x_min = (rect.x.floor() as i32).clamp(0, w - 1);
    let y_min = (rect.y.floor() as i32).clamp(0, h - 1);
    let x_max = (rect.x_max().ceil() as i32).clamp(0, w - 1);
    let y_max = (rect.y_max().ceil() as i32).clamp(0, h - 1);

    let color = label_color(detection.label);
    for t in 0..self.thickness as i32 {
      let width = x_max - x_min - 2 * t + 1;
      let height = y_max - y_min - 2 * t + 1;
      if width <= 0 || height <= 0 {
        break;
      }
      let outline = PixelRect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, outline, color);
    }
  }

  pub fn draw_detections(&self, image: &mut RgbImage, result: &DetectResult) {
    if image.width() == 0 || image.height() == 0 {
      return;
    }
    for detection in result.iter() {
      self.draw_box(image, detection);
    }
  }

  /// 复制原图并绘制检测框
  pub fn render(&self, image: &RgbImage, result: &DetectResult) -> RgbImage {
    let mut image = image.clone();
    self.draw_detections(&mut image, result);
    image
  }
}
