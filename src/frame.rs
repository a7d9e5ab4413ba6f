// 该文件是 Qianli （千里眼） 项目的一部分。
// src/frame.rs - 帧定义
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

use image::RgbImage;

/// 帧数据
#[derive(Debug, Clone)]
pub struct Frame {
  /// RGB 图像数据，采集后不再修改
  pub image: RgbImage,
  /// 帧索引
  pub index: u64,
  /// 时间戳（毫秒）
  pub timestamp_ms: u64,
}

impl Frame {
  pub fn new(image: RgbImage, index: u64, timestamp_ms: u64) -> Self {
    Self {
      image,
      index,
      timestamp_ms,
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

impl From<RgbImage> for Frame {
  fn from(image: RgbImage) -> Self {
    Frame::new(image, 0, 0)
  }
}

/// 将 BGR 排列的像素数据原地转换为 RGB
pub fn swap_bgr_to_rgb(data: &mut [u8]) {
  for pixel in data.chunks_exact_mut(3) {
    pixel.swap(0, 2);
  }
}

/// 将 YUYV 格式转换为 RGB
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Vec<u8> {
  let mut rgb = Vec::with_capacity((width * height * 3) as usize);

  for chunk in yuyv.chunks_exact(4) {
    let y0 = chunk[0] as f32;
    let u = chunk[1] as f32 - 128.0;
    let y1 = chunk[2] as f32;
    let v = chunk[3] as f32 - 128.0;

    for y in [y0, y1] {
      let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
      let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
      let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
      rgb.extend_from_slice(&[r, g, b]);
    }
  }

  rgb
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bgr_swap_reverses_channels() {
    let mut data = vec![1, 2, 3, 4, 5, 6];
    swap_bgr_to_rgb(&mut data);
    assert_eq!(data, vec![3, 2, 1, 6, 5, 4]);
  }

  #[test]
  fn yuyv_gray_stays_gray() {
    // u = v = 128 没有色度分量
    let rgb = yuyv_to_rgb(&[100, 128, 200, 128], 2, 1);
    assert_eq!(rgb, vec![100, 100, 100, 200, 200, 200]);
  }

  #[test]
  fn frame_from_image_has_zero_index() {
    let frame = Frame::from(RgbImage::new(4, 3));
    assert_eq!(frame.index, 0);
    assert_eq!((frame.width(), frame.height()), (4, 3));
  }
}
