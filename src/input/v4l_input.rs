// 该文件是 Qianli （千里眼） 项目的一部分。
// src/input/v4l_input.rs - V4L 摄像头输入
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

use image::RgbImage;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;
use v4l::{
  Device, FourCC,
  buffer::Type,
  io::{mmap::Stream, traits::CaptureStream},
  video::Capture,
};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, swap_bgr_to_rgb, yuyv_to_rgb},
  utils::{QueryParamError, parse_query_param},
};

const DEFAULT_DEVICE: &str = "/dev/video0";
const DEFAULT_WIDTH: u32 = 1920;
const DEFAULT_HEIGHT: u32 = 1080;
const BUFFER_COUNT: u32 = 4;

#[derive(Error, Debug)]
pub enum V4lInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("参数错误: {0}")]
  QueryError(#[from] QueryParamError),
  #[error("不支持的像素格式: {0}")]
  UnsupportedPixelFormat(String),
  #[error("缓冲区大小 {actual} 与 {width}x{height} {format:?} 不符")]
  BufferSize {
    actual: usize,
    width: u32,
    height: u32,
    format: PixelFormat,
  },
  #[error("MJPG 解码错误: {0}")]
  DecodeError(#[from] image::ImageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
  #[default]
  Rgb3,
  Bgr3,
  Yuyv,
  Mjpg,
}

impl PixelFormat {
  fn fourcc(&self) -> FourCC {
    match self {
      PixelFormat::Rgb3 => FourCC::new(b"RGB3"),
      PixelFormat::Bgr3 => FourCC::new(b"BGR3"),
      PixelFormat::Yuyv => FourCC::new(b"YUYV"),
      PixelFormat::Mjpg => FourCC::new(b"MJPG"),
    }
  }

  /// 将一帧原始数据转换为 RGB 图像
  pub fn to_rgb_image(&self, data: &[u8], width: u32, height: u32) -> Result<RgbImage, V4lInputError> {
    let size_error = || V4lInputError::BufferSize {
      actual: data.len(),
      width,
      height,
      format: *self,
    };
    let pixels = (width * height) as usize;

    match self {
      PixelFormat::Rgb3 | PixelFormat::Bgr3 => {
        let mut rgb = data.get(..pixels * 3).ok_or_else(size_error)?.to_vec();
        if *self == PixelFormat::Bgr3 {
          swap_bgr_to_rgb(&mut rgb);
        }
        RgbImage::from_raw(width, height, rgb).ok_or_else(size_error)
      }
      PixelFormat::Yuyv => {
        let yuyv = data.get(..pixels * 2).ok_or_else(size_error)?;
        RgbImage::from_raw(width, height, yuyv_to_rgb(yuyv, width, height)).ok_or_else(size_error)
      }
      PixelFormat::Mjpg => {
        let image = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?;
        Ok(image.into_rgb8())
      }
    }
  }
}

impl FromStr for PixelFormat {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_uppercase().as_str() {
      "RGB3" | "RGB" => Ok(PixelFormat::Rgb3),
      "BGR3" | "BGR" => Ok(PixelFormat::Bgr3),
      "YUYV" => Ok(PixelFormat::Yuyv),
      "MJPG" | "MJPEG" => Ok(PixelFormat::Mjpg),
      _ => Err(s.to_string()),
    }
  }
}

/// V4L2 摄像头，默认 `/dev/video0`、1920x1080、RGB3
pub struct V4lInput {
  device_path: String,
  width: u32,
  height: u32,
  format: PixelFormat,
  stream: Stream<'static>,
  frame_index: u64,
}

impl FromUrlWithScheme for V4lInput {
  const SCHEME: &'static str = "v4l";
}

impl FromUrl for V4lInput {
  type Error = V4lInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(V4lInputError::SchemeMismatch);
    }

    // v4l:///dev/video0?width=1920&height=1080&format=RGB3
    let device_path = if url.path().is_empty() || url.path() == "/" {
      DEFAULT_DEVICE.to_string()
    } else {
      url.path().to_string()
    };
    let width = parse_query_param(url, "width")?.unwrap_or(DEFAULT_WIDTH);
    let height = parse_query_param(url, "height")?.unwrap_or(DEFAULT_HEIGHT);
    let format = match crate::utils::query_param(url, "format") {
      Some(value) => value
        .parse::<PixelFormat>()
        .map_err(V4lInputError::UnsupportedPixelFormat)?,
      None => PixelFormat::default(),
    };

    let device = Device::with_path(&device_path)?;
    let mut fmt = device.format()?;
    fmt.width = width;
    fmt.height = height;
    fmt.fourcc = format.fourcc();
    let fmt = device.set_format(&fmt)?;

    if fmt.fourcc != format.fourcc() {
      return Err(V4lInputError::UnsupportedPixelFormat(fmt.fourcc.to_string()));
    }
    if fmt.width != width || fmt.height != height {
      warn!(
        "摄像头不支持 {}x{}，实际分辨率 {}x{}",
        width, height, fmt.width, fmt.height
      );
    }

    let stream = Stream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)?;
    info!(
      "打开摄像头 {}: {}x{} {}",
      device_path, fmt.width, fmt.height, fmt.fourcc
    );

    Ok(V4lInput {
      device_path,
      width: fmt.width,
      height: fmt.height,
      format,
      stream,
      frame_index: 0,
    })
  }
}

impl V4lInput {
  pub fn device_path(&self) -> &str {
    &self.device_path
  }

  fn capture_frame(&mut self) -> Result<Frame, V4lInputError> {
    let (buf, _meta) = self.stream.next()?;
    let image = self.format.to_rgb_image(buf, self.width, self.height)?;
    let timestamp_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let frame = Frame::new(image, self.frame_index, timestamp_ms);
    self.frame_index += 1;
    Ok(frame)
  }
}

impl Iterator for V4lInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    match self.capture_frame() {
      Ok(frame) => Some(frame),
      Err(e) => {
        error!("采集帧失败: {}", e);
        None
      }
    }
  }
}
