// 该文件是 Qianli （千里眼） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::DetectResult,
  output::{DEFAULT_JPEG_QUALITY, Render, draw::Draw, is_jpeg_path, save_jpeg},
  utils::{QueryParamError, parse_query_param},
};

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("参数错误: {0}")]
  QueryError(#[from] QueryParamError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 将绘制了检测框的图像保存到单个文件，每帧覆盖
pub struct SaveImageFileOutput {
  path: PathBuf,
  quality: u8,
  draw: Draw,
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let quality = parse_query_param::<u8>(uri, "quality")?
      .unwrap_or(DEFAULT_JPEG_QUALITY)
      .clamp(1, 100);

    Ok(SaveImageFileOutput {
      path: PathBuf::from(uri.path()),
      quality,
      draw: Draw::default(),
    })
  }
}

impl SaveImageFileOutput {
  fn save_image(&self, image: &RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    if is_jpeg_path(&self.path) {
      save_jpeg(&self.path, image, self.quality)?;
    } else {
      image.save(&self.path)?;
    }

    info!("保存图像到文件: {}", self.path.display());

    Ok(())
  }
}

impl Render<Frame, DetectResult> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &Frame, result: &DetectResult) -> Result<(), Self::Error> {
    let image = self.draw.render(&frame.image, result);
    self.save_image(&image)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::model::LabelTable;

  #[test]
  fn saves_jpeg_into_nested_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("out.jpg");
    let url = Url::parse(&format!("image://{}?quality=90", path.display())).unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();

    let frame = Frame::from(RgbImage::new(16, 8));
    let result = DetectResult::new(Vec::new(), Arc::new(LabelTable::coco()));
    output.render_result(&frame, &result).unwrap();

    let saved = image::open(&path).unwrap();
    assert_eq!((saved.width(), saved.height()), (16, 8));
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("folder:///tmp/out").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::SchemeMismatch(_))
    ));
  }
}
