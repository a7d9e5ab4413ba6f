// 该文件是 Qianli （千里眼） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::{
  io::Write,
  path::{Path, PathBuf},
  sync::atomic::{AtomicU32, Ordering},
};

use chrono::Local;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::DetectResult,
  output::{DEFAULT_JPEG_QUALITY, Render, draw::Draw, save_jpeg},
  utils::{QueryParamError, parse_query_param, query_flag},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("参数错误: {0}")]
  QueryError(#[from] QueryParamError),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("记录序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 按时间戳命名，把每帧保存为 JPEG，可选写出同名 JSON 检测记录
///
/// `folder:///dir?quality=75&record&always&draw=false`
///
/// - `quality`: JPEG 质量，默认 75
/// - `record`: 同时写出 `.json` 检测记录
/// - `always`: 没有检测结果的帧也保存
/// - `draw`: 是否绘制检测框，默认绘制
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  quality: u8,
  draw: Option<Draw>,
  record: bool,
  always: bool,
  frame_counter: AtomicU32,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let quality = parse_query_param::<u8>(uri, "quality")?
      .unwrap_or(DEFAULT_JPEG_QUALITY)
      .clamp(1, 100);
    let draw = query_flag(uri, "draw")?.unwrap_or(true);

    let directory = PathBuf::from(uri.path());
    std::fs::create_dir_all(&directory)?;
    info!("记录目录: {}", directory.display());

    Ok(DirectoryRecordOutput {
      directory,
      quality,
      draw: draw.then(Draw::default),
      record: query_flag(uri, "record")?.unwrap_or(false),
      always: query_flag(uri, "always")?.unwrap_or(false),
      frame_counter: AtomicU32::new(0),
    })
  }
}

impl DirectoryRecordOutput {
  pub fn directory(&self) -> &Path {
    &self.directory
  }

  fn frame_path(&self) -> PathBuf {
    let id = self.frame_counter.fetch_add(1, Ordering::Relaxed);
    let now = Local::now();
    self
      .directory
      .join(format!("{}-{:04X}.jpg", now.format("%Y%m%d_%H%M%S"), id & 0xFFFF))
  }

  fn write_record(&self, path: &Path, frame: &Frame, result: &DetectResult) -> Result<(), DirectoryRecordOutputError> {
    let detections: Vec<_> = result
      .iter()
      .map(|det| {
        json!({
          "label": det.label,
          "name": result.label_name(det),
          "prob": det.prob,
          "rect": [det.rect.x, det.rect.y, det.rect.width, det.rect.height],
        })
      })
      .collect();
    let record = json!({
      "frame": frame.index,
      "timestamp_ms": frame.timestamp_ms,
      "width": frame.width(),
      "height": frame.height(),
      "detections": detections,
    });
    let file = std::fs::File::create(path.with_extension("json"))?;
    let mut writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &record)?;
    writer.flush()?;
    Ok(())
  }

  /// 先写记录再写图像；图像写入失败时删除已写出的记录，不留下半对文件
  fn save_frame(&self, path: &Path, frame: &Frame, result: &DetectResult) -> Result<(), DirectoryRecordOutputError> {
    if self.record {
      self.write_record(path, frame, result)?;
    }

    let saved = match &self.draw {
      Some(draw) => save_jpeg(path, &draw.render(&frame.image, result), self.quality),
      None => save_jpeg(path, &frame.image, self.quality),
    };
    if let Err(e) = saved {
      if self.record
        && let Err(remove) = std::fs::remove_file(path.with_extension("json"))
      {
        warn!("删除孤立记录 {} 失败: {}", path.with_extension("json").display(), remove);
      }
      return Err(e.into());
    }
    Ok(())
  }
}

impl Render<Frame, DetectResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &Frame, result: &DetectResult) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      debug!("第 {} 帧没有检测结果，跳过保存", frame.index);
      return Ok(());
    }

    let path = self.frame_path();
    self.save_frame(&path, frame, result)?;
    debug!("保存第 {} 帧到 {}", frame.index, path.display());
    Ok(())
  }
}
