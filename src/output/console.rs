// 该文件是 Qianli （千里眼） 项目的一部分。
// src/output/console.rs - 检测结果文本输出
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

use std::io::Write;

use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::{DetectResult, Detection, LabelTable},
  output::Render,
};

/// 单个检测结果的文本形式: `name: 87.50% at (x, y, wxh)`
pub fn format_detection(detection: &Detection, labels: &LabelTable) -> String {
  let rect = &detection.rect;
  format!(
    "{}: {:.2}% at ({:.0}, {:.0}, {:.0}x{:.0})",
    labels.name(detection.label),
    detection.prob * 100.0,
    rect.x,
    rect.y,
    rect.width,
    rect.height
  )
}

/// 逐行写出检测结果，不修改检测结果
pub fn report_detections<W: Write>(
  sink: &mut W,
  detections: &[Detection],
  labels: &LabelTable,
) -> std::io::Result<()> {
  for detection in detections {
    writeln!(sink, "{}", format_detection(detection, labels))?;
  }
  sink.flush()
}

#[derive(Error, Debug)]
pub enum ConsoleOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 将检测结果打印到标准输出
#[derive(Debug, Default)]
pub struct ConsoleOutput;

impl FromUrlWithScheme for ConsoleOutput {
  const SCHEME: &'static str = "console";
}

impl FromUrl for ConsoleOutput {
  type Error = ConsoleOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ConsoleOutputError::SchemeMismatch);
    }
    Ok(ConsoleOutput)
  }
}

impl Render<Frame, DetectResult> for ConsoleOutput {
  type Error = ConsoleOutputError;

  fn render_result(&self, frame: &Frame, result: &DetectResult) -> Result<(), Self::Error> {
    debug!("第 {} 帧检测到 {} 个物体", frame.index, result.len());
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    report_detections(&mut lock, &result.items, &result.labels)?;
    Ok(())
  }
}
