// 该文件是 Qianli （千里眼） 项目的一部分。
// src/bin/simple_continueshot.rs - 连续检测
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

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use url::Url;

use qianli::{
  FromUrl,
  input::InputWrapper,
  model::Yolo11Builder,
  output::OutputWrapper,
  task::ContinuousTask,
};
use tracing::info;

/// Qianli 连续检测参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型，例如 yolo11:///models/yolo11n.onnx?threshold=0.5&nms=0.45
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，例如 v4l:///dev/video0?width=1920&height=1080&format=RGB3
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出，例如 folder:///var/lib/qianli?quality=75&record
  #[arg(long, value_name = "OUTPUT", default_value = "console://")]
  pub output: Url,
  /// 覆盖模型 URL 中的置信度阈值
  #[arg(long, value_name = "CONFIDENCE")]
  pub confidence: Option<f32>,
  /// 处理的最大帧数
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
  /// 两帧之间的间隔（毫秒）
  #[arg(long, value_name = "INTERVAL_MS")]
  pub interval_ms: Option<u64>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = InputWrapper::from_url(&args.input)?;
  let mut builder = Yolo11Builder::from_url(&args.model)?;
  if let Some(confidence) = args.confidence {
    builder = builder.confidence(confidence);
  }
  let model = builder.build()?;
  let output = OutputWrapper::from_url(&args.output)?;

  let summary = ContinuousTask::default()
    .with_frame_number(args.frame_number)
    .with_interval(args.interval_ms.map(Duration::from_millis))
    .with_ctrlc_handler()
    .run(input, model, output)?;
  info!("共处理 {} 帧, 失败 {} 帧", summary.processed, summary.failed);

  Ok(())
}
