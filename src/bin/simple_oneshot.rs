// 该文件是 Qianli （千里眼） 项目的一部分。
// src/bin/simple_oneshot.rs - 单帧检测
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use qianli::{
  FromUrl,
  input::InputWrapper,
  model::Yolo11Builder,
  output::OutputWrapper,
  task::{OneShotTask, Task},
};
use tracing::info;

/// Qianli 单帧检测参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型，例如 yolo11:///models/yolo11n.onnx?threshold=0.5
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，例如 image:///tmp/in.jpg 或 v4l:///dev/video0
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出，例如 console:// 或 image:///tmp/out.jpg
  #[arg(long, value_name = "OUTPUT", default_value = "console://")]
  pub output: Url,
  /// 覆盖模型 URL 中的置信度阈值
  #[arg(long, value_name = "CONFIDENCE")]
  pub confidence: Option<f32>,
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

  OneShotTask.run_task(input, model, output)?;

  Ok(())
}
