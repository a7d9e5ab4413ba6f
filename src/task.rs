// 该文件是 Qianli （千里眼） 项目的一部分。
// src/task.rs - 任务调度
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
  sync::mpsc::{Receiver, channel},
  thread,
  time::Duration,
};
use tracing::{error, info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 处理单帧：取一帧、推理、输出，任何错误都直接返回
pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = std::time::Instant::now();
    let result = model.infer(&frame)?;
    let elapsed = now.elapsed();
    info!("推理完成，耗时: {:.2?}", elapsed);
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 连续处理帧，直到输入耗尽、达到指定帧数或收到中断信号
///
/// 单帧的推理或输出错误只记录日志，随后继续处理下一帧。
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  interval: Option<Duration>,
  ctrlc: bool,
}

/// 一次连续任务的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ContinuousSummary {
  pub processed: usize,
  pub failed: usize,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 两帧之间的等待时间
  pub fn with_interval(mut self, interval: Option<Duration>) -> Self {
    self.interval = interval;
    self
  }

  /// 注册 Ctrl-C 处理，收到信号后在帧之间退出
  pub fn with_ctrlc_handler(mut self) -> Self {
    self.ctrlc = true;
    self
  }

  fn install_ctrlc(&self) -> anyhow::Result<Option<Receiver<()>>> {
    if !self.ctrlc {
      return Ok(None);
    }
    let (tx, rx) = channel();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
    Ok(Some(rx))
  }

  /// 运行任务并返回统计
  pub fn run<F, D, ME, RE, I, M, O>(self, input: I, model: M, output: O) -> anyhow::Result<ContinuousSummary>
  where
    ME: std::error::Error + Sync + Send + 'static,
    RE: std::error::Error + Sync + Send + 'static,
    I: Iterator<Item = F>,
    M: Model<Input = F, Output = D, Error = ME>,
    O: Render<F, D, Error = RE>,
  {
    info!("开始任务...");
    let rx = self.install_ctrlc()?;

    let mut summary = ContinuousSummary::default();
    let mut frame_index = 0usize;
    for frame in input {
      frame_index = frame_index.wrapping_add(1);
      info!("处理第 {} 帧图像", frame_index);

      let now = std::time::Instant::now();
      match model.infer(&frame) {
        Ok(result) => {
          let elapsed_a = now.elapsed();
          match output.render_result(&frame, &result) {
            Ok(()) => {
              summary.processed += 1;
              info!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, now.elapsed());
            }
            Err(e) => {
              summary.failed += 1;
              error!("第 {} 帧输出失败: {}", frame_index, e);
            }
          }
        }
        Err(e) => {
          summary.failed += 1;
          error!("第 {} 帧推理失败，跳过: {}", frame_index, e);
        }
      }

      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.as_ref().is_some_and(|rx| rx.try_recv().is_ok()) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
      if let Some(interval) = self.interval {
        thread::sleep(interval);
      }
    }

    info!(
      "任务完成，退出: 成功 {} 帧, 失败 {} 帧",
      summary.processed, summary.failed
    );
    Ok(summary)
  }
}

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    self.run(input, model, output).map(|_| ())
  }
}
