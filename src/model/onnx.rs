// 该文件是 Qianli （千里眼） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 推理引擎
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

use std::{path::Path, sync::Mutex};

use ndarray::Axis;
use ort::{
  execution_providers::CPUExecutionProvider,
  session::{Session, builder::GraphOptimizationLevel},
  value::Value,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{
  core::InferenceEngine,
  tensor::{InputTensor, OutputTensor, TensorLayout},
};

#[derive(Error, Debug)]
pub enum OrtEngineError {
  #[error("模型文件不存在: {0}")]
  ModelNotFound(String),
  #[error("ONNX Runtime 错误: {0}")]
  Runtime(String),
  #[error("会话锁已损坏")]
  Poisoned,
  #[error("输出 {name} 形状无效: {shape:?}")]
  OutputShape { name: String, shape: Vec<usize> },
}

fn runtime_error<E: std::fmt::Display>(err: E) -> OrtEngineError {
  OrtEngineError::Runtime(err.to_string())
}

/// 基于 ONNX Runtime 的推理引擎
///
/// `Session::run` 需要可变引用，因此会话放在 `Mutex` 中。
pub struct OrtEngine {
  session: Mutex<Session>,
  input_name: String,
  output_name: String,
  layout: TensorLayout,
}

impl OrtEngine {
  /// 加载模型；未指定输入输出名称时使用模型的第一个输入和第一个输出
  pub fn load<P: AsRef<Path>>(
    model_path: P,
    input_name: Option<&str>,
    output_name: Option<&str>,
    layout: TensorLayout,
  ) -> Result<Self, OrtEngineError> {
    let model_path = model_path.as_ref();
    if !model_path.exists() {
      return Err(OrtEngineError::ModelNotFound(
        model_path.display().to_string(),
      ));
    }

    info!("从 {} 加载模型", model_path.display());
    let session = Session::builder()
      .map_err(runtime_error)?
      .with_execution_providers([CPUExecutionProvider::default().build()])
      .map_err(runtime_error)?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(runtime_error)?
      .commit_from_file(model_path)
      .map_err(runtime_error)?;

    let input_name = match input_name {
      Some(name) => name.to_string(),
      None => session
        .inputs
        .first()
        .map(|input| input.name.clone())
        .unwrap_or_else(|| "images".to_string()),
    };
    let output_name = match output_name {
      Some(name) => name.to_string(),
      None => session
        .outputs
        .first()
        .map(|output| output.name.clone())
        .unwrap_or_else(|| "output0".to_string()),
    };
    info!(
      "模型加载完成，输入: {}, 输出: {}, 输出排列: {:?}",
      input_name, output_name, layout
    );

    Ok(Self {
      session: Mutex::new(session),
      input_name,
      output_name,
      layout,
    })
  }
}

impl InferenceEngine for OrtEngine {
  type Error = OrtEngineError;

  fn forward(&self, input: &InputTensor) -> Result<OutputTensor, Self::Error> {
    let batch = input.as_array().clone().insert_axis(Axis(0));
    let value = Value::from_array(batch).map_err(runtime_error)?;

    let mut session = self.session.lock().map_err(|_| OrtEngineError::Poisoned)?;
    let outputs = session
      .run(ort::inputs![self.input_name.as_str() => value])
      .map_err(runtime_error)?;

    let output = outputs[self.output_name.as_str()]
      .try_extract_array::<f32>()
      .map_err(runtime_error)?;
    debug!("输出 {} 形状: {:?}", self.output_name, output.shape());

    OutputTensor::from_dyn(output.view(), self.layout).map_err(|_| OrtEngineError::OutputShape {
      name: self.output_name.clone(),
      shape: output.shape().to_vec(),
    })
  }
}
