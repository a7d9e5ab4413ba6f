// 该文件是 Qianli （千里眼） 项目的一部分。
// src/model.rs - 模型
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

mod core;
pub use self::core::{
  DetectError, DetectResult, Detection, InferenceEngine, Model, Rect,
};

pub mod dfl;
pub mod label;
pub mod letterbox;
pub mod nms;
pub mod proposal;
pub mod tensor;

pub use self::label::LabelTable;
pub use self::letterbox::LetterboxPlan;
pub use self::tensor::{InputTensor, OutputTensor, TensorLayout};

mod yolo11;
pub use self::yolo11::{DetectorConfig, Yolo11, Yolo11Builder, Yolo11Error};

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use self::onnx::{OrtEngine, OrtEngineError};
