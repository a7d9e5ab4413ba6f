// 该文件是 Qianli （千里眼） 项目的一部分。
// src/model/yolo11.rs - YOLO11 单尺度 DFL 检测器
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

use std::{path::PathBuf, sync::Arc};

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::{
    core::{DetectError, DetectResult, InferenceEngine, Model},
    dfl::DFL_BINS,
    label::LabelTable,
    letterbox::LetterboxPlan,
    nms::nms,
    proposal::generate_proposals,
    tensor::{OutputTensor, TensorLayout},
  },
  utils::{QueryParamError, parse_query_param, query_flag, query_param},
};

#[cfg(feature = "onnx")]
use crate::model::onnx::{OrtEngine, OrtEngineError};

const YOLO11_INPUT_SIZE: u32 = 640;
const YOLO11_STRIDE: u32 = 32;
const YOLO11_OBJECT_THRESH: f32 = 0.5;

#[derive(Error, Debug)]
pub enum Yolo11Error {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型参数错误: {0}")]
  QueryError(#[from] QueryParamError),
  #[error("类别文件 {path} 读取失败: {source}")]
  LabelFileError {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("检测配置错误: {0}")]
  ConfigError(#[from] DetectError),
  #[cfg(feature = "onnx")]
  #[error("推理引擎错误: {0}")]
  EngineError(#[from] OrtEngineError),
}

/// 检测参数
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
  /// 网络输入的长边尺寸
  pub target_size: u32,
  /// 输出网格相对输入像素的下采样倍数
  pub stride: u32,
  /// 每条边的分布 bin 数
  pub bins: usize,
  /// 类别分数阈值，`(0, 1)`
  pub prob_threshold: f32,
  /// 按类别 NMS 的 IoU 阈值，`None` 表示不做抑制
  pub nms_threshold: Option<f32>,
  /// 是否把结果裁剪到原图范围内
  pub clip: bool,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      target_size: YOLO11_INPUT_SIZE,
      stride: YOLO11_STRIDE,
      bins: DFL_BINS,
      prob_threshold: YOLO11_OBJECT_THRESH,
      nms_threshold: None,
      clip: true,
    }
  }
}

impl DetectorConfig {
  pub fn validate(&self) -> Result<(), DetectError> {
    if self.target_size == 0 || self.stride == 0 || self.bins == 0 {
      return Err(DetectError::InvalidConfig(format!(
        "尺寸 {}、步长 {}、bin 数 {} 必须为正数",
        self.target_size, self.stride, self.bins
      )));
    }
    if !(self.prob_threshold > 0.0 && self.prob_threshold < 1.0) {
      return Err(DetectError::InvalidConfig(format!(
        "置信度阈值 {} 不在 (0, 1) 内",
        self.prob_threshold
      )));
    }
    if let Some(iou) = self.nms_threshold
      && !(iou > 0.0 && iou <= 1.0)
    {
      return Err(DetectError::InvalidConfig(format!(
        "NMS 阈值 {} 不在 (0, 1] 内",
        iou
      )));
    }
    Ok(())
  }
}

pub struct Yolo11Builder {
  model_path: PathBuf,
  config: DetectorConfig,
  labels_path: Option<PathBuf>,
  input_name: Option<String>,
  output_name: Option<String>,
  layout: TensorLayout,
}

impl FromUrlWithScheme for Yolo11Builder {
  const SCHEME: &'static str = "yolo11";
}

impl FromUrl for Yolo11Builder {
  type Error = Yolo11Error;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(Yolo11Error::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let defaults = DetectorConfig::default();
    let config = DetectorConfig {
      target_size: parse_query_param(url, "size")?.unwrap_or(defaults.target_size),
      stride: parse_query_param(url, "stride")?.unwrap_or(defaults.stride),
      bins: parse_query_param(url, "bins")?.unwrap_or(defaults.bins),
      prob_threshold: parse_query_param(url, "threshold")?.unwrap_or(defaults.prob_threshold),
      nms_threshold: parse_query_param(url, "nms")?,
      clip: query_flag(url, "clip")?.unwrap_or(defaults.clip),
    };
    config.validate()?;

    Ok(Yolo11Builder {
      model_path: PathBuf::from(url.path()),
      config,
      labels_path: query_param(url, "labels").map(PathBuf::from),
      input_name: query_param(url, "input"),
      output_name: query_param(url, "output"),
      layout: parse_query_param(url, "layout")?.unwrap_or_default(),
    })
  }
}

impl Yolo11Builder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      config: DetectorConfig::default(),
      labels_path: None,
      input_name: None,
      output_name: None,
      layout: TensorLayout::default(),
    }
  }

  pub fn confidence(mut self, threshold: f32) -> Self {
    self.config.prob_threshold = threshold;
    self
  }

  pub fn nms_threshold(mut self, threshold: Option<f32>) -> Self {
    self.config.nms_threshold = threshold;
    self
  }

  pub fn clip(mut self, clip: bool) -> Self {
    self.config.clip = clip;
    self
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  pub fn model_path(&self) -> &PathBuf {
    &self.model_path
  }

  pub fn layout(&self) -> TensorLayout {
    self.layout
  }

  /// 引擎输入、输出名称，未指定时由引擎自行选择
  pub fn io_names(&self) -> (Option<&str>, Option<&str>) {
    (self.input_name.as_deref(), self.output_name.as_deref())
  }

  fn load_labels(&self) -> Result<LabelTable, Yolo11Error> {
    match &self.labels_path {
      Some(path) => LabelTable::from_file(path).map_err(|source| Yolo11Error::LabelFileError {
        path: path.clone(),
        source,
      }),
      None => Ok(LabelTable::coco()),
    }
  }

  /// 使用已加载的推理引擎构建检测器
  pub fn build_with_engine<E: InferenceEngine>(self, engine: E) -> Result<Yolo11<E>, Yolo11Error> {
    self.config.validate()?;
    let labels = self.load_labels()?;
    info!(
      "检测器参数: 输入 {}, 步长 {}, 阈值 {}, NMS {:?}, 类别数 {}",
      self.config.target_size,
      self.config.stride,
      self.config.prob_threshold,
      self.config.nms_threshold,
      labels.len()
    );
    Ok(Yolo11::new(engine, self.config, labels))
  }

  #[cfg(feature = "onnx")]
  pub fn build(self) -> Result<Yolo11<OrtEngine>, Yolo11Error> {
    let engine = OrtEngine::load(
      &self.model_path,
      self.input_name.as_deref(),
      self.output_name.as_deref(),
      self.layout,
    )?;
    self.build_with_engine(engine)
  }
}

/// YOLO11 检测器，持有在启动时加载好的推理引擎
pub struct Yolo11<E> {
  engine: E,
  config: DetectorConfig,
  labels: Arc<LabelTable>,
}

impl<E: InferenceEngine> Yolo11<E> {
  pub fn new(engine: E, config: DetectorConfig, labels: LabelTable) -> Self {
    Self {
      engine,
      config,
      labels: Arc::new(labels),
    }
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  pub fn labels(&self) -> &LabelTable {
    &self.labels
  }

  pub fn engine(&self) -> &E {
    &self.engine
  }

  fn check_output(&self, plan: &LetterboxPlan, output: &OutputTensor) -> Result<(), DetectError> {
    let stride = self.config.stride;
    let expected_grid = (
      (plan.padded_height() / stride) as usize,
      (plan.padded_width() / stride) as usize,
    );
    let expected_channels = 4 * self.config.bins + self.labels.len();

    if (output.grid_y(), output.grid_x()) != expected_grid || output.channels() != expected_channels {
      return Err(DetectError::ShapeMismatch {
        expected: format!(
          "{}x{}x{} (4 x {} + {} 个类别)",
          expected_grid.0,
          expected_grid.1,
          expected_channels,
          self.config.bins,
          self.labels.len()
        ),
        actual: output.shape(),
      });
    }
    Ok(())
  }

  /// 检测一张图像，坐标位于原图像素空间
  pub fn detect(&self, image: &RgbImage, prob_threshold: f32) -> Result<DetectResult, DetectError> {
    if !(prob_threshold > 0.0 && prob_threshold < 1.0) {
      return Err(DetectError::InvalidConfig(format!(
        "置信度阈值 {} 不在 (0, 1) 内",
        prob_threshold
      )));
    }

    let (width, height) = image.dimensions();
    let plan = LetterboxPlan::new(width, height, self.config.target_size, self.config.stride)?;

    let now = std::time::Instant::now();
    let input = plan.apply(image);
    debug!("预处理完成，耗时: {:.2?}", now.elapsed());

    let now = std::time::Instant::now();
    let output = self
      .engine
      .forward(&input)
      .map_err(|e| DetectError::Engine(Box::new(e)))?;
    debug!("前向推理完成，耗时: {:.2?}, 输出形状 {:?}", now.elapsed(), output.shape());

    self.check_output(&plan, &output)?;

    let mut detections =
      generate_proposals(&output, prob_threshold, self.config.stride, self.config.bins)?;

    if let Some(iou) = self.config.nms_threshold {
      let before = detections.len();
      detections = nms(detections, iou);
      debug!("NMS: {} -> {}", before, detections.len());
    }

    for det in detections.iter_mut() {
      plan.unmap(det);
      if self.config.clip {
        det.rect = det.rect.clip(width as f32, height as f32);
      }
    }

    debug!("检测到 {} 个物体", detections.len());
    Ok(DetectResult::new(detections, self.labels.clone()))
  }
}

impl<E: InferenceEngine> Model for Yolo11<E> {
  type Input = Frame;
  type Output = DetectResult;
  type Error = DetectError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.detect(&input.image, self.config.prob_threshold)
  }
}
