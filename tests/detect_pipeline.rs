// 该文件是 Qianli （千里眼） 项目的一部分。
// tests/detect_pipeline.rs - 检测流程集成测试
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

use std::sync::Mutex;

use image::{Rgb, RgbImage};
use ndarray::Array3;
use qianli::{
  frame::Frame,
  model::{
    DetectError, DetectorConfig, InferenceEngine, InputTensor, LabelTable, Model, OutputTensor,
    Yolo11, dfl::DFL_BINS,
  },
  output::report_detections,
  task::ContinuousTask,
};

const STRIDE: usize = 32;

#[derive(thiserror::Error, Debug)]
#[error("引擎故障")]
struct EngineFault;

/// 一个网格单元的假输出: (行, 列, 四条边的 bin, 类别, 分数)
#[derive(Clone, Copy)]
struct Hot {
  i: usize,
  j: usize,
  edge_bin: usize,
  class: usize,
  score: f32,
}

/// 按输入尺寸生成网格的假引擎
struct FakeEngine {
  hot: Vec<Hot>,
  num_classes: usize,
  extra_channels: usize,
  fail: bool,
  last_input: Mutex<Option<(usize, usize, usize)>>,
}

impl FakeEngine {
  fn new(num_classes: usize, hot: Vec<Hot>) -> Self {
    Self {
      hot,
      num_classes,
      extra_channels: 0,
      fail: false,
      last_input: Mutex::new(None),
    }
  }
}

impl InferenceEngine for FakeEngine {
  type Error = EngineFault;

  fn forward(&self, input: &InputTensor) -> Result<OutputTensor, EngineFault> {
    if self.fail {
      return Err(EngineFault);
    }
    *self.last_input.lock().unwrap() = Some((input.channels(), input.height(), input.width()));

    let grid_y = input.height() / STRIDE;
    let grid_x = input.width() / STRIDE;
    let channels = 4 * DFL_BINS + self.num_classes + self.extra_channels;
    let mut data = Array3::<f32>::zeros((grid_y, grid_x, channels));
    for hot in &self.hot {
      for edge in 0..4 {
        data[[hot.i, hot.j, edge * DFL_BINS + hot.edge_bin]] = 50.0;
      }
      data[[hot.i, hot.j, 4 * DFL_BINS + hot.class]] = hot.score;
    }
    Ok(OutputTensor::from_array(data))
  }
}

fn pets() -> LabelTable {
  LabelTable::from_names(vec!["cat".to_string(), "dog".to_string()])
}

fn close(a: f32, b: f32) -> bool {
  (a - b).abs() < 1e-2
}

#[test]
fn full_hd_detection_is_unmapped_to_image_space() {
  let engine = FakeEngine::new(
    2,
    vec![Hot {
      i: 5,
      j: 10,
      edge_bin: 2,
      class: 1,
      score: 0.9,
    }],
  );
  let detector = Yolo11::new(engine, DetectorConfig::default(), pets());
  let image = RgbImage::from_pixel(1920, 1080, Rgb([40, 80, 120]));

  let result = detector.detect(&image, 0.5).unwrap();
  assert_eq!(result.len(), 1);

  // 网络空间 (272, 112)-(400, 240)，上下各填充 12，缩放 1/3
  let det = result.items[0];
  assert_eq!(det.label, 1);
  assert!(close(det.prob, 0.9));
  assert!(close(det.rect.x, 816.0), "{:?}", det.rect);
  assert!(close(det.rect.y, 300.0), "{:?}", det.rect);
  assert!(close(det.rect.width, 384.0), "{:?}", det.rect);
  assert!(close(det.rect.height, 384.0), "{:?}", det.rect);

  let mut sink = Vec::new();
  report_detections(&mut sink, &result.items, &result.labels).unwrap();
  assert_eq!(
    String::from_utf8(sink).unwrap(),
    "dog: 90.00% at (816, 300, 384x384)\n"
  );
}

#[test]
fn engine_sees_the_padded_network_input() {
  let detector = Yolo11::new(FakeEngine::new(2, Vec::new()), DetectorConfig::default(), pets());
  let result = detector
    .detect(&RgbImage::new(1920, 1080), 0.5)
    .unwrap();
  assert!(result.is_empty());
  assert_eq!(
    *detector.engine().last_input.lock().unwrap(),
    Some((3, 384, 640))
  );
}

#[test]
fn threshold_is_applied_to_raw_scores() {
  let hot = vec![
    Hot {
      i: 1,
      j: 1,
      edge_bin: 1,
      class: 0,
      score: 0.49,
    },
    Hot {
      i: 3,
      j: 3,
      edge_bin: 1,
      class: 0,
      score: 0.5,
    },
  ];
  let detector = Yolo11::new(FakeEngine::new(2, hot), DetectorConfig::default(), pets());
  let result = detector.detect(&RgbImage::new(640, 640), 0.5).unwrap();
  assert_eq!(result.len(), 1);
  assert_eq!(result.items[0].prob, 0.5);
}

#[test]
fn boxes_are_clipped_unless_disabled() {
  let hot = vec![Hot {
    i: 0,
    j: 0,
    edge_bin: 4,
    class: 0,
    score: 0.8,
  }];

  let clipped = Yolo11::new(
    FakeEngine::new(2, hot.clone()),
    DetectorConfig::default(),
    pets(),
  );
  let result = clipped.detect(&RgbImage::new(640, 640), 0.5).unwrap();
  let rect = result.items[0].rect;
  assert!(close(rect.x, 0.0) && close(rect.y, 0.0));
  assert!(close(rect.width, 144.0), "{:?}", rect);

  let raw = Yolo11::new(
    FakeEngine::new(2, hot),
    DetectorConfig {
      clip: false,
      ..DetectorConfig::default()
    },
    pets(),
  );
  let result = raw.detect(&RgbImage::new(640, 640), 0.5).unwrap();
  let rect = result.items[0].rect;
  // (0.5 - 4) * 32 = -112
  assert!(close(rect.x, -112.0), "{:?}", rect);
  assert!(close(rect.width, 256.0), "{:?}", rect);
}

#[test]
fn nms_is_opt_in() {
  // 两个相邻单元给出大面积重叠的同类框
  let hot = vec![
    Hot {
      i: 5,
      j: 5,
      edge_bin: 6,
      class: 0,
      score: 0.9,
    },
    Hot {
      i: 5,
      j: 6,
      edge_bin: 6,
      class: 0,
      score: 0.7,
    },
  ];

  let plain = Yolo11::new(
    FakeEngine::new(2, hot.clone()),
    DetectorConfig::default(),
    pets(),
  );
  assert_eq!(plain.detect(&RgbImage::new(640, 640), 0.5).unwrap().len(), 2);

  let suppressed = Yolo11::new(
    FakeEngine::new(2, hot),
    DetectorConfig {
      nms_threshold: Some(0.45),
      ..DetectorConfig::default()
    },
    pets(),
  );
  let result = suppressed.detect(&RgbImage::new(640, 640), 0.5).unwrap();
  assert_eq!(result.len(), 1);
  assert_eq!(result.items[0].prob, 0.9);
}

#[test]
fn class_count_mismatch_is_a_shape_fault() {
  let mut engine = FakeEngine::new(2, Vec::new());
  engine.extra_channels = 3;
  let detector = Yolo11::new(engine, DetectorConfig::default(), pets());
  assert!(matches!(
    detector.detect(&RgbImage::new(640, 480), 0.5),
    Err(DetectError::ShapeMismatch { .. })
  ));
}

#[test]
fn engine_and_input_faults_are_reported() {
  let mut engine = FakeEngine::new(2, Vec::new());
  engine.fail = true;
  let detector = Yolo11::new(engine, DetectorConfig::default(), pets());
  assert!(matches!(
    detector.detect(&RgbImage::new(64, 64), 0.5),
    Err(DetectError::Engine(_))
  ));

  let detector = Yolo11::new(FakeEngine::new(2, Vec::new()), DetectorConfig::default(), pets());
  assert!(matches!(
    detector.detect(&RgbImage::new(0, 10), 0.5),
    Err(DetectError::DegenerateInput { .. })
  ));
}

#[test]
fn model_trait_uses_configured_threshold() {
  let hot = vec![Hot {
    i: 2,
    j: 2,
    edge_bin: 1,
    class: 1,
    score: 0.3,
  }];
  let detector = Yolo11::new(
    FakeEngine::new(2, hot),
    DetectorConfig {
      prob_threshold: 0.25,
      ..DetectorConfig::default()
    },
    pets(),
  );
  let frame = Frame::from(RgbImage::new(320, 320));
  assert_eq!(detector.infer(&frame).unwrap().len(), 1);
}

#[test]
fn continuous_task_survives_bad_frames() {
  struct Count(Mutex<usize>);

  impl qianli::output::Render<Frame, qianli::model::DetectResult> for &Count {
    type Error = std::io::Error;

    fn render_result(
      &self,
      _frame: &Frame,
      _result: &qianli::model::DetectResult,
    ) -> Result<(), Self::Error> {
      *self.0.lock().unwrap() += 1;
      Ok(())
    }
  }

  let detector = Yolo11::new(FakeEngine::new(2, Vec::new()), DetectorConfig::default(), pets());
  let frames = vec![
    Frame::new(RgbImage::new(64, 48), 0, 0),
    Frame::new(RgbImage::new(0, 0), 1, 0),
    Frame::new(RgbImage::new(48, 64), 2, 0),
  ];
  let count = Count(Mutex::new(0));
  let summary = ContinuousTask::default()
    .run(frames.into_iter(), detector, &count)
    .unwrap();
  assert_eq!(summary.processed, 2);
  assert_eq!(summary.failed, 1);
  assert_eq!(*count.0.lock().unwrap(), 2);
}
