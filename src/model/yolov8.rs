// 该文件是 Maibing （麦病） 项目的一部分。
// src/model/yolov8.rs - YOLOv8 ONNX 模型
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Maibing Contributors

use std::{marker::PhantomData, path::Path, sync::Mutex};

use ndarray::Array4;
use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::TensorRef,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, LetterboxFrame},
  model::{DetectItem, DetectResult, Model, WithLabel},
  url_file_path,
};

const YOLOV8_NUM_INPUTS: usize = 1;
const YOLOV8_NUM_OUTPUTS: usize = 1;
const YOLOV8_INPUT_W: u32 = 640;
const YOLOV8_INPUT_H: u32 = 640;
const YOLOV8_BOX_DIMS: usize = 4;
const YOLOV8_DEFAULT_IOU: f32 = 0.7;
const YOLOV8_MAX_DETECTIONS: usize = 300;
const YOLOV8_DEFAULT_THREADS: usize = 4;

type YoloFrame = LetterboxFrame<YOLOV8_INPUT_W, YOLOV8_INPUT_H>;

#[derive(Error, Debug)]
pub enum Yolov8Error {
  #[error("模型文件不存在: {0}")]
  ModelNotFound(String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("ONNX Runtime 错误: {0}")]
  Ort(String),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("类别数量不匹配: 词表 {expected} 类, 模型 {actual} 类")]
  ClassCountMismatch { expected: usize, actual: usize },
  #[error("输出张量形状错误: {0:?}")]
  OutputShape(Vec<usize>),
  #[error("推理会话锁已损坏")]
  SessionPoisoned,
}

impl Yolov8Error {
  fn ort(context: &str, e: impl std::fmt::Display) -> Self {
    Yolov8Error::Ort(format!("{}: {}", context, e))
  }
}

pub struct Yolov8<T> {
  session: Mutex<Session>,
  input_name: String,
  output_name: String,
  iou_threshold: f32,
  _phantom: PhantomData<fn() -> T>,
}

#[derive(Debug, Clone)]
pub struct Yolov8Builder {
  model_path: String,
  iou_threshold: f32,
  threads: usize,
}

impl FromUrlWithScheme for Yolov8Builder {
  const SCHEME: &'static str = "yolov8";
}

impl FromUrl for Yolov8Builder {
  type Error = Yolov8Error;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(Yolov8Error::ModelPathError(format!(
        "模型路径必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let mut builder = Yolov8Builder::new(url_file_path(url));
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "iou" => {
          let iou_threshold = value
            .parse()
            .map_err(|_| Yolov8Error::ModelPathError(format!("无效的 iou 参数: {}", value)))?;
          builder = builder.iou_threshold(iou_threshold);
        }
        "threads" => {
          let threads = value
            .parse()
            .map_err(|_| Yolov8Error::ModelPathError(format!("无效的 threads 参数: {}", value)))?;
          builder = builder.threads(threads);
        }
        other => warn!("忽略未知的模型参数: {}", other),
      }
    }

    Ok(builder)
  }
}

impl Yolov8Builder {
  pub fn new(model_path: impl Into<String>) -> Self {
    Self {
      model_path: model_path.into(),
      iou_threshold: YOLOV8_DEFAULT_IOU,
      threads: YOLOV8_DEFAULT_THREADS,
    }
  }

  pub fn iou_threshold(mut self, iou_threshold: f32) -> Self {
    self.iou_threshold = iou_threshold;
    self
  }

  pub fn threads(mut self, threads: usize) -> Self {
    self.threads = threads;
    self
  }

  pub fn model_path(&self) -> &str {
    &self.model_path
  }

  pub fn build<T: WithLabel>(self) -> Result<Yolov8<T>, Yolov8Error> {
    if !Path::new(&self.model_path).is_file() {
      error!("模型文件不存在: {}", self.model_path);
      return Err(Yolov8Error::ModelNotFound(self.model_path));
    }

    info!("加载模型文件: {}", self.model_path);
    let session = Session::builder()
      .map_err(|e| Yolov8Error::ort("无法创建会话构建器", e))?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(|e| Yolov8Error::ort("无法设置图优化级别", e))?
      .with_intra_threads(self.threads)
      .map_err(|e| Yolov8Error::ort("无法设置线程数", e))?
      .commit_from_file(&self.model_path)
      .map_err(|e| Yolov8Error::ort("无法加载模型", e))?;

    let num_inputs = session.inputs.len();
    let num_outputs = session.outputs.len();
    debug!("模型输入数量: {}", num_inputs);
    debug!("模型输出数量: {}", num_outputs);

    if num_inputs != YOLOV8_NUM_INPUTS || num_outputs != YOLOV8_NUM_OUTPUTS {
      error!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        YOLOV8_NUM_INPUTS, YOLOV8_NUM_OUTPUTS, num_inputs, num_outputs
      );
      return Err(Yolov8Error::ModelInvalid(format!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        YOLOV8_NUM_INPUTS, YOLOV8_NUM_OUTPUTS, num_inputs, num_outputs
      )));
    }

    check_class_names::<T>(&session)?;

    let input_name = session.inputs[0].name.clone();
    let output_name = session.outputs[0].name.clone();
    info!("模型加载完成");

    Ok(Yolov8 {
      session: Mutex::new(session),
      input_name,
      output_name,
      iou_threshold: self.iou_threshold,
      _phantom: PhantomData,
    })
  }
}

/// 对比 Ultralytics 导出时写入的 `names` 元数据与词表
///
/// 类别数量不一致直接报错；名称不一致只记录警告，类别顺序以训练时为准。
fn check_class_names<T: WithLabel>(session: &Session) -> Result<(), Yolov8Error> {
  let names = match session.metadata().map(|m| m.custom("names")) {
    Ok(Ok(Some(names))) => parse_ultralytics_names(&names),
    _ => {
      warn!("模型未携带类别名称元数据，跳过词表校验");
      return Ok(());
    }
  };

  if names.len() != T::CLASS_NUM {
    error!(
      "模型类别数量 {} 与词表数量 {} 不一致",
      names.len(),
      T::CLASS_NUM
    );
    return Err(Yolov8Error::ClassCountMismatch {
      expected: T::CLASS_NUM,
      actual: names.len(),
    });
  }

  for (id, name) in names.iter().enumerate() {
    let label = T::from_label_id(id as u32).to_label_str();
    if !name.eq_ignore_ascii_case(label) {
      warn!("类别 {} 的模型名称为 '{}', 词表名称为 '{}'", id, name, label);
    }
  }

  Ok(())
}

/// 解析 `{0: 'Aphid', 1: 'Black Rust'}` 形式的类别表，按索引排序返回名称
fn parse_ultralytics_names(raw: &str) -> Vec<String> {
  let body = raw.trim().trim_start_matches('{').trim_end_matches('}');
  let mut entries: Vec<(usize, String)> = body
    .split(',')
    .filter_map(|entry| {
      let (key, value) = entry.split_once(':')?;
      let id = key.trim().parse().ok()?;
      let name = value.trim().trim_matches(|c| c == '\'' || c == '"');
      Some((id, name.to_string()))
    })
    .collect();
  entries.sort_by_key(|(id, _)| *id);
  entries.into_iter().map(|(_, name)| name).collect()
}

impl<T: WithLabel> Model for Yolov8<T> {
  type Input = Frame;
  type Output = DetectResult<T>;
  type Error = Yolov8Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("预处理输入图像 {}x{}", input.width(), input.height());
    let frame = YoloFrame::from_rgb_image(&input.image);
    let [n, c, h, w] = frame.shape();
    let tensor = Array4::from_shape_vec((n, c, h, w), frame.as_nchw().to_vec())
      .map_err(|e| Yolov8Error::ModelInvalid(format!("输入张量构造失败: {}", e)))?;
    let tensor = tensor.as_standard_layout();
    let input_tensor =
      TensorRef::from_array_view(&tensor).map_err(|e| Yolov8Error::ort("无法创建输入张量", e))?;

    let (data, shape) = {
      let mut session = self
        .session
        .lock()
        .map_err(|_| Yolov8Error::SessionPoisoned)?;

      debug!("执行模型推理");
      let outputs = session
        .run(ort::inputs![self.input_name.as_str() => input_tensor])
        .map_err(|e| Yolov8Error::ort("推理失败", e))?;

      let output = outputs
        .get(self.output_name.as_str())
        .ok_or_else(|| Yolov8Error::ModelInvalid(format!("缺少输出 '{}'", self.output_name)))?;
      let (shape, data) = output
        .try_extract_tensor::<f32>()
        .map_err(|e| Yolov8Error::ort("无法读取输出张量", e))?;
      let shape: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
      (data.to_vec(), shape)
    };
    debug!("模型输出形状: {:?}", shape);

    decode_output(
      &data,
      &shape,
      &frame,
      input.confidence_threshold,
      self.iou_threshold,
    )
  }
}

#[derive(Debug, Clone)]
struct Candidate {
  class_id: usize,
  score: f32,
  bbox: [f32; 4],
}

/// 解码 `[1, 4 + nc, anchors]` 的 YOLOv8 输出
///
/// 每个候选框取得分最高的类别，过滤置信度，按类别做 NMS，最后映射回原图坐标。
pub(crate) fn decode_output<T: WithLabel, const W: u32, const H: u32>(
  data: &[f32],
  shape: &[usize],
  frame: &LetterboxFrame<W, H>,
  confidence_threshold: f32,
  iou_threshold: f32,
) -> Result<DetectResult<T>, Yolov8Error> {
  if shape.len() != 3 || shape[0] != 1 || shape[1] <= YOLOV8_BOX_DIMS {
    return Err(Yolov8Error::OutputShape(shape.to_vec()));
  }
  let class_num = shape[1] - YOLOV8_BOX_DIMS;
  if class_num != T::CLASS_NUM {
    return Err(Yolov8Error::ClassCountMismatch {
      expected: T::CLASS_NUM,
      actual: class_num,
    });
  }
  let anchors = shape[2];
  if data.len() != shape[1] * anchors {
    return Err(Yolov8Error::OutputShape(shape.to_vec()));
  }

  let mut candidates = Vec::new();
  for a in 0..anchors {
    let (class_id, score) = (0..class_num)
      .map(|c| (c, data[(YOLOV8_BOX_DIMS + c) * anchors + a]))
      .fold((0usize, f32::MIN), |best, cur| {
        if cur.1 > best.1 { cur } else { best }
      });

    if score < confidence_threshold {
      continue;
    }

    let cx = data[a];
    let cy = data[anchors + a];
    let w = data[2 * anchors + a];
    let h = data[3 * anchors + a];
    candidates.push(Candidate {
      class_id,
      score,
      bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
    });
  }
  debug!("置信度过滤后剩余 {} 个候选框", candidates.len());

  let kept = nms(candidates, iou_threshold);
  let items: Vec<DetectItem<T>> = kept
    .into_iter()
    .take(YOLOV8_MAX_DETECTIONS)
    .map(|c| DetectItem {
      kind: T::from_label_id(c.class_id as u32),
      score: c.score,
      bbox: frame.to_source_normalized(c.bbox),
    })
    .collect();

  debug!("检测到 {} 个目标", items.len());
  Ok(DetectResult::from(items))
}

/// 按类别的贪心非极大值抑制，返回按置信度降序排列的结果
fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
  candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut result: Vec<Candidate> = Vec::new();
  for candidate in candidates {
    let suppressed = result
      .iter()
      .any(|kept| kept.class_id == candidate.class_id && iou(&kept.bbox, &candidate.bbox) > iou_threshold);
    if !suppressed {
      result.push(candidate);
    }
  }
  result
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]) * (a[3] - a[1]);
  let area_b = (b[2] - b[0]) * (b[3] - b[1]);
  let union = area_a + area_b - intersection;

  if union > 0.0 { intersection / union } else { 0.0 }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::WheatDisease;
  use image::RgbImage;

  const NC: usize = 14;

  /// 构造 `[1, 4 + NC, anchors]` 的输出张量，每个框只在一个类别上有分数
  fn fake_output(boxes: &[([f32; 4], usize, f32)]) -> (Vec<f32>, Vec<usize>) {
    let anchors = boxes.len();
    let rows = YOLOV8_BOX_DIMS + NC;
    let mut data = vec![0f32; rows * anchors];
    for (a, (cxcywh, class_id, score)) in boxes.iter().enumerate() {
      for (i, v) in cxcywh.iter().enumerate() {
        data[i * anchors + a] = *v;
      }
      data[(YOLOV8_BOX_DIMS + class_id) * anchors + a] = *score;
    }
    (data, vec![1, rows, anchors])
  }

  fn square_frame() -> YoloFrame {
    YoloFrame::from_rgb_image(&RgbImage::new(640, 640))
  }

  #[test]
  fn low_confidence_boxes_are_dropped() {
    let (data, shape) = fake_output(&[
      ([100.0, 100.0, 50.0, 50.0], 0, 0.9),
      ([400.0, 400.0, 50.0, 50.0], 3, 0.1),
    ]);
    let result: DetectResult<WheatDisease> =
      decode_output(&data, &shape, &square_frame(), 0.25, 0.7).unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result.items[0].kind, WheatDisease::Aphid);
    assert!(result.iter().all(|item| item.score >= 0.25));
  }

  #[test]
  fn overlapping_boxes_of_same_class_are_suppressed() {
    let (data, shape) = fake_output(&[
      ([100.0, 100.0, 80.0, 80.0], 3, 0.8),
      ([102.0, 101.0, 80.0, 80.0], 3, 0.6),
      ([102.0, 101.0, 80.0, 80.0], 0, 0.5),
    ]);
    let result: DetectResult<WheatDisease> =
      decode_output(&data, &shape, &square_frame(), 0.25, 0.7).unwrap();

    let kinds: Vec<_> = result.iter().map(|item| item.kind).collect();
    assert_eq!(kinds, vec![WheatDisease::BrownRust, WheatDisease::Aphid]);
    assert!((result.items[0].score - 0.8).abs() < 1e-6);
  }

  #[test]
  fn boxes_at_exactly_the_iou_threshold_are_kept() {
    let candidate = |score, bbox| Candidate {
      class_id: 0,
      score,
      bbox,
    };
    // 两框 IoU 恰好为 0.5
    let boxes = vec![
      candidate(0.9, [0.0, 0.0, 4.0, 1.0]),
      candidate(0.8, [0.0, 0.0, 2.0, 1.0]),
    ];
    assert_eq!(iou(&boxes[0].bbox, &boxes[1].bbox), 0.5);

    assert_eq!(nms(boxes.clone(), 0.5).len(), 2);
    assert_eq!(nms(boxes, 0.49).len(), 1);
  }

  #[test]
  fn boxes_are_normalized_to_source_image() {
    let (data, shape) = fake_output(&[([320.0, 320.0, 640.0, 320.0], 1, 0.9)]);
    let result: DetectResult<WheatDisease> =
      decode_output(&data, &shape, &square_frame(), 0.25, 0.7).unwrap();

    assert_eq!(result.items[0].bbox, [0.0, 0.25, 1.0, 0.75]);
  }

  #[test]
  fn class_count_mismatch_is_rejected() {
    let data = vec![0f32; (YOLOV8_BOX_DIMS + 80) * 2];
    let err = decode_output::<WheatDisease, 640, 640>(
      &data,
      &[1, YOLOV8_BOX_DIMS + 80, 2],
      &square_frame(),
      0.25,
      0.7,
    )
    .unwrap_err();

    assert!(matches!(
      err,
      Yolov8Error::ClassCountMismatch {
        expected: 14,
        actual: 80
      }
    ));
  }

  #[test]
  fn malformed_output_shape_is_rejected() {
    let err =
      decode_output::<WheatDisease, 640, 640>(&[0.0; 4], &[4], &square_frame(), 0.25, 0.7)
        .unwrap_err();
    assert!(matches!(err, Yolov8Error::OutputShape(_)));
  }

  #[test]
  fn ultralytics_names_are_parsed_in_index_order() {
    let names = parse_ultralytics_names("{1: 'Black Rust', 0: 'Aphid', 2: \"Blast\"}");
    assert_eq!(names, vec!["Aphid", "Black Rust", "Blast"]);
  }

  #[test]
  fn builder_reads_model_url() {
    let url = Url::parse("yolov8:///models/best_14.onnx?iou=0.5&threads=2").unwrap();
    let builder = Yolov8Builder::from_url(&url).unwrap();
    assert_eq!(builder.model_path(), "/models/best_14.onnx");
    assert_eq!(builder.iou_threshold, 0.5);
    assert_eq!(builder.threads, 2);

    let wrong = Url::parse("image:///models/best_14.onnx").unwrap();
    assert!(matches!(
      Yolov8Builder::from_url(&wrong),
      Err(Yolov8Error::ModelPathError(_))
    ));
  }

  #[test]
  fn missing_weights_file_fails_to_build() {
    let err = Yolov8Builder::new("/nonexistent/best_14.onnx")
      .build::<WheatDisease>()
      .err()
      .unwrap();
    assert!(matches!(err, Yolov8Error::ModelNotFound(_)));
  }
}
