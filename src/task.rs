// 该文件是 Maibing （麦病） 项目的一部分。
// src/task.rs - 推理任务
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

use std::{
  io::Cursor,
  path::{Path, PathBuf},
  time::Instant,
};

use image::{ImageFormat, RgbImage};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  CONFIDENCE_THRESHOLD,
  frame::Frame,
  input::{ImageFileInput, ImageFileInputError, InputError, UploadedImage, persist_upload},
  model::{DetectResult, Model, WithLabel},
  output::{DetectionReport, Draw, Render},
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 取一帧推理并输出
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
    let now = Instant::now();
    let result = model.infer(&frame)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    let now = Instant::now();
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error(transparent)]
  Input(#[from] InputError),
  #[error("无法读取图像: {0}")]
  ImageRead(#[from] ImageFileInputError),
  #[error("推理失败: {0}")]
  Inference(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("图像编码失败: {0}")]
  Encode(#[from] image::ImageError),
}

impl PipelineError {
  /// 上传的文件类型不被接受
  pub fn is_unsupported_upload(&self) -> bool {
    matches!(self, PipelineError::Input(InputError::UnsupportedType(_)))
  }
}

/// 一张图像及其检测结果
#[derive(Debug, Clone)]
pub struct Prediction<T> {
  pub image: RgbImage,
  pub result: DetectResult<T>,
}

/// 对磁盘上的图像运行推理
///
/// 返回的每个检测结果的置信度都不低于 `confidence_threshold`。
pub fn predict<T, M>(
  model: &M,
  path: &Path,
  confidence_threshold: f32,
) -> Result<Vec<Prediction<T>>, PipelineError>
where
  T: WithLabel,
  M: Model<Input = Frame, Output = DetectResult<T>> + ?Sized,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  let input = ImageFileInput::open(path)?.with_confidence_threshold(confidence_threshold);

  let mut predictions = Vec::new();
  for frame in input {
    let now = Instant::now();
    let result = model
      .infer(&frame)
      .map_err(|e| PipelineError::Inference(Box::new(e)))?;
    debug!("推理完成，耗时: {:.2?}，检测到 {} 个目标", now.elapsed(), result.len());

    let items: Vec<_> = result
      .iter()
      .filter(|item| item.score >= confidence_threshold)
      .cloned()
      .collect();
    predictions.push(Prediction {
      image: frame.image,
      result: DetectResult::from(items),
    });
  }

  Ok(predictions)
}

/// 渲染后的单张图像结果
#[derive(Debug, Clone)]
pub struct RenderedPrediction<T> {
  pub original_png: Vec<u8>,
  /// RGB 顺序的标注图像
  pub annotated_png: Vec<u8>,
  pub report: DetectionReport,
  pub result: DetectResult<T>,
}

#[derive(Debug, Clone)]
pub struct DetectionOutcome<T> {
  pub file_name: String,
  pub predictions: Vec<RenderedPrediction<T>>,
}

impl<T> DetectionOutcome<T> {
  /// 所有图像合并后的摘要
  pub fn summary(&self) -> String {
    let summaries: Vec<String> = self.predictions.iter().map(|p| p.report.summary()).collect();
    summaries.join("; ")
  }
}

/// 单次上传的处理流程：写入临时文件、推理、渲染、清理
#[derive(Debug, Default, Clone)]
pub struct RequestTask {
  temp_dir: Option<PathBuf>,
}

impl RequestTask {
  pub fn new() -> Self {
    Self::default()
  }

  /// 临时文件目录，默认为系统临时目录
  pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
    self.temp_dir = Some(temp_dir.into());
    self
  }

  pub fn handle<T, M>(
    &self,
    model: &M,
    draw: &Draw,
    upload: UploadedImage,
  ) -> Result<DetectionOutcome<T>, PipelineError>
  where
    T: WithLabel,
    M: Model<Input = Frame, Output = DetectResult<T>> + ?Sized,
    M::Error: std::error::Error + Send + Sync + 'static,
  {
    info!("处理上传文件: {}", upload.file_name());
    // 临时文件在本函数返回时删除，无论成功与否
    let temp = persist_upload(&upload, self.temp_dir.as_deref())?;
    let predictions = predict(model, temp.path(), CONFIDENCE_THRESHOLD)?;

    let mut rendered = Vec::with_capacity(predictions.len());
    for Prediction { image, result } in predictions {
      let annotated = draw.annotate(&image, &result).into_rgb_image();
      let report = DetectionReport::from_result(&result);
      info!("🦠 Detected Diseases: {}", report.summary());
      rendered.push(RenderedPrediction {
        original_png: encode_png(&image)?,
        annotated_png: encode_png(&annotated)?,
        report,
        result,
      });
    }

    Ok(DetectionOutcome {
      file_name: upload.file_name().to_string(),
      predictions: rendered,
    })
  }
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
  let mut buffer = Cursor::new(Vec::new());
  image.write_to(&mut buffer, ImageFormat::Png)?;
  Ok(buffer.into_inner())
}
