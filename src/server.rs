// 该文件是 Maibing （麦病） 项目的一部分。
// src/server.rs - 网页服务
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

use std::sync::Arc;

use actix_multipart::{Multipart, MultipartError};
use actix_web::{
  HttpResponse, ResponseError,
  error::BlockingError,
  http::{StatusCode, header::ContentType},
  web,
};
use futures_util::TryStreamExt;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::{
  frame::Frame,
  input::UploadedImage,
  model::{DetectResult, Model, WheatDisease, WithLabel},
  output::{
    Draw,
    page::{self, ResultSection, png_data_uri},
  },
  task::{DetectionOutcome, PipelineError, RequestTask},
};

/// 上传表单中图像字段的名称
pub const UPLOAD_FIELD: &str = "image";

#[derive(Error, Debug)]
pub enum ServerError {
  #[error("请上传一张图像")]
  MissingFile,
  #[error("上传数据解析失败: {0}")]
  Multipart(#[from] MultipartError),
  #[error(transparent)]
  Pipeline(#[from] PipelineError),
  #[error("后台任务执行失败: {0}")]
  Blocking(#[from] BlockingError),
  #[error("模型没有返回任何结果")]
  NoPrediction,
}

#[derive(Serialize)]
struct ErrorResponse {
  error: String,
}

impl ResponseError for ServerError {
  fn status_code(&self) -> StatusCode {
    match self {
      ServerError::MissingFile | ServerError::Multipart(_) => StatusCode::BAD_REQUEST,
      ServerError::Pipeline(e) if e.is_unsupported_upload() => StatusCode::UNSUPPORTED_MEDIA_TYPE,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    HttpResponse::build(self.status_code()).json(ErrorResponse {
      error: self.to_string(),
    })
  }
}

/// 服务共享状态，只有模型在请求间复用
pub struct AppState<M> {
  model: Arc<M>,
  draw: Arc<Draw>,
  task: RequestTask,
}

impl<M> AppState<M> {
  pub fn new(model: Arc<M>, draw: Draw, task: RequestTask) -> Self {
    Self {
      model,
      draw: Arc::new(draw),
      task,
    }
  }
}

#[derive(Serialize, Debug)]
pub struct DetectionJson {
  pub class_id: u32,
  pub label: &'static str,
  pub confidence: f32,
  pub bbox: [f32; 4],
}

#[derive(Serialize, Debug)]
pub struct DetectResponse {
  pub file_name: String,
  pub labels: Vec<&'static str>,
  pub summary: String,
  pub detections: Vec<DetectionJson>,
  pub original_image: String,
  pub annotated_image: String,
}

impl DetectResponse {
  fn from_outcome(outcome: DetectionOutcome<WheatDisease>) -> Result<Self, ServerError> {
    let file_name = outcome.file_name;
    let prediction = outcome
      .predictions
      .into_iter()
      .next()
      .ok_or(ServerError::NoPrediction)?;

    let detections = prediction
      .result
      .iter()
      .map(|item| DetectionJson {
        class_id: item.kind.to_label_id(),
        label: item.kind.to_label_str(),
        confidence: item.score,
        bbox: item.bbox,
      })
      .collect();

    Ok(Self {
      file_name,
      labels: prediction.report.labels().to_vec(),
      summary: prediction.report.summary(),
      detections,
      original_image: png_data_uri(&prediction.original_png),
      annotated_image: png_data_uri(&prediction.annotated_png),
    })
  }
}

pub fn configure<M>(cfg: &mut web::ServiceConfig)
where
  M: Model<Input = Frame, Output = DetectResult<WheatDisease>> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  cfg
    .route("/", web::get().to(index))
    .route("/health", web::get().to(health))
    .route("/detect", web::post().to(detect_page::<M>))
    .route("/api/detect", web::post().to(detect_api::<M>));
}

async fn index() -> HttpResponse {
  HttpResponse::Ok()
    .content_type(ContentType::html())
    .body(page::upload_page())
}

async fn health() -> HttpResponse {
  HttpResponse::Ok().body("ok")
}

async fn detect_page<M>(state: web::Data<AppState<M>>, payload: Multipart) -> HttpResponse
where
  M: Model<Input = Frame, Output = DetectResult<WheatDisease>> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  match run_detection(&state, payload).await {
    Ok(outcome) => {
      let original = outcome
        .predictions
        .first()
        .map(|p| png_data_uri(&p.original_png))
        .unwrap_or_default();
      let annotated: Vec<(String, String)> = outcome
        .predictions
        .iter()
        .map(|p| (png_data_uri(&p.annotated_png), p.report.summary()))
        .collect();
      let sections: Vec<ResultSection<'_>> = annotated
        .iter()
        .map(|(image, summary)| ResultSection {
          annotated_image: image,
          summary,
        })
        .collect();

      HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(page::result_page(&outcome.file_name, &original, &sections))
    }
    Err(e) => HttpResponse::build(e.status_code())
      .content_type(ContentType::html())
      .body(page::error_page(&e.to_string())),
  }
}

async fn detect_api<M>(
  state: web::Data<AppState<M>>,
  payload: Multipart,
) -> Result<HttpResponse, ServerError>
where
  M: Model<Input = Frame, Output = DetectResult<WheatDisease>> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  let outcome = run_detection(&state, payload).await?;
  Ok(HttpResponse::Ok().json(DetectResponse::from_outcome(outcome)?))
}

async fn run_detection<M>(
  state: &AppState<M>,
  payload: Multipart,
) -> Result<DetectionOutcome<WheatDisease>, ServerError>
where
  M: Model<Input = Frame, Output = DetectResult<WheatDisease>> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  let result = detect_upload(state, payload).await;

  if let Err(e) = &result {
    match e {
      ServerError::Pipeline(p) if p.is_unsupported_upload() => warn!("拒绝上传: {}", e),
      ServerError::MissingFile | ServerError::Multipart(_) => warn!("请求无效: {}", e),
      _ => error!("检测失败: {}", e),
    }
  }
  result
}

async fn detect_upload<M>(
  state: &AppState<M>,
  payload: Multipart,
) -> Result<DetectionOutcome<WheatDisease>, ServerError>
where
  M: Model<Input = Frame, Output = DetectResult<WheatDisease>> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  let upload = read_upload(payload).await?;
  let model = state.model.clone();
  let draw = state.draw.clone();
  let task = state.task.clone();
  let outcome = web::block(move || task.handle(&*model, &draw, upload)).await??;
  Ok(outcome)
}

/// 读取表单中的图像字段，类型校验在推理前完成
async fn read_upload(mut payload: Multipart) -> Result<UploadedImage, ServerError> {
  let mut upload = None;

  while let Some(mut field) = payload.try_next().await? {
    let file_name = field
      .content_disposition()
      .and_then(|cd| cd.get_filename())
      .map(str::to_string);
    let is_image_field = field.name() == Some(UPLOAD_FIELD);

    let mut bytes = Vec::new();
    while let Some(chunk) = field.try_next().await? {
      bytes.extend_from_slice(&chunk);
    }

    if let Some(name) = file_name
      && is_image_field
      && upload.is_none()
      && !name.is_empty()
    {
      // 先校验类型，空文件视为未上传
      let image = UploadedImage::new(name, bytes).map_err(PipelineError::from)?;
      if !image.bytes().is_empty() {
        upload = Some(image);
      }
    }
  }

  upload.ok_or(ServerError::MissingFile)
}
