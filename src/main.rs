// 该文件是 Maibing （麦病） 项目的一部分。
// src/main.rs - 网页服务入口
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

mod args;

use actix_web::{App, HttpServer, middleware, web};
use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use maibing::{
  FromUrl,
  model::{ModelLoader, WheatDisease, Yolov8, Yolov8Builder, Yolov8Error},
  output::Draw,
  server::{AppState, configure},
  task::RequestTask,
};

type DiseaseModel = Yolov8<WheatDisease>;

#[actix_web::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型地址: {}", args.model);
  info!("监听地址: {}", args.bind);
  info!("工作线程数量: {}", args.workers);

  let model_url = args.model.clone();
  let loader = ModelLoader::new(move || -> Result<DiseaseModel, Yolov8Error> {
    Yolov8Builder::from_url(&model_url)?.build()
  });

  // 模型加载失败时不启动服务
  let model = loader.load().inspect_err(|e| error!("模型加载失败: {}", e))?;

  let mut task = RequestTask::new();
  if let Some(temp_dir) = &args.temp_dir {
    info!("临时文件目录: {}", temp_dir.display());
    task = task.with_temp_dir(temp_dir);
  }

  let state = web::Data::new(AppState::new(model, Draw::new()?, task));

  info!("启动服务: http://{}", args.bind);
  HttpServer::new(move || {
    App::new()
      .wrap(middleware::Logger::default())
      .app_data(state.clone())
      .configure(configure::<DiseaseModel>)
  })
  .workers(args.workers)
  .bind(&args.bind)?
  .run()
  .await?;

  info!("服务已停止");
  Ok(())
}
