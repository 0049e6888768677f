// 该文件是 Maibing （麦病） 项目的一部分。
// src/bin/simple_oneshot.rs - 单张图像检测
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use maibing::{
  FromUrl,
  input::ImageFileInput,
  model::{WheatDisease, Yolov8, Yolov8Builder},
  output::SaveImageFileOutput,
  task::{OneShotTask, Task},
};
use tracing::info;

/// 对单张图像运行病害检测并保存标注结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址，例如 yolov8:best_14.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像，例如 image:///data/leaf.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出图像，例如 image:///data/leaf_annotated.png
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input_image = ImageFileInput::from_url(&args.input)?;
  let model: Yolov8<WheatDisease> = Yolov8Builder::from_url(&args.model)?.build()?;
  let output = SaveImageFileOutput::from_url(&args.output)?;

  OneShotTask.run_task(input_image, model, output)?;

  Ok(())
}
