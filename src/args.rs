// 该文件是 Maibing （麦病） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use clap::{Parser, builder::RangedU64ValueParser};
use url::Url;

/// 小麦病害检测网页服务
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址，支持 yolov8:<path>?iou=<f32>&threads=<n>
  #[arg(long, value_name = "MODEL", default_value = "yolov8:best_14.onnx")]
  pub model: Url,

  /// 监听地址
  #[arg(long, value_name = "ADDR", default_value = "0.0.0.0:8501")]
  pub bind: String,

  /// 工作线程数量
  #[arg(
    long,
    value_name = "N",
    default_value_t = 1,
    value_parser = RangedU64ValueParser::<usize>::new().range(1..)
  )]
  pub workers: usize,

  /// 上传文件的临时目录，默认为系统临时目录
  #[arg(long, value_name = "DIR")]
  pub temp_dir: Option<PathBuf>,
}
