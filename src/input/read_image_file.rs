// 该文件是 Maibing （麦病） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::path::Path;

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{ImageKind, InputError},
  url_file_path,
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI scheme mismatch: expected '{expected}', found '{found}'")]
  SchemaMismatch { expected: String, found: String },
  #[error("Unsupported input: {0}")]
  Unsupported(#[from] InputError),
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 从磁盘读取的单张图像，迭代时产出一帧
pub struct ImageFileInput {
  image: Option<RgbImage>,
  confidence_threshold: f32,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch {
        expected: Self::SCHEME.to_string(),
        found: url.scheme().to_string(),
      });
    }

    let path = url_file_path(url);
    ImageKind::from_file_name(&path)?;
    Self::open(path)
  }
}

impl ImageFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageFileInputError> {
    let image = Self::decode(path)?;
    Ok(ImageFileInput {
      image: Some(image),
      confidence_threshold: crate::CONFIDENCE_THRESHOLD,
    })
  }

  /// 按文件内容识别格式并解码为 RGB 图像
  pub fn decode(path: impl AsRef<Path>) -> Result<RgbImage, ImageFileInputError> {
    let path = path.as_ref();
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    debug!(
      "读取图像 {}: {}x{}",
      path.display(),
      image.width(),
      image.height()
    );
    Ok(image.into_rgb8())
  }

  pub fn with_confidence_threshold(mut self, confidence_threshold: f32) -> Self {
    self.confidence_threshold = confidence_threshold;
    self
  }
}

impl Iterator for ImageFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    self
      .image
      .take()
      .map(|image| Frame::new(image, self.confidence_threshold))
  }
}
