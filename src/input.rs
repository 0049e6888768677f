// 该文件是 Maibing （麦病） 项目的一部分。
// src/input.rs - 图像上传与临时文件
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
  io::Write,
  path::{Path, PathBuf},
};

use tempfile::TempPath;
use thiserror::Error;
use tracing::{debug, warn};

mod read_image_file;
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

/// 允许上传的文件扩展名
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

const TEMP_FILE_PREFIX: &str = "maibing-";

#[derive(Error, Debug)]
pub enum InputError {
  #[error("不支持的文件类型: {0}，仅支持 jpg / jpeg / png")]
  UnsupportedType(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
  Jpeg,
  Png,
}

impl ImageKind {
  /// 根据文件扩展名判断图像类型（不区分大小写）
  pub fn from_file_name(file_name: &str) -> Result<Self, InputError> {
    let extension = Path::new(file_name)
      .extension()
      .and_then(|ext| ext.to_str())
      .map(|ext| ext.to_ascii_lowercase())
      .ok_or_else(|| InputError::UnsupportedType(file_name.to_string()))?;

    match extension.as_str() {
      "jpg" | "jpeg" => Ok(ImageKind::Jpeg),
      "png" => Ok(ImageKind::Png),
      _ => Err(InputError::UnsupportedType(file_name.to_string())),
    }
  }

  pub fn extension(&self) -> &'static str {
    match self {
      ImageKind::Jpeg => "jpg",
      ImageKind::Png => "png",
    }
  }
}

/// 用户上传的图像，创建时即完成类型校验
#[derive(Debug, Clone)]
pub struct UploadedImage {
  file_name: String,
  kind: ImageKind,
  bytes: Vec<u8>,
}

impl UploadedImage {
  pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, InputError> {
    let file_name = file_name.into();
    let kind = ImageKind::from_file_name(&file_name)?;
    Ok(Self {
      file_name,
      kind,
      bytes,
    })
  }

  pub fn file_name(&self) -> &str {
    &self.file_name
  }

  pub fn kind(&self) -> ImageKind {
    self.kind
  }

  pub fn bytes(&self) -> &[u8] {
    &self.bytes
  }
}

/// 请求范围内的临时图像文件，离开作用域时删除
///
/// 删除失败只记录警告，不影响已经生成的结果。
#[derive(Debug)]
pub struct TempImageFile {
  path: Option<TempPath>,
}

impl TempImageFile {
  pub fn path(&self) -> &Path {
    match &self.path {
      Some(path) => &**path,
      None => Path::new(""),
    }
  }

  pub fn to_path_buf(&self) -> PathBuf {
    self.path().to_path_buf()
  }
}

impl Drop for TempImageFile {
  fn drop(&mut self) {
    if let Some(path) = self.path.take() {
      let shown = path.display().to_string();
      match path.close() {
        Ok(()) => debug!("已删除临时文件: {}", shown),
        Err(e) => warn!("删除临时文件 {} 失败: {}", shown, e),
      }
    }
  }
}

/// 将上传内容写入唯一命名的临时文件
///
/// `temp_dir` 为空时使用系统临时目录。
pub fn persist_upload(
  upload: &UploadedImage,
  temp_dir: Option<&Path>,
) -> Result<TempImageFile, InputError> {
  let suffix = format!(".{}", upload.kind().extension());
  let mut builder = tempfile::Builder::new();
  builder.prefix(TEMP_FILE_PREFIX).suffix(&suffix);
  let mut file = match temp_dir {
    Some(dir) => builder.tempfile_in(dir)?,
    None => builder.tempfile()?,
  };

  file.write_all(upload.bytes())?;
  file.flush()?;
  let path = file.into_temp_path();
  debug!(
    "上传文件 {} ({} 字节) 已写入 {}",
    upload.file_name(),
    upload.bytes().len(),
    path.display()
  );

  Ok(TempImageFile { path: Some(path) })
}
