// 该文件是 Maibing （麦病） 项目的一部分。
// src/model.rs - 模型
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

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem<T> {
  pub kind: T,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，相对原图归一化
}

#[derive(Debug, Clone)]
pub struct DetectResult<T> {
  pub items: Box<[DetectItem<T>]>,
}

impl<T> DetectResult<T> {
  pub fn empty() -> Self {
    Self {
      items: Box::new([]),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, DetectItem<T>> {
    self.items.iter()
  }
}

impl<T> From<Vec<DetectItem<T>>> for DetectResult<T> {
  fn from(items: Vec<DetectItem<T>>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

/// 类别标签，与模型输出的类别索引一一对应
pub trait WithLabel: Sized + Copy + std::fmt::Debug {
  /// 模型输出的类别数量
  const CLASS_NUM: usize;

  fn to_label_str(&self) -> &'static str;
  fn to_label_id(&self) -> u32;
  /// 索引越界说明模型与词表不匹配，实现应当直接 panic
  fn from_label_id(id: u32) -> Self;
}

mod label;
pub use self::label::{DISEASE_CLASS_NUM, DISEASE_VOCABULARY, WheatDisease, label_of};

mod loader;
pub use self::loader::ModelLoader;

mod yolov8;
pub use self::yolov8::{Yolov8, Yolov8Builder, Yolov8Error};
