// 该文件是 Maibing （麦病） 项目的一部分。
// tests/common/mod.rs - 测试用模型与图像
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

#![allow(dead_code)]

use std::{
  path::Path,
  sync::atomic::{AtomicUsize, Ordering},
};

use image::{Rgb, RgbImage};
use maibing::{
  frame::Frame,
  model::{DetectItem, DetectResult, Model, WheatDisease, WithLabel},
  task::encode_png,
};

/// 返回固定检测结果的模型
pub struct FakeModel {
  items: Vec<DetectItem<WheatDisease>>,
  fail: bool,
  panics: bool,
  calls: AtomicUsize,
}

impl FakeModel {
  pub fn returning(class_ids: &[u32]) -> Self {
    let items = class_ids
      .iter()
      .enumerate()
      .map(|(i, &id)| {
        let offset = i as f32 * 0.1;
        DetectItem {
          kind: WheatDisease::from_label_id(id),
          score: 0.9,
          bbox: [0.1 + offset, 0.1 + offset, 0.4 + offset, 0.4 + offset],
        }
      })
      .collect();
    Self::with_items(items)
  }

  pub fn with_items(items: Vec<DetectItem<WheatDisease>>) -> Self {
    Self {
      items,
      fail: false,
      panics: false,
      calls: AtomicUsize::new(0),
    }
  }

  pub fn failing() -> Self {
    Self {
      items: Vec::new(),
      fail: true,
      panics: false,
      calls: AtomicUsize::new(0),
    }
  }

  /// 推理时直接 panic 的模型
  pub fn panicking() -> Self {
    Self {
      items: Vec::new(),
      fail: false,
      panics: true,
      calls: AtomicUsize::new(0),
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl Model for FakeModel {
  type Input = Frame;
  type Output = DetectResult<WheatDisease>;
  type Error = std::io::Error;

  fn infer(&self, _input: &Frame) -> Result<Self::Output, Self::Error> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if self.panics {
      panic!("模型推理崩溃");
    }
    if self.fail {
      return Err(std::io::Error::other("模型推理失败"));
    }
    Ok(DetectResult::from(self.items.clone()))
  }
}

pub fn leaf_image() -> RgbImage {
  RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 3) as u8, 120, (y * 5) as u8]))
}

pub fn leaf_png() -> Vec<u8> {
  encode_png(&leaf_image()).unwrap()
}

pub fn file_count(dir: &Path) -> usize {
  std::fs::read_dir(dir).unwrap().count()
}
