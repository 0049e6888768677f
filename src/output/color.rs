// 该文件是 Maibing （麦病） 项目的一部分。
// src/output/color.rs - 通道顺序转换
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

use image::RgbImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
  Rgb,
  Bgr,
}

/// 三通道像素缓冲区及其通道顺序
///
/// 像素按 `order` 存放在 `RgbImage` 中，`Bgr` 时第 0 通道是蓝色。
#[derive(Debug, Clone)]
pub struct AnnotatedImage {
  pixels: RgbImage,
  order: ChannelOrder,
}

impl AnnotatedImage {
  pub fn new(pixels: RgbImage, order: ChannelOrder) -> Self {
    Self { pixels, order }
  }

  pub fn order(&self) -> ChannelOrder {
    self.order
  }

  pub fn pixels(&self) -> &RgbImage {
    &self.pixels
  }

  /// 转换到目标通道顺序，顺序相同时原样返回
  pub fn into_order(mut self, target: ChannelOrder) -> Self {
    if self.order != target {
      swap_red_blue(&mut self.pixels);
      self.order = target;
    }
    self
  }

  /// 转换为显示用的 RGB 图像
  pub fn into_rgb_image(self) -> RgbImage {
    self.into_order(ChannelOrder::Rgb).pixels
  }
}

pub(crate) fn swap_red_blue(image: &mut RgbImage) {
  for pixel in image.pixels_mut() {
    pixel.0.swap(0, 2);
  }
}
