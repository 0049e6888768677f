// 该文件是 Maibing （麦病） 项目的一部分。
// src/frame.rs - 推理帧定义
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

use image::{Rgb, RgbImage, imageops::FilterType};

const RGB_CHANNELS: usize = 3;
const LETTERBOX_FILL: u8 = 114;

/// 模型输入：原图与本次推理使用的置信度阈值
#[derive(Debug, Clone)]
pub struct Frame {
  pub image: RgbImage,
  pub confidence_threshold: f32,
}

impl Frame {
  pub fn new(image: RgbImage, confidence_threshold: f32) -> Self {
    Self {
      image,
      confidence_threshold,
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

/// 等比缩放并填充到 W x H 的 NCHW 浮点帧，像素归一化到 [0, 1]
#[derive(Debug, Clone)]
pub struct LetterboxFrame<const W: u32, const H: u32> {
  data: Box<[f32]>,
  scale: f32,
  pad_x: f32,
  pad_y: f32,
  source_width: u32,
  source_height: u32,
}

impl<const W: u32, const H: u32> LetterboxFrame<W, H> {
  pub fn from_rgb_image(image: &RgbImage) -> Self {
    let (source_width, source_height) = image.dimensions();
    let scale = (W as f32 / source_width as f32).min(H as f32 / source_height as f32);
    let resized_w = ((source_width as f32 * scale).round() as u32).clamp(1, W);
    let resized_h = ((source_height as f32 * scale).round() as u32).clamp(1, H);
    let pad_left = (W - resized_w) / 2;
    let pad_top = (H - resized_h) / 2;

    let resized = image::imageops::resize(image, resized_w, resized_h, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(W, H, Rgb([LETTERBOX_FILL; 3]));
    image::imageops::replace(&mut canvas, &resized, pad_left as i64, pad_top as i64);

    let plane = (W * H) as usize;
    let mut data = vec![0f32; RGB_CHANNELS * plane];
    for (x, y, pixel) in canvas.enumerate_pixels() {
      let idx = (y * W + x) as usize;
      for c in 0..RGB_CHANNELS {
        data[c * plane + idx] = pixel[c] as f32 / 255.0;
      }
    }

    Self {
      data: data.into_boxed_slice(),
      scale,
      pad_x: pad_left as f32,
      pad_y: pad_top as f32,
      source_width,
      source_height,
    }
  }

  pub fn as_nchw(&self) -> &[f32] {
    &self.data
  }

  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, H as usize, W as usize]
  }

  pub fn scale(&self) -> f32 {
    self.scale
  }

  pub fn padding(&self) -> (f32, f32) {
    (self.pad_x, self.pad_y)
  }

  /// 将模型输入坐标系下的 [x_min, y_min, x_max, y_max] 映射回原图并归一化
  pub fn to_source_normalized(&self, bbox: [f32; 4]) -> [f32; 4] {
    let (w, h) = (self.source_width as f32, self.source_height as f32);
    let x_min = ((bbox[0] - self.pad_x) / self.scale).clamp(0.0, w);
    let y_min = ((bbox[1] - self.pad_y) / self.scale).clamp(0.0, h);
    let x_max = ((bbox[2] - self.pad_x) / self.scale).clamp(0.0, w);
    let y_max = ((bbox[3] - self.pad_y) / self.scale).clamp(0.0, h);
    [x_min / w, y_min / h, x_max / w, y_max / h]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn letterbox_wide_image_pads_vertically() {
    let image = RgbImage::from_pixel(1280, 640, Rgb([255, 0, 0]));
    let frame = LetterboxFrame::<640, 640>::from_rgb_image(&image);

    assert_eq!(frame.shape(), [1, 3, 640, 640]);
    assert!((frame.scale() - 0.5).abs() < 1e-6);
    assert_eq!(frame.padding(), (0.0, 160.0));

    let data = frame.as_nchw();
    let plane = 640 * 640;
    // 填充区域为灰色
    assert!((data[0] - 114.0 / 255.0).abs() < 1e-6);
    // 图像区域红色通道为 1，绿色通道为 0
    let center = 320 * 640 + 320;
    assert!((data[center] - 1.0).abs() < 0.01);
    assert!(data[plane + center].abs() < 0.01);
  }

  #[test]
  fn boxes_map_back_to_normalized_source_coordinates() {
    let image = RgbImage::new(1280, 640);
    let frame = LetterboxFrame::<640, 640>::from_rgb_image(&image);

    let bbox = frame.to_source_normalized([0.0, 160.0, 320.0, 320.0]);
    assert_eq!(bbox, [0.0, 0.0, 0.5, 0.5]);

    // 超出原图的部分被裁剪
    let clipped = frame.to_source_normalized([600.0, 100.0, 700.0, 500.0]);
    assert_eq!(clipped[1], 0.0);
    assert_eq!(clipped[2], 1.0);
  }
}
