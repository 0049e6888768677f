// 该文件是 Maibing （麦病） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use ab_glyph::{FontArc, InvalidFont, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use thiserror::Error;

use crate::{
  model::{DetectItem, DetectResult, WithLabel},
  output::color::{AnnotatedImage, ChannelOrder, swap_red_blue},
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_TEXT_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("无法加载嵌入的字体文件: {0}")]
  Font(#[from] InvalidFont),
}

/// 检测框绘制工具
///
/// 画布使用推理运行时的 BGR 通道顺序，输出的 `AnnotatedImage` 带有该顺序标记，
/// 显示前需要转换为 RGB。
pub struct Draw {
  font: FontArc,
  font_scale: PxScale,
  canvas_order: ChannelOrder,
}

impl Draw {
  pub fn new() -> Result<Self, DrawError> {
    let font_data: &'static [u8] = include_bytes!("../../assets/DejaVuSans.ttf");
    let font = FontArc::try_from_slice(font_data)?;

    Ok(Self {
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      canvas_order: ChannelOrder::Bgr,
    })
  }

  /// 在原图副本上绘制检测结果，原图保持不变
  pub fn annotate<T: WithLabel>(&self, original: &RgbImage, result: &DetectResult<T>) -> AnnotatedImage {
    let mut canvas = original.clone();
    if self.canvas_order == ChannelOrder::Bgr {
      swap_red_blue(&mut canvas);
    }
    self.draw_detections_on_image(&mut canvas, result);
    AnnotatedImage::new(canvas, self.canvas_order)
  }

  /// 当前画布顺序下的类别颜色
  fn canvas_color(&self, class_id: u32, class_num: usize) -> Rgb<u8> {
    let Rgb([r, g, b]) = class_color(class_id, class_num);
    match self.canvas_order {
      ChannelOrder::Rgb => Rgb([r, g, b]),
      ChannelOrder::Bgr => Rgb([b, g, r]),
    }
  }

  // bbox 为归一化坐标 [x_min, y_min, x_max, y_max]
  fn draw_bbox_with_label<T: WithLabel>(&self, image: &mut RgbImage, item: &DetectItem<T>) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let x_min = ((item.bbox[0] * w as f32).floor() as i32).clamp(0, w - 1);
    let y_min = ((item.bbox[1] * h as f32).floor() as i32).clamp(0, h - 1);
    let x_max = ((item.bbox[2] * w as f32).ceil() as i32).clamp(0, w - 1);
    let y_max = ((item.bbox[3] * h as f32).ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    let color = self.canvas_color(item.kind.to_label_id(), T::CLASS_NUM);

    // 边框向内加粗
    for t in 0..BOX_THICKNESS {
      let width = x_max - x_min - 2 * t + 1;
      let height = y_max - y_min - 2 * t + 1;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, color);
    }

    let label = format!("{} {:.2}", item.kind.to_label_str(), item.score);
    let (text_w, text_h) = text_size(self.font_scale, &self.font, &label);
    let label_w = (text_w as i32 + 2 * LABEL_TEXT_PADDING).min(w - x_min);
    let label_h = text_h as i32 + 2 * LABEL_TEXT_PADDING;

    // 框上方放不下时放进框内
    let label_y = if y_min >= label_h { y_min - label_h } else { y_min };

    if label_w > 0 && label_h > 0 {
      let rect = Rect::at(x_min, label_y).of_size(label_w as u32, label_h as u32);
      draw_filled_rect_mut(image, rect, color);
      draw_text_mut(
        image,
        TEXT_COLOR,
        x_min + LABEL_TEXT_PADDING,
        label_y + LABEL_TEXT_PADDING,
        self.font_scale,
        &self.font,
        &label,
      );
    }
  }
}

pub trait DrawDetectionOnImage<T: WithLabel> {
  fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult<T>);
}

impl<T: WithLabel> DrawDetectionOnImage<T> for Draw {
  fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult<T>) {
    for item in result.iter() {
      self.draw_bbox_with_label(image, item);
    }
  }
}

/// 类别颜色（RGB），色相在类别间均匀分布
pub fn class_color(class_id: u32, class_num: usize) -> Rgb<u8> {
  let class_num = class_num.max(1) as f32;
  let hue = (class_id as f32 % class_num) / class_num * 360.0;
  hsv_to_rgb(hue, 0.8, 0.9)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = match h {
    h if h < 60.0 => (c, x, 0.0),
    h if h < 120.0 => (x, c, 0.0),
    h if h < 180.0 => (0.0, c, x),
    h if h < 240.0 => (0.0, x, c),
    h if h < 300.0 => (x, 0.0, c),
    _ => (c, 0.0, x),
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{DISEASE_CLASS_NUM, WheatDisease};

  fn black(w: u32, h: u32) -> RgbImage {
    RgbImage::from_pixel(w, h, Rgb([0, 0, 0]))
  }

  #[test]
  fn box_is_drawn_in_class_color_after_conversion() {
    let draw = Draw::new().unwrap();
    let original = black(100, 100);
    let result = DetectResult::from(vec![DetectItem {
      kind: WheatDisease::BrownRust,
      score: 0.9,
      bbox: [0.25, 0.25, 0.75, 0.75],
    }]);

    let annotated = draw.annotate(&original, &result);
    assert_eq!(annotated.order(), ChannelOrder::Bgr);

    let rgb = annotated.into_rgb_image();
    let expected = class_color(WheatDisease::BrownRust.to_label_id(), DISEASE_CLASS_NUM);
    assert_eq!(*rgb.get_pixel(25, 60), expected);
    assert_eq!(*rgb.get_pixel(26, 60), expected);
    assert_eq!(*rgb.get_pixel(50, 60), Rgb([0, 0, 0]));

    // 原图不被修改
    assert!(original.pixels().all(|p| p.0 == [0, 0, 0]));
  }

  #[test]
  fn empty_result_only_changes_channel_order() {
    let draw = Draw::new().unwrap();
    let original = RgbImage::from_pixel(4, 4, Rgb([200, 100, 50]));
    let annotated = draw.annotate(&original, &DetectResult::<WheatDisease>::empty());

    assert_eq!(annotated.pixels().get_pixel(0, 0).0, [50, 100, 200]);
    assert_eq!(annotated.into_rgb_image(), original);
  }

  #[test]
  fn degenerate_boxes_are_skipped() {
    let draw = Draw::new().unwrap();
    let original = black(3, 3);
    let result = DetectResult::from(vec![
      DetectItem {
        kind: WheatDisease::Aphid,
        score: 0.5,
        bbox: [0.5, 0.5, 0.5, 0.5],
      },
      DetectItem {
        kind: WheatDisease::Mite,
        score: 0.5,
        bbox: [0.0, 0.0, 1.0, 1.0],
      },
    ]);

    let rgb = draw.annotate(&original, &result).into_rgb_image();
    assert_eq!(rgb.dimensions(), (3, 3));
  }

  #[test]
  fn palette_distinguishes_classes() {
    let colors: std::collections::HashSet<_> = (0..DISEASE_CLASS_NUM as u32)
      .map(|id| class_color(id, DISEASE_CLASS_NUM).0)
      .collect();
    assert_eq!(colors.len(), DISEASE_CLASS_NUM);
  }
}
