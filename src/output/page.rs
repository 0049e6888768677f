// 该文件是 Maibing （麦病） 项目的一部分。
// src/output/page.rs - 网页渲染
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

use std::fmt::Write;

use base64::prelude::*;
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::input::ACCEPTED_EXTENSIONS;

pub const PAGE_TITLE: &str = "🌾 Wheat Disease Detection";
pub const PAGE_CAPTION: &str = "Upload an image to detect plant diseases using YOLOv8";
pub const SUPPORTED_DISEASES_NOTE: &str = "This model can detect only these diseases: Aphid, Black Rust, Blast, Brown Rust, Common Root Rot, Fusarium Head, Leaf Blight, Mildew, Mite, Septoria, Smut, Stem_fly, Tan spot, Yellow Rust";

const STYLE: &str = "body{font-family:sans-serif;max-width:760px;margin:2rem auto;padding:0 1rem}\
.info{background:#e8f1fb;border-radius:6px;padding:.8rem 1rem;color:#0b4a8b}\
.error{background:#fdecea;border-radius:6px;padding:.8rem 1rem;color:#8a1c12}\
figure{margin:1.2rem 0}figure img{width:100%}figcaption{color:#666;text-align:center}";

/// 单张图像的检测结果段落
pub struct ResultSection<'a> {
  /// 标注图像的 data URI
  pub annotated_image: &'a str,
  pub summary: &'a str,
}

pub fn upload_page() -> String {
  let mut body = String::new();
  push_header(&mut body);
  push_upload_form(&mut body);
  wrap(&body)
}

pub fn result_page(file_name: &str, original_image: &str, sections: &[ResultSection<'_>]) -> String {
  let mut body = String::new();
  push_header(&mut body);
  push_upload_form(&mut body);

  let _ = write!(
    body,
    "<figure><img src=\"{}\" alt=\"{}\"><figcaption>Uploaded Image (Original)</figcaption></figure>\
     <p>🔍 Detecting diseases...</p>",
    encode_double_quoted_attribute(original_image),
    encode_double_quoted_attribute(file_name),
  );
  for section in sections {
    let _ = write!(
      body,
      "<figure><img src=\"{}\" alt=\"Detected Diseases\"><figcaption>Detected Diseases</figcaption></figure>\
       <h3>🦠 Detected Diseases:</h3><p class=\"summary\">{}</p>",
      encode_double_quoted_attribute(section.annotated_image),
      encode_text(section.summary),
    );
  }
  wrap(&body)
}

pub fn error_page(message: &str) -> String {
  let mut body = String::new();
  push_header(&mut body);
  push_upload_form(&mut body);
  let _ = write!(body, "<div class=\"error\">❌ {}</div>", encode_text(message));
  wrap(&body)
}

fn push_header(body: &mut String) {
  let _ = write!(
    body,
    "<h1>{}</h1><div class=\"info\">ℹ️ <strong>Note:</strong> {}</div><p>{}</p>",
    PAGE_TITLE, SUPPORTED_DISEASES_NOTE, PAGE_CAPTION
  );
}

/// 文件选择框的 accept 属性，与上传校验使用同一份扩展名列表
pub fn accept_attribute() -> String {
  ACCEPTED_EXTENSIONS
    .iter()
    .map(|ext| format!(".{}", ext))
    .collect::<Vec<_>>()
    .join(",")
}

fn push_upload_form(body: &mut String) {
  let _ = write!(
    body,
    "<form action=\"/detect\" method=\"post\" enctype=\"multipart/form-data\">\
     <label for=\"image\">Upload an Image</label> \
     <input type=\"file\" id=\"image\" name=\"image\" accept=\"{}\" required> \
     <button type=\"submit\">Detect</button></form>",
    accept_attribute()
  );
}

fn wrap(body: &str) -> String {
  format!(
    "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
     <title>{}</title><style>{}</style></head><body>{}</body></html>",
    PAGE_TITLE, STYLE, body
  )
}

/// PNG 字节转为可直接嵌入页面的 data URI
pub fn png_data_uri(png: &[u8]) -> String {
  format!("data:image/png;base64,{}", BASE64_STANDARD.encode(png))
}
