// 该文件是 Maibing （麦病） 项目的一部分。
// src/model/label.rs - 小麦病害词表
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

use crate::model::WithLabel;

pub const DISEASE_CLASS_NUM: usize = 14;

/// 病害名称，顺序必须与模型训练时的类别顺序一致
pub const DISEASE_VOCABULARY: [&str; DISEASE_CLASS_NUM] = [
  "Aphid",
  "Black Rust",
  "Blast",
  "Brown Rust",
  "Common Root Rot",
  "Fusarium Head",
  "Leaf Blight",
  "Mildew",
  "Mite",
  "Septoria",
  "Smut",
  "Stem_fly",
  "Tan spot",
  "yellow_rust",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum WheatDisease {
  Aphid = 0,
  BlackRust,
  Blast,
  BrownRust,
  CommonRootRot,
  FusariumHead,
  LeafBlight,
  Mildew,
  Mite,
  Septoria,
  Smut,
  StemFly,
  TanSpot,
  YellowRust,
}

impl WheatDisease {
  pub const ALL: [WheatDisease; DISEASE_CLASS_NUM] = [
    WheatDisease::Aphid,
    WheatDisease::BlackRust,
    WheatDisease::Blast,
    WheatDisease::BrownRust,
    WheatDisease::CommonRootRot,
    WheatDisease::FusariumHead,
    WheatDisease::LeafBlight,
    WheatDisease::Mildew,
    WheatDisease::Mite,
    WheatDisease::Septoria,
    WheatDisease::Smut,
    WheatDisease::StemFly,
    WheatDisease::TanSpot,
    WheatDisease::YellowRust,
  ];
}

/// 类别索引到病害名称的映射
///
/// # Panics
///
/// `class_index >= DISEASE_CLASS_NUM` 时 panic：这意味着模型与词表不匹配，
/// 继续执行只会输出错误的标签。
pub fn label_of(class_index: usize) -> &'static str {
  assert!(
    class_index < DISEASE_CLASS_NUM,
    "类别索引 {} 超出病害词表范围 (共 {} 类)，模型与词表不匹配",
    class_index,
    DISEASE_CLASS_NUM
  );
  DISEASE_VOCABULARY[class_index]
}

impl WithLabel for WheatDisease {
  const CLASS_NUM: usize = DISEASE_CLASS_NUM;

  fn to_label_str(&self) -> &'static str {
    label_of(*self as usize)
  }

  fn to_label_id(&self) -> u32 {
    *self as u32
  }

  fn from_label_id(id: u32) -> Self {
    let index = id as usize;
    assert!(
      index < DISEASE_CLASS_NUM,
      "类别索引 {} 超出病害词表范围 (共 {} 类)，模型与词表不匹配",
      index,
      DISEASE_CLASS_NUM
    );
    Self::ALL[index]
  }
}

impl std::fmt::Display for WheatDisease {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.to_label_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn vocabulary_matches_class_count() {
    assert_eq!(DISEASE_VOCABULARY.len(), WheatDisease::CLASS_NUM);
    assert_eq!(WheatDisease::ALL.len(), WheatDisease::CLASS_NUM);
  }

  #[test]
  fn label_of_is_a_stable_lookup() {
    for (i, expected) in DISEASE_VOCABULARY.iter().enumerate() {
      assert_eq!(label_of(i), *expected);
      assert_eq!(label_of(i), *expected);
    }
    assert_eq!(label_of(0), "Aphid");
    assert_eq!(label_of(3), "Brown Rust");
    assert_eq!(label_of(13), "yellow_rust");
  }

  #[test]
  fn enum_follows_vocabulary_order() {
    for (i, disease) in WheatDisease::ALL.iter().enumerate() {
      assert_eq!(disease.to_label_id() as usize, i);
      assert_eq!(disease.to_label_str(), DISEASE_VOCABULARY[i]);
      assert_eq!(WheatDisease::from_label_id(i as u32), *disease);
    }
    assert_eq!(WheatDisease::StemFly.to_string(), "Stem_fly");
  }

  #[test]
  #[should_panic(expected = "超出病害词表范围")]
  fn label_of_rejects_out_of_range_index() {
    label_of(DISEASE_CLASS_NUM);
  }

  #[test]
  #[should_panic(expected = "超出病害词表范围")]
  fn from_label_id_rejects_out_of_range_index() {
    WheatDisease::from_label_id(14);
  }
}
