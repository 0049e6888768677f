// 该文件是 Maibing （麦病） 项目的一部分。
// src/output/report.rs - 检测结果摘要
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

use std::collections::BTreeSet;

use crate::model::{DetectResult, WithLabel};

/// 未检测到任何病害时显示的文本
pub const NO_DISEASE_MESSAGE: &str = "✅ No disease detected!";

/// 去重后的病害标签，按词表顺序排列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionReport {
  labels: Vec<&'static str>,
}

impl DetectionReport {
  pub fn from_result<T: WithLabel>(result: &DetectResult<T>) -> Self {
    let ids: BTreeSet<u32> = result.iter().map(|item| item.kind.to_label_id()).collect();
    let labels = ids
      .into_iter()
      .map(|id| T::from_label_id(id).to_label_str())
      .collect();
    Self { labels }
  }

  pub fn labels(&self) -> &[&'static str] {
    &self.labels
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn summary(&self) -> String {
    if self.labels.is_empty() {
      NO_DISEASE_MESSAGE.to_string()
    } else {
      self.labels.join(", ")
    }
  }
}

impl std::fmt::Display for DetectionReport {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.summary())
  }
}
