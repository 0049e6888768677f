// 该文件是 Maibing （麦病） 项目的一部分。
// src/model/loader.rs - 模型缓存加载
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

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, info};

type InitFn<M, E> = Box<dyn Fn() -> Result<M, E> + Send + Sync>;

/// 进程级模型缓存
///
/// 初始化函数最多成功执行一次，之后的 `load` 直接返回同一个实例。
/// 并发调用时由 `OnceCell` 保证只有一个线程执行初始化。
pub struct ModelLoader<M, E> {
  cell: OnceCell<Arc<M>>,
  init: InitFn<M, E>,
}

impl<M, E> ModelLoader<M, E> {
  pub fn new<F>(init: F) -> Self
  where
    F: Fn() -> Result<M, E> + Send + Sync + 'static,
  {
    Self {
      cell: OnceCell::new(),
      init: Box::new(init),
    }
  }

  pub fn load(&self) -> Result<Arc<M>, E> {
    if let Some(model) = self.cell.get() {
      debug!("使用已缓存的模型");
      return Ok(model.clone());
    }

    let model = self.cell.get_or_try_init(|| {
      info!("首次加载模型");
      (self.init)().map(Arc::new)
    })?;
    Ok(model.clone())
  }

  pub fn is_loaded(&self) -> bool {
    self.cell.get().is_some()
  }
}
