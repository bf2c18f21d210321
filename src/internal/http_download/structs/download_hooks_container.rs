use std::sync::Arc;

use crate::internal::http_download::traits::download_hook::DownloadHook;

use super::download_snapshot::DownloadSnapshot;
use super::hook_adapters::{OnErrorHookAdapter, OnProgressHookAdapter};

/// 钩子容器：进度回调 + 失败回调，都是可选的。
///
/// 传给 `start` 时只替换提供了的回调，未提供的沿用上一次的，方便复用同一个下载器。
#[derive(Default, Clone)]
pub struct DownloadHooks {
    progress: Option<Arc<dyn DownloadHook>>,
    error: Option<Arc<dyn DownloadHook>>,
}

impl DownloadHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同时作为进度回调和失败回调注册一个完整钩子。
    pub fn with_hook(mut self, hook: impl DownloadHook + 'static) -> Self {
        let hook: Arc<dyn DownloadHook> = Arc::new(hook);
        self.progress = Some(Arc::clone(&hook));
        self.error = Some(hook);
        self
    }

    pub fn with_progress_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(&DownloadSnapshot, u64) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(OnProgressHookAdapter(f)));
        self
    }

    pub fn with_error_hook<F>(mut self, f: F) -> Self
    where
        F: Fn(&DownloadSnapshot) + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(OnErrorHookAdapter(f)));
        self
    }

    pub fn has_progress_hook(&self) -> bool {
        self.progress.is_some()
    }

    pub fn has_error_hook(&self) -> bool {
        self.error.is_some()
    }

    /// 用 `other` 中提供了的回调覆盖当前回调。
    pub(crate) fn merge(&mut self, other: DownloadHooks) {
        if let Some(progress) = other.progress {
            self.progress = Some(progress);
        }
        if let Some(error) = other.error {
            self.error = Some(error);
        }
    }

    pub(crate) fn run_on_progress(&self, snapshot: &DownloadSnapshot, bytes_read: u64) {
        if let Some(h) = self.progress.as_ref() {
            h.on_progress(snapshot, bytes_read);
        }
    }

    pub(crate) fn run_on_error(&self, snapshot: &DownloadSnapshot) {
        if let Some(h) = self.error.as_ref() {
            h.on_error(snapshot);
        }
    }
}

impl std::fmt::Debug for DownloadHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadHooks")
            .field("progress", &self.progress.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}
