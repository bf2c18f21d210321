//! 单阶段钩子适配器：将闭包包装成 [`DownloadHook`]，供 `with_xx_hook` 使用。

use crate::internal::http_download::traits::download_hook::DownloadHook;

use super::download_snapshot::DownloadSnapshot;

/// 仅实现「进度」的钩子适配器。
pub(crate) struct OnProgressHookAdapter<F>(pub(crate) F);

impl<F> DownloadHook for OnProgressHookAdapter<F>
where
    F: Fn(&DownloadSnapshot, u64) + Send + Sync + 'static,
{
    fn on_progress(&self, snapshot: &DownloadSnapshot, bytes_read: u64) {
        (self.0)(snapshot, bytes_read);
    }
}

/// 仅实现「失败」的钩子适配器。
pub(crate) struct OnErrorHookAdapter<F>(pub(crate) F);

impl<F> DownloadHook for OnErrorHookAdapter<F>
where
    F: Fn(&DownloadSnapshot) + Send + Sync + 'static,
{
    fn on_error(&self, snapshot: &DownloadSnapshot) {
        (self.0)(snapshot);
    }
}
