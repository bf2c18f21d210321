//! 下载回调 trait：进度通知与失败通知。

use crate::internal::http_download::structs::DownloadSnapshot;

/// 下载流程钩子。
///
/// 两个方法都在下载器的锁内被调用，拿到的是当时的状态快照；实现里不要阻塞。
/// 使用方式二选一（可混用）：
/// - **单阶段**：用 `with_progress_hook` / `with_error_hook` 传入闭包；
/// - **完整钩子**：实现本 trait，通过 `with_hook` 注册。
pub trait DownloadHook: Send + Sync {
    /// 每读到一个缓冲区大小的数据块调用一次；流结束时再以 `0` 调用一次。
    fn on_progress(&self, _snapshot: &DownloadSnapshot, _bytes_read: u64) {}

    /// 每次失败的尝试调用且只调用一次，此时资源已释放、错误码已设置。
    fn on_error(&self, _snapshot: &DownloadSnapshot) {}
}
