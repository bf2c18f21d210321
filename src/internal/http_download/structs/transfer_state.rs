use super::content_state::ContentState;
use super::download_content::DownloadContent;
use super::download_error_code::DownloadErrorCode;
use super::download_hooks_container::DownloadHooks;
use super::download_snapshot::DownloadSnapshot;
use super::request_handle::RequestHandle;
use super::timeout_guard::TimeoutGuard;

/// 一次下载的全部可变状态，只在下载器的互斥锁内读写。
#[derive(Debug)]
pub(crate) struct TransferState {
    pub(crate) root: String,
    pub(crate) local_name: String,
    pub(crate) done: bool,
    pub(crate) error_code: DownloadErrorCode,
    pub(crate) total_length: i64,
    pub(crate) completed_length: u64,
    pub(crate) content: Option<DownloadContent>,
    pub(crate) request: Option<RequestHandle>,
    pub(crate) timeout: TimeoutGuard,
    pub(crate) hooks: DownloadHooks,
    /// 每次 `start` 自增，用来识别已被取代的尝试的过期回调
    pub(crate) attempt: u64,
}

impl TransferState {
    pub(crate) fn new(timeout: TimeoutGuard) -> Self {
        Self {
            root: String::new(),
            local_name: String::new(),
            done: false,
            error_code: DownloadErrorCode::None,
            total_length: 0,
            completed_length: 0,
            content: None,
            request: None,
            timeout,
            hooks: DownloadHooks::default(),
            attempt: 0,
        }
    }

    /// 该尝试是否仍持有在途请求句柄；否则它的后续回调都是空操作。
    pub(crate) fn is_current(&self, attempt: u64) -> bool {
        self.request
            .as_ref()
            .is_some_and(|r| r.attempt() == attempt && !r.is_aborted())
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        self.request.is_some() || self.content.is_some()
    }

    /// 进入终态：标记并关闭内容持有者、中止并清空请求句柄、注销看门狗。
    pub(crate) fn release(&mut self, terminal: ContentState) {
        if let Some(mut content) = self.content.take() {
            content.set_state(terminal);
            content.close();
        }
        if let Some(request) = self.request.take() {
            request.abort();
        }
        self.timeout.unregister();
    }

    pub(crate) fn snapshot(&self, url: &str) -> DownloadSnapshot {
        DownloadSnapshot {
            url: url.to_string(),
            root: self.root.clone(),
            local_name: self.local_name.clone(),
            done: self.done,
            error_code: self.error_code,
            total_length: self.total_length,
            completed_length: self.completed_length,
        }
    }
}
