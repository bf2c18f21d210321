//! 单文件可续传 HTTP 下载器。
//!
//! `start` 立即返回，协议完全由后台任务的各个延续推进；`start / cancel / abort`、
//! 响应回调、续传响应回调、读取回调和超时回调全部在同一把互斥锁内执行，
//! 同一个下载器的状态转换因此是串行的。不同下载器之间没有任何共享状态。

mod protocol;
pub(crate) mod request;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::internal::states::unlock_reactive::{PropertyWatcher, UnlockReactiveProperty};

use super::content_state::ContentState;
use super::download_config::DownloaderConfig;
use super::download_content::DownloadContent;
use super::download_error::DownloadError;
use super::download_error_code::DownloadErrorCode;
use super::download_hooks_container::DownloadHooks;
use super::download_snapshot::{full_name, DownloadSnapshot};
use super::request_handle::RequestHandle;
use super::timeout_guard::{wait_pair, TimeoutGuard};
use super::transfer_state::TransferState;

/// 下载器内部共享部分：后台任务、看门狗回调都持有它的 `Arc`。
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) url: String,
    pub(crate) config: DownloaderConfig,
    pub(crate) client: reqwest::Client,
    pub(crate) state: Mutex<TransferState>,
    pub(crate) snapshot: UnlockReactiveProperty<DownloadSnapshot>,
}

/// 一次单文件下载（Transfer）。
///
/// 终态只有三种：完成、失败、取消。失败（包括取消）时 `done` 保持 `false`，
/// 调用方应以错误回调或 `error_code` 判断失败，而不是只看 `done`。
#[derive(Debug)]
pub struct HttpDownloader {
    shared: Arc<Shared>,
}

impl HttpDownloader {
    /// 用默认配置创建下载器，`url` 是请求目标的前缀。
    pub fn new(url: &str) -> Result<Self, DownloadError> {
        Self::with_config(url, DownloaderConfig::default())
    }

    pub fn with_config(url: &str, config: DownloaderConfig) -> Result<Self, DownloadError> {
        let client = request::build_client(&config)?;
        let timeout = TimeoutGuard::new(config.request_timeout());
        let state = TransferState::new(timeout);
        let snapshot = UnlockReactiveProperty::new(state.snapshot(url));

        Ok(Self {
            shared: Arc::new(Shared {
                url: url.to_string(),
                config,
                client,
                state: Mutex::new(state),
                snapshot,
            }),
        })
    }

    /// 修改看门狗超时（毫秒），只能在第一次 `start` 之前调用。
    pub fn request_timeout(self, timeout_ms: u64) -> Result<Self, DownloadError> {
        self.reconfigure(|config| config.request_timeout_ms = timeout_ms)
    }

    /// 修改读缓冲区大小，只能在第一次 `start` 之前调用。
    pub fn buffer_size(self, buffer_size: usize) -> Result<Self, DownloadError> {
        self.reconfigure(|config| config.buffer_size = buffer_size)
    }

    fn reconfigure(
        mut self,
        update: impl FnOnce(&mut DownloaderConfig),
    ) -> Result<Self, DownloadError> {
        let shared = Arc::get_mut(&mut self.shared).ok_or(DownloadError::AlreadyStarted)?;
        let state = shared.state.get_mut();
        if state.attempt > 0 {
            return Err(DownloadError::AlreadyStarted);
        }

        let mut config = shared.config.clone();
        update(&mut config);
        shared.client = request::build_client(&config)?;
        state.timeout = TimeoutGuard::new(config.request_timeout());
        shared.config = config;
        Ok(self)
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.shared.config
    }

    /// 最近一次发布的状态快照
    pub fn snapshot(&self) -> DownloadSnapshot {
        self.shared.snapshot.get_current().unwrap_or_default()
    }

    /// 状态快照的响应式属性，可 `watch()` 监听每次状态转换。
    pub fn progress(&self) -> UnlockReactiveProperty<DownloadSnapshot> {
        self.shared.snapshot.clone()
    }

    pub fn watch(&self) -> PropertyWatcher<DownloadSnapshot> {
        self.shared.snapshot.watch()
    }

    pub fn is_done(&self) -> bool {
        self.snapshot().done
    }

    pub fn error_code(&self) -> DownloadErrorCode {
        self.snapshot().error_code
    }

    pub fn total_length(&self) -> i64 {
        self.snapshot().total_length
    }

    pub fn completed_length(&self) -> u64 {
        self.snapshot().completed_length
    }

    pub fn local_name(&self) -> String {
        self.snapshot().local_name
    }

    /// 开始（或重新开始）下载 `root/local_name`，立即返回。
    ///
    /// 上一次尝试若仍在进行，会在锁内先被中止（不触发回调）再重置状态。
    /// `hooks` 中没提供的回调沿用之前注册的。
    pub async fn start(&self, root: &str, local_name: &str, hooks: DownloadHooks) {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;

        if state.is_in_flight() {
            debug!(
                url = %shared.url,
                local_name = %state.local_name,
                attempt = state.attempt,
                "中止上一次仍在进行的下载"
            );
            state.release(ContentState::Failed);
        }

        state.attempt += 1;
        let attempt = state.attempt;
        state.root = root.to_string();
        state.local_name = local_name.to_string();
        state.hooks.merge(hooks);
        state.done = false;
        state.error_code = DownloadErrorCode::None;
        state.completed_length = 0;
        state.total_length = 0;

        let Some(full_path) = full_name(root, local_name) else {
            shared.fail_with(
                &mut state,
                DownloadError::EmptyTarget {
                    root: root.to_string(),
                    local_name: local_name.to_string(),
                },
            );
            return;
        };
        let content = DownloadContent::open(full_path, shared.config.buffer_size).await;
        let last_modified = content.last_modified();
        state.content = Some(content);

        let handle = RequestHandle::new(attempt);
        let token = handle.token();
        state.request = Some(handle);
        shared.publish(&state);

        let request = match request::target_url(&shared.url, local_name) {
            Ok(target) => request::fresh_request(&shared.client, &target, last_modified),
            Err(e) => {
                state.timeout.unregister();
                shared.fail_with(&mut state, e);
                return;
            }
        };

        let (signal, wait) = wait_pair();
        shared.arm_timeout(&mut state, attempt, wait);

        info!(url = %shared.url, local_name, attempt, "开始下载");
        tokio::spawn(Arc::clone(shared).run(attempt, token, request, signal));
    }

    /// 协作式取消：正在传输时只打上 `Canceling` 标志，读循环在下一次读取前观察到后以
    /// `Cancel` 失败（最多多读一个缓冲区）；没有在途传输时直接标记为 `done`。
    pub async fn cancel(&self) {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;

        match state.content.as_ref().map(|c| c.state()) {
            Some(ContentState::DownLoading) => {
                if let Some(content) = state.content.as_mut() {
                    content.set_state(ContentState::Canceling);
                }
                debug!(url = %shared.url, attempt = state.attempt, "已请求取消");
            }
            Some(ContentState::Canceling) => {}
            _ => state.done = true,
        }

        shared.publish(&state);
    }

    /// 强制中止：正在传输时立即以 `Abort` 失败，不等待读循环。
    pub async fn abort(&self) {
        let shared = &self.shared;
        let mut state = shared.state.lock().await;

        let active = state
            .content
            .as_ref()
            .is_some_and(|c| c.state().is_active());
        if active {
            shared.fail(&mut state, DownloadErrorCode::Abort);
        }
    }

    /// 等到当前尝试结束（成功或失败），返回最终快照。
    ///
    /// 从未调用过 `start` 时会一直等待。
    pub async fn finished(&self) -> DownloadSnapshot {
        let mut watcher = self.shared.snapshot.watch();
        loop {
            let current = self.snapshot();
            if current.done || current.error_code.is_failure() {
                return current;
            }
            if watcher.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }
}

impl Drop for HttpDownloader {
    fn drop(&mut self) {
        if let Ok(mut state) = self.shared.state.try_lock() {
            state.release(ContentState::Failed);
        }
    }
}

#[cfg(test)]
impl HttpDownloader {
    /// 内容持有者、请求句柄、看门狗注册是否都已释放。
    pub(crate) async fn is_released(&self) -> bool {
        let state = self.shared.state.lock().await;
        state.request.is_none() && state.content.is_none() && !state.timeout.is_registered()
    }
}
