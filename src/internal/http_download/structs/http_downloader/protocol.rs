//! 下载协议状态机：请求 → 解释响应（全新 / 续传）→ 读循环 → 完成或失败。
//!
//! 每个延续进入锁后先用 `attempt` 确认自己仍然是当前尝试，否则直接返回。
//! 网络等待都在锁外进行，并与请求句柄的取消令牌 select，句柄被中止时在途 I/O 随即被丢弃。

use std::sync::Arc;

use reqwest::{RequestBuilder, Response, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::internal::http_download::structs::content_state::ContentState;
use crate::internal::http_download::structs::download_content::{ResponseBody, WriteMode};
use crate::internal::http_download::structs::download_error::DownloadError;
use crate::internal::http_download::structs::download_error_code::DownloadErrorCode;
use crate::internal::http_download::structs::timeout_guard::{wait_pair, ResponseSignal, WaitHandle};
use crate::internal::http_download::structs::transfer_state::TransferState;

use super::request;
use super::Shared;

/// 响应解释之后的下一步
enum Next {
    Read,
    Resume,
}

impl Shared {
    /// 发布状态快照（在回调之后调用，外部观察者总是晚于回调看到状态变化）。
    pub(crate) fn publish(&self, state: &TransferState) {
        if let Err(e) = self.snapshot.update(state.snapshot(&self.url)) {
            debug!(url = %self.url, error = %e, "发布状态快照失败");
        }
    }

    /// 失败汇聚点（调用方已持有锁）：释放资源、设置错误码、通知失败回调。
    ///
    /// 这里不会把 `done` 置为 `true`，以此与成功完成区分。
    pub(crate) fn fail(&self, state: &mut TransferState, code: DownloadErrorCode) {
        state.release(ContentState::Failed);
        state.error_code = code;
        warn!(
            url = %self.url,
            local_name = %state.local_name,
            attempt = state.attempt,
            ?code,
            "下载失败"
        );

        let snapshot = state.snapshot(&self.url);
        state.hooks.run_on_error(&snapshot);
        self.publish(state);
    }

    pub(crate) fn fail_with(&self, state: &mut TransferState, error: DownloadError) {
        debug!(url = %self.url, local_name = %state.local_name, %error, "下载步骤出错");
        self.fail(state, error.code());
    }

    /// 成功完成：标记内容持有者完成并关闭、清空请求句柄、置 `done`，最后以 `0` 通知进度。
    fn finish(&self, state: &mut TransferState) {
        state.release(ContentState::Completed);
        state.done = true;
        info!(
            url = %self.url,
            local_name = %state.local_name,
            completed = state.completed_length,
            total = state.total_length,
            "下载完成"
        );

        let snapshot = state.snapshot(&self.url);
        state.hooks.run_on_progress(&snapshot, 0);
        self.publish(state);
    }

    /// 给当前尝试挂上看门狗；到期且响应仍未到达时以 `TimeOut` 失败。
    pub(crate) fn arm_timeout(self: &Arc<Self>, state: &mut TransferState, attempt: u64, wait: WaitHandle) {
        let shared = Arc::clone(self);
        let probe = wait.clone();
        state
            .timeout
            .register(wait, move || async move { shared.on_timeout(attempt, probe).await });
    }

    async fn on_timeout(&self, attempt: u64, wait: WaitHandle) {
        let mut state = self.state.lock().await;
        if !state.is_current(attempt) || wait.is_signalled() {
            return;
        }
        self.fail(&mut state, DownloadErrorCode::TimeOut);
    }

    /// 协议任务入口：首次请求已在 `start` 的锁内构建好并挂上看门狗。
    pub(crate) async fn run(
        self: Arc<Self>,
        attempt: u64,
        token: CancellationToken,
        request: RequestBuilder,
        signal: ResponseSignal,
    ) {
        let sent = tokio::select! {
            _ = token.cancelled() => return,
            sent = request.send() => sent,
        };
        signal.signal();

        let next = {
            let mut state = self.state.lock().await;
            if !state.is_current(attempt) {
                return;
            }
            state.timeout.unregister();
            self.on_response(&mut state, sent).await
        };

        match next {
            Some(Next::Read) => self.read_loop(attempt, &token).await,
            Some(Next::Resume) => self.resume(attempt, &token).await,
            None => {}
        }
    }

    async fn on_response(
        &self,
        state: &mut TransferState,
        sent: Result<Response, reqwest::Error>,
    ) -> Option<Next> {
        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                self.fail_with(state, DownloadError::Request(e));
                return None;
            }
        };

        let status = response.status();
        debug!(url = %self.url, local_name = %state.local_name, %status, "收到响应");
        match status {
            StatusCode::OK => {
                state.total_length = content_length(&response).unwrap_or(-1);
                if let Err(e) = self.attach(state, response, WriteMode::Truncate).await {
                    self.fail_with(state, e);
                    return None;
                }
                self.publish(state);
                Some(Next::Read)
            }
            StatusCode::NOT_MODIFIED => {
                // 本地已有该文件但不确定是否完整，丢弃本次响应后用 Range 请求校验 / 续传
                drop(response);
                Some(Next::Resume)
            }
            _ => {
                drop(response);
                self.fail(state, DownloadErrorCode::NoResponse);
                None
            }
        }
    }

    /// 续传请求：从上次已完成的长度开始。
    async fn resume(self: &Arc<Self>, attempt: u64, token: &CancellationToken) {
        let (request, signal) = {
            let mut state = self.state.lock().await;
            if !state.is_current(attempt) {
                return;
            }
            let Some(start) = state
                .content
                .as_ref()
                .map(|c| c.last_time_completed_length())
            else {
                return;
            };

            let built = request::target_url(&self.url, &state.local_name)
                .and_then(|target| request::range_request(&self.client, &target, start));
            let request = match built {
                Ok(request) => request,
                Err(e) => {
                    state.timeout.unregister();
                    self.fail_with(&mut state, e);
                    return;
                }
            };

            debug!(url = %self.url, local_name = %state.local_name, start, "发起续传请求");
            let (signal, wait) = wait_pair();
            self.arm_timeout(&mut state, attempt, wait);
            (request, signal)
        };

        let sent = tokio::select! {
            _ = token.cancelled() => return,
            sent = request.send() => sent,
        };
        signal.signal();

        let proceed = {
            let mut state = self.state.lock().await;
            if !state.is_current(attempt) {
                return;
            }
            state.timeout.unregister();
            self.on_partial_response(&mut state, sent).await
        };

        if proceed {
            self.read_loop(attempt, token).await;
        }
    }

    async fn on_partial_response(
        &self,
        state: &mut TransferState,
        sent: Result<Response, reqwest::Error>,
    ) -> bool {
        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                self.fail_with(state, DownloadError::Request(e));
                return false;
            }
        };

        let status = response.status();
        debug!(url = %self.url, local_name = %state.local_name, %status, "收到续传响应");
        match status {
            StatusCode::PARTIAL_CONTENT => {
                let previous = state
                    .content
                    .as_ref()
                    .map(|c| c.last_time_completed_length())
                    .unwrap_or(0);
                state.total_length = content_length(&response)
                    .map(|len| previous as i64 + len)
                    .unwrap_or(-1);
                // 已完成长度从本地已有部分接着算，完成时与总长度一致
                state.completed_length = previous;
                if let Err(e) = self.attach(state, response, WriteMode::Append).await {
                    self.fail_with(state, e);
                    return false;
                }
                self.publish(state);
                true
            }
            StatusCode::NOT_MODIFIED => {
                // 范围请求本身也未修改：本地文件已完整，用 Abort 表示“无需下载”
                drop(response);
                self.fail(state, DownloadErrorCode::Abort);
                false
            }
            _ => {
                drop(response);
                self.fail(state, DownloadErrorCode::NoResponse);
                false
            }
        }
    }

    async fn attach(
        &self,
        state: &mut TransferState,
        response: Response,
        mode: WriteMode,
    ) -> Result<(), DownloadError> {
        let Some(content) = state.content.as_mut() else {
            return Err(DownloadError::NoFileStream);
        };
        let body = ResponseBody::from_response(response, content.buffer_size());
        content.attach_response(body, mode).await
    }

    /// 读循环：每次读取前检查取消标志，读到数据后写入、刷新、累加并通知进度，读到 0 即完成。
    async fn read_loop(&self, attempt: u64, token: &CancellationToken) {
        loop {
            let mut body = {
                let mut state = self.state.lock().await;
                if !state.is_current(attempt) {
                    return;
                }
                let Some(content) = state.content.as_mut() else {
                    return;
                };
                if content.state() == ContentState::Canceling {
                    self.fail(&mut state, DownloadErrorCode::Cancel);
                    return;
                }
                match content.take_response() {
                    Some(body) => body,
                    None => return,
                }
            };

            let read = tokio::select! {
                _ = token.cancelled() => return,
                read = body.read_chunk() => read,
            };

            let mut state = self.state.lock().await;
            if !state.is_current(attempt) {
                return;
            }
            let n = match read {
                Ok(n) => n,
                Err(e) => {
                    self.fail_with(&mut state, e);
                    return;
                }
            };
            if n == 0 {
                self.finish(&mut state);
                return;
            }

            let written = match state.content.as_mut() {
                Some(content) => match content.append(body.chunk(n)).await {
                    Ok(()) => {
                        content.restore_response(body);
                        Ok(())
                    }
                    Err(e) => Err(e),
                },
                None => return,
            };
            if let Err(e) = written {
                self.fail_with(&mut state, e);
                return;
            }

            state.completed_length += n as u64;
            let snapshot = state.snapshot(&self.url);
            state.hooks.run_on_progress(&snapshot, n as u64);
            self.publish(&state);
        }
    }
}

fn content_length(response: &Response) -> Option<i64> {
    response.content_length().map(|len| len as i64)
}
