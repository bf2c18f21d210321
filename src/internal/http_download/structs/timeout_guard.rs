//! 超时看门狗：给一次异步网络等待挂上截止时间。
//!
//! reqwest 等待响应的 future 本身没有可与完成通知对齐的截止时间，
//! 这里用一个旁路定时器实现：到期且等待句柄仍未发信号时触发一次超时回调。
//! 每条非超时的完成路径都必须调用 [`TimeoutGuard::unregister`]，否则过期的定时器
//! 可能在之后打到已被复用或清空的请求上。

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// 响应到达时由网络侧发出的信号（发送端）。
#[derive(Debug)]
pub struct ResponseSignal(watch::Sender<bool>);

/// 与 [`ResponseSignal`] 配对的等待句柄（接收端）。
#[derive(Debug, Clone)]
pub struct WaitHandle(watch::Receiver<bool>);

/// 创建一对信号 / 等待句柄。
pub fn wait_pair() -> (ResponseSignal, WaitHandle) {
    let (sender, receiver) = watch::channel(false);
    (ResponseSignal(sender), WaitHandle(receiver))
}

impl ResponseSignal {
    pub fn signal(&self) {
        self.0.send_replace(true);
    }
}

impl WaitHandle {
    pub fn is_signalled(&self) -> bool {
        *self.0.borrow()
    }

    /// 等到发出信号；发送端被丢弃（请求已被放弃）时同样返回。
    async fn signalled(&mut self) {
        let _ = self.0.wait_for(|v| *v).await;
    }
}

/// 一次性超时注册，同一时刻最多存在一个有效注册。
#[derive(Debug)]
pub struct TimeoutGuard {
    timeout: Duration,
    registration: Option<CancellationToken>,
}

impl TimeoutGuard {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            registration: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 在等待句柄上挂一个一次性定时器，替换掉之前的注册。
    ///
    /// 到期时若句柄仍未发信号，执行 `on_timeout`；句柄先发信号或被注销则什么都不做。
    pub fn register<F, Fut>(&mut self, wait: WaitHandle, on_timeout: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.unregister();

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let timeout = self.timeout;
        let mut wait = wait;

        tokio::spawn(async move {
            let expired = tokio::select! {
                _ = cancelled.cancelled() => false,
                _ = wait.signalled() => false,
                _ = tokio::time::sleep(timeout) => true,
            };
            if expired && !wait.is_signalled() && !cancelled.is_cancelled() {
                on_timeout().await;
            }
        });

        self.registration = Some(token);
    }

    /// 注销当前注册；未注册或已注销时是空操作。返回是否真的注销了一个注册。
    pub fn unregister(&mut self) -> bool {
        match self.registration.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.registration.is_some()
    }
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        self.unregister();
    }
}
