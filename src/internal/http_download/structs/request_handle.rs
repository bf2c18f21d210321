use tokio_util::sync::CancellationToken;

/// 在途请求句柄：绑定到某一次下载尝试，中止即取消令牌。
///
/// 协议任务在每个网络等待点都会 select 这个令牌，句柄一旦被中止，
/// 在途的请求 / 读取随即被丢弃。
#[derive(Debug, Clone)]
pub struct RequestHandle {
    attempt: u64,
    token: CancellationToken,
}

impl RequestHandle {
    pub fn new(attempt: u64) -> Self {
        Self {
            attempt,
            token: CancellationToken::new(),
        }
    }

    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}
