use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 请求超时（毫秒），同时作为看门狗的截止时间
pub const TIMEOUT_TIME_MS: u64 = 20000;

/// 内容持有者读缓冲区大小（字节）
pub const BUFFER_SIZE: usize = 8 * 1024;

/// 续传起点上限：Range 起点按 32 位有符号整数编码，超过约 2GB 的续传不支持
pub const RANGE_START_LIMIT: u64 = i32::MAX as u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// 请求超时（毫秒）
    pub request_timeout_ms: u64,
    /// 每次读取的缓冲区大小（字节）
    pub buffer_size: usize,
    /// 自定义 User-Agent，未设置时使用 reqwest 默认值
    pub user_agent: Option<String>,
}

impl DownloaderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: TIMEOUT_TIME_MS,
            buffer_size: BUFFER_SIZE,
            user_agent: None,
        }
    }
}
