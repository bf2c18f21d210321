use serde::{Deserialize, Serialize};

use super::download_error_code::DownloadErrorCode;

/// 一次下载在锁内被观察到的状态快照。
///
/// 回调拿到的是快照而不是下载器本身，回调里无法再次进入下载器的锁。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadSnapshot {
    /// 远程 URL 前缀
    pub url: String,
    /// 本地存储根目录
    pub root: String,
    /// 本地文件名，同时也是拼接到 URL 后面的请求目标
    pub local_name: String,
    /// 是否已成功完成；失败时保持 `false`
    pub done: bool,
    pub error_code: DownloadErrorCode,
    /// 文件总大小（字节），响应到达前为 0，服务器未给出长度时为 -1
    pub total_length: i64,
    /// 本次已写入的字节数
    pub completed_length: u64,
}

impl DownloadSnapshot {
    /// 本地完整路径：`root/local_name`；任一为空时返回 `None`。
    pub fn full_name(&self) -> Option<String> {
        full_name(&self.root, &self.local_name)
    }

    /// 进度百分比（0～100）；总大小未知或为 0 时返回 `f64::NAN`。
    pub fn pct(&self) -> f64 {
        if self.total_length <= 0 {
            return f64::NAN;
        }
        (self.completed_length as f64 / self.total_length as f64) * 100.0
    }
}

/// 拼接本地完整路径，根目录或文件名为空时返回 `None`。
pub fn full_name(root: &str, local_name: &str) -> Option<String> {
    if root.is_empty() || local_name.is_empty() {
        return None;
    }
    Some(format!("{}/{}", root.trim_end_matches('/'), local_name))
}
