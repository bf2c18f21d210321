//! 下载相关错误类型。
//!
//! 内部每个可失败步骤都返回 [`DownloadError`]，在失败汇聚点统一折算成
//! [`DownloadErrorCode`]，不会越过 `start / cancel / abort` 的边界抛给调用方。

use thiserror::Error;

use super::download_error_code::DownloadErrorCode;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("URL 不合法: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("构建 HTTP 客户端失败: {0}")]
    BuildClient(reqwest::Error),

    #[error("HTTP 请求失败: {0}")]
    Request(#[from] reqwest::Error),

    /// 续传起点必须能放进 32 位有符号整数，超出即为硬性限制。
    #[error("续传起点 {start} 超出 Range 上限 {limit}")]
    RangeStartTooLarge { start: u64, limit: u64 },

    #[error("打开本地文件失败: {0}")]
    OpenFile(std::io::Error),

    #[error("读取响应流失败: {0}")]
    ReadStream(std::io::Error),

    #[error("写入文件失败: {0}")]
    WriteFile(std::io::Error),

    #[error("刷新文件失败: {0}")]
    FlushFile(std::io::Error),

    #[error("没有可写入的本地文件")]
    NoFileStream,

    #[error("无法定位存储根目录: {0}")]
    StorageRoot(String),

    #[error("本地路径不完整: root={root:?}, local_name={local_name:?}")]
    EmptyTarget { root: String, local_name: String },

    #[error("下载器已经开始过，不能再修改配置")]
    AlreadyStarted,
}

impl DownloadError {
    /// 折算为对外的错误分类。
    ///
    /// 请求构建 / 发出阶段的失败算 `NoResponse`，其余（等待响应、读写字节）算 `DownLoadError`。
    pub fn code(&self) -> DownloadErrorCode {
        match self {
            DownloadError::InvalidUrl(_)
            | DownloadError::BuildClient(_)
            | DownloadError::RangeStartTooLarge { .. }
            | DownloadError::StorageRoot(_)
            | DownloadError::EmptyTarget { .. }
            | DownloadError::AlreadyStarted => DownloadErrorCode::NoResponse,
            DownloadError::Request(e) if e.is_builder() || e.is_connect() => {
                DownloadErrorCode::NoResponse
            }
            _ => DownloadErrorCode::DownLoadError,
        }
    }
}
