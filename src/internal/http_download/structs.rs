pub mod content_state;
pub mod download_config;
pub mod download_content;
pub mod download_error;
pub mod download_error_code;
pub mod download_hooks_container;
pub(crate) mod hook_adapters;
pub mod download_snapshot;
pub mod http_downloader;
pub mod request_handle;
pub mod timeout_guard;
pub(crate) mod transfer_state;

// 重导出公共类型
pub use content_state::ContentState;
pub use download_config::{DownloaderConfig, BUFFER_SIZE, RANGE_START_LIMIT, TIMEOUT_TIME_MS};
pub use download_content::{DownloadContent, ResponseBody, WriteMode};
pub use download_error::DownloadError;
pub use download_error_code::DownloadErrorCode;
pub use download_hooks_container::DownloadHooks;
pub use download_snapshot::{full_name, DownloadSnapshot};
pub use http_downloader::request::range_header;
pub use http_downloader::HttpDownloader;
pub use request_handle::RequestHandle;
pub use timeout_guard::{wait_pair, ResponseSignal, TimeoutGuard, WaitHandle};
