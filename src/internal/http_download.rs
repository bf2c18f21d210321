//! 下载器领域模块：单文件、可续传、带超时看门狗的异步 HTTP 下载。
//!
//! 使用方式：`HttpDownloader::new(url)?.start(root, local_name, hooks).await`，
//! 对外导出以 [`crate::http_download`] 为准，此处仅做模块划分。

pub mod structs;
pub mod traits;
