//! 内容持有者：本地文件句柄、读缓冲区以及决定全新下载 / 断点续传所需的元数据。

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::{Stream, TryStreamExt};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tracing::warn;

use super::content_state::ContentState;
use super::download_error::DownloadError;

type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// 打开本地文件的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// 全新下载：创建或截断
    Truncate,
    /// 断点续传：追加到已有内容之后
    Append,
}

/// 当前响应的字节流 + 固定大小的读缓冲区，每次读取最多填满一个缓冲区。
pub struct ResponseBody {
    reader: StreamReader<ByteStream, Bytes>,
    buffer: Box<[u8]>,
}

impl ResponseBody {
    pub fn from_response(response: reqwest::Response, buffer_size: usize) -> Self {
        Self::from_stream(response.bytes_stream().map_err(io::Error::other), buffer_size)
    }

    pub fn from_stream<S>(stream: S, buffer_size: usize) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        let stream: ByteStream = Box::pin(stream);
        Self {
            reader: StreamReader::new(stream),
            buffer: vec![0u8; buffer_size.max(1)].into_boxed_slice(),
        }
    }

    /// 读取下一段数据到缓冲区，返回读到的字节数；0 表示流已结束。
    pub async fn read_chunk(&mut self) -> Result<usize, DownloadError> {
        self.reader
            .read(&mut self.buffer)
            .await
            .map_err(DownloadError::ReadStream)
    }

    /// 缓冲区中最近一次读到的数据
    pub fn chunk(&self, len: usize) -> &[u8] {
        &self.buffer[..len.min(self.buffer.len())]
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseBody")
            .field("capacity", &self.buffer.len())
            .finish()
    }
}

/// 下载内容持有者，由一次下载独占；任何终态下都会被关闭且只关闭一次。
#[derive(Debug)]
pub struct DownloadContent {
    full_path: PathBuf,
    /// 本地已有文件的最后修改时间
    last_modified: Option<DateTime<Utc>>,
    /// 上一次下载已完成的字节数（即本地已有文件的长度）
    last_time_completed_length: u64,
    buffer_size: usize,
    state: ContentState,
    file: Option<File>,
    response: Option<ResponseBody>,
}

impl DownloadContent {
    /// 读取本地已有文件的元数据，为全新下载 / 续传的判断提供依据。
    ///
    /// 文件不存在或无法读取元数据时按全新下载处理。
    pub async fn open(full_path: impl Into<PathBuf>, buffer_size: usize) -> Self {
        let full_path = full_path.into();
        let (last_modified, last_time_completed_length) =
            match tokio::fs::metadata(&full_path).await {
                Ok(meta) if meta.is_file() => (
                    meta.modified().ok().map(DateTime::<Utc>::from),
                    meta.len(),
                ),
                Ok(_) => (None, 0),
                Err(e) if e.kind() == io::ErrorKind::NotFound => (None, 0),
                Err(e) => {
                    warn!(path = %full_path.display(), error = %e, "读取本地文件元数据失败，按全新下载处理");
                    (None, 0)
                }
            };

        Self {
            full_path,
            last_modified,
            last_time_completed_length,
            buffer_size: buffer_size.max(1),
            state: ContentState::DownLoading,
            file: None,
            response: None,
        }
    }

    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }

    pub fn last_time_completed_length(&self) -> u64 {
        self.last_time_completed_length
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn state(&self) -> ContentState {
        self.state
    }

    pub fn set_state(&mut self, state: ContentState) {
        self.state = state;
    }

    /// 绑定一次成功的响应：按写入方式打开本地文件，并持有响应流。
    pub async fn attach_response(
        &mut self,
        body: ResponseBody,
        mode: WriteMode,
    ) -> Result<(), DownloadError> {
        if let Some(parent) = self.full_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(DownloadError::OpenFile)?;
            }
        }

        let mut options = OpenOptions::new();
        match mode {
            WriteMode::Truncate => options.create(true).write(true).truncate(true),
            WriteMode::Append => options.create(true).append(true),
        };
        let file = options
            .open(&self.full_path)
            .await
            .map_err(DownloadError::OpenFile)?;

        self.file = Some(file);
        self.response = Some(body);
        Ok(())
    }

    /// 取出响应流以便在锁外等待读取；读取完成后用 [`Self::restore_response`] 放回。
    pub fn take_response(&mut self) -> Option<ResponseBody> {
        self.response.take()
    }

    pub fn restore_response(&mut self, body: ResponseBody) {
        if self.file.is_some() {
            self.response = Some(body);
        }
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }

    /// 追加写入并立即刷新。
    pub async fn append(&mut self, data: &[u8]) -> Result<(), DownloadError> {
        let file = self.file.as_mut().ok_or(DownloadError::NoFileStream)?;
        file.write_all(data).await.map_err(DownloadError::WriteFile)?;
        file.flush().await.map_err(DownloadError::FlushFile)?;
        Ok(())
    }

    /// 释放文件句柄并清空响应流引用；可重复调用。
    pub fn close(&mut self) {
        self.file = None;
        self.response = None;
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none() && self.response.is_none()
    }
}
