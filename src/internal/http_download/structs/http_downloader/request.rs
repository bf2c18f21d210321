//! 请求构建：HTTP 客户端、条件 GET、Range 续传请求。

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, CONNECTION, IF_MODIFIED_SINCE, RANGE};
use reqwest::{Client, RequestBuilder};
use url::Url;

use crate::internal::http_download::structs::download_config::{
    DownloaderConfig, RANGE_START_LIMIT,
};
use crate::internal::http_download::structs::download_error::DownloadError;

/// 创建下载用的 http 客户端：仅 HTTP/1，不复用连接。
pub(crate) fn build_client(config: &DownloaderConfig) -> Result<Client, DownloadError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONNECTION, HeaderValue::from_static("close"));

    let mut builder = Client::builder()
        .http1_only()
        .default_headers(headers)
        .pool_max_idle_per_host(0)
        .connect_timeout(config.request_timeout());
    if let Some(user_agent) = config.user_agent.as_deref() {
        builder = builder.user_agent(user_agent.to_string());
    }

    builder.build().map_err(DownloadError::BuildClient)
}

/// 请求目标 = URL 前缀 + 本地文件名（直接拼接）。
pub(crate) fn target_url(base_url: &str, local_name: &str) -> Result<Url, DownloadError> {
    Ok(Url::parse(&format!("{}{}", base_url, local_name))?)
}

/// HTTP-date 格式；没有本地时间时用 Unix 纪元。
pub(crate) fn http_date(time: Option<DateTime<Utc>>) -> String {
    time.unwrap_or_default()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// 生成续传用的 Range 头：`bytes=start-`。
///
/// 起点超过 [`RANGE_START_LIMIT`] 时直接拒绝，不做截断。
pub fn range_header(start: u64) -> Result<String, DownloadError> {
    if start > RANGE_START_LIMIT {
        return Err(DownloadError::RangeStartTooLarge {
            start,
            limit: RANGE_START_LIMIT,
        });
    }
    Ok(format!("bytes={}-", start))
}

/// 首次请求：带 `If-Modified-Since` 的条件 GET。
pub(crate) fn fresh_request(
    client: &Client,
    target: &Url,
    last_modified: Option<DateTime<Utc>>,
) -> RequestBuilder {
    client
        .get(target.clone())
        .header(IF_MODIFIED_SINCE, http_date(last_modified))
}

/// 续传请求：从上次已完成的长度开始取剩余部分。
pub(crate) fn range_request(
    client: &Client,
    target: &Url,
    start: u64,
) -> Result<RequestBuilder, DownloadError> {
    let range = range_header(start)?;
    Ok(client.get(target.clone()).header(RANGE, range))
}
