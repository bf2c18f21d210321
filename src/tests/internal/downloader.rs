//! 下载器测试：全新下载、协作式取消、强制中止、重复 start、异常响应。

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::http::header::{CONTENT_LENGTH, IF_MODIFIED_SINCE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use crate::http_download::{DownloadError, DownloadHooks};
use crate::tests::{
    delayed_body, payload, serve, wait_finished, wait_first_chunk, Recording, EPOCH_HTTP_DATE,
};
use crate::{DownloadErrorCode, HttpDownloader};

/// 慢速响应：`chunks` 个 100 字节的块，块间隔 300ms。
fn slow_router(name: &'static str, chunks: usize) -> Router {
    Router::new().route(
        &format!("/assets/{}", name),
        get(move || async move {
            let data = payload(chunks * 100);
            let parts = data.chunks(100).map(|c| c.to_vec()).collect();
            Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_LENGTH, data.len())
                .body(delayed_body(parts, Duration::from_millis(300)))
                .unwrap()
        }),
    )
}

// ═══════════════════════════ 全新下载 ═══════════════════════════

/// 200 + Content-Length=1000，分 600 / 400 两次读到，最后以 0 结束。
#[tokio::test]
async fn fresh_download_reports_each_chunk_then_zero() {
    let data = payload(1000);
    let served = data.clone();
    let base = serve(Router::new().route(
        "/assets/a.bin",
        get(move |headers: HeaderMap| {
            let served = served.clone();
            async move {
                // 本地没有文件时必须带纪元时间的 If-Modified-Since
                let ims = headers.get(IF_MODIFIED_SINCE).and_then(|v| v.to_str().ok());
                if ims != Some(EPOCH_HTTP_DATE) {
                    return Response::builder()
                        .status(StatusCode::BAD_REQUEST)
                        .body(axum::body::Body::empty())
                        .unwrap();
                }
                let parts = vec![served[..600].to_vec(), served[600..].to_vec()];
                Response::builder()
                    .status(StatusCode::OK)
                    .header(CONTENT_LENGTH, served.len())
                    .body(delayed_body(parts, Duration::from_millis(100)))
                    .unwrap()
            }
        }),
    ))
    .await;

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_string_lossy().to_string();
    let recording = Recording::new();
    let downloader = HttpDownloader::new(&base).unwrap();

    downloader.start(&root, "a.bin", recording.hooks()).await;
    let result = wait_finished(&downloader).await;

    assert!(result.done);
    assert_eq!(result.error_code, DownloadErrorCode::None);
    assert_eq!(result.total_length, 1000);
    assert_eq!(result.completed_length, 1000);
    assert_eq!(recording.progress(), vec![600, 400, 0]);
    assert!(recording.errors().is_empty());

    // 最后一次（0 字节）进度回调时已写满
    let last = recording.last_progress_snapshot().unwrap();
    assert_eq!(last.completed_length as i64, last.total_length);

    assert_eq!(std::fs::read(dir.path().join("a.bin")).unwrap(), data);
    assert!(downloader.is_released().await);
}

/// 已有的旧文件在 200 响应下被截断重写。
#[tokio::test]
async fn fresh_download_truncates_stale_file() {
    let data = payload(300);
    let served = data.clone();
    let base = serve(Router::new().route(
        "/assets/b.bin",
        get(move || {
            let served = served.clone();
            async move {
                Response::builder()
                    .status(StatusCode::OK)
                    .header(CONTENT_LENGTH, served.len())
                    .body(axum::body::Body::from(served))
                    .unwrap()
            }
        }),
    ))
    .await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("b.bin"), vec![0xAAu8; 5000]).unwrap();
    let root = dir.path().to_string_lossy().to_string();

    let downloader = HttpDownloader::new(&base).unwrap();
    downloader.start(&root, "b.bin", DownloadHooks::new()).await;
    let result = wait_finished(&downloader).await;

    assert!(result.done);
    assert_eq!(std::fs::read(dir.path().join("b.bin")).unwrap(), data);
}

/// 小缓冲区：每次读取不超过缓冲区大小，进度累加等于总长度。
#[tokio::test]
async fn reads_never_exceed_buffer_size() {
    let data = payload(4096);
    let served = data.clone();
    let base = serve(Router::new().route(
        "/assets/c.bin",
        get(move || {
            let served = served.clone();
            async move {
                Response::builder()
                    .status(StatusCode::OK)
                    .header(CONTENT_LENGTH, served.len())
                    .body(axum::body::Body::from(served))
                    .unwrap()
            }
        }),
    ))
    .await;

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_string_lossy().to_string();
    let recording = Recording::new();
    let config = crate::DownloaderConfig {
        buffer_size: 512,
        ..Default::default()
    };
    let downloader = HttpDownloader::with_config(&base, config).unwrap();

    downloader.start(&root, "c.bin", recording.hooks()).await;
    let result = wait_finished(&downloader).await;

    let progress = recording.progress();
    assert!(result.done);
    assert_eq!(progress.last(), Some(&0));
    assert!(progress.iter().all(|&n| n <= 512));
    assert_eq!(progress.iter().sum::<u64>(), 4096);
    assert_eq!(std::fs::read(dir.path().join("c.bin")).unwrap(), data);
}

// ═══════════════════════════ 取消 / 中止 ═══════════════════════════

/// 传输中 cancel：下一次读取前观察到取消，以 Cancel 失败；连续两次 cancel 只生效一次。
#[tokio::test]
async fn cancel_mid_stream_fails_with_cancel() {
    let base = serve(slow_router("slow.bin", 6)).await;
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_string_lossy().to_string();
    let recording = Recording::new();
    let downloader = HttpDownloader::new(&base).unwrap();

    downloader.start(&root, "slow.bin", recording.hooks()).await;
    wait_first_chunk(&downloader).await;
    let chunks_before = recording.progress().len();

    downloader.cancel().await;
    downloader.cancel().await;
    let result = wait_finished(&downloader).await;

    assert_eq!(result.error_code, DownloadErrorCode::Cancel);
    assert!(!result.done, "失败时 done 保持 false");
    assert_eq!(recording.errors(), vec![DownloadErrorCode::Cancel]);
    // 最多多读一个缓冲区
    assert!(recording.progress().len() <= chunks_before + 1);
    assert!(!recording.progress().contains(&0));
    assert!(downloader.is_released().await);
}

/// 没有在途传输时 cancel 直接标记为 done，不触发任何回调。
#[tokio::test]
async fn cancel_when_idle_marks_done() {
    let downloader = HttpDownloader::new("http://127.0.0.1:9/assets/").unwrap();
    assert!(!downloader.is_done());

    downloader.cancel().await;

    assert!(downloader.is_done());
    assert_eq!(downloader.error_code(), DownloadErrorCode::None);
}

/// 传输中 abort：立即以 Abort 失败，在途读取被丢弃，之后不再有进度。
#[tokio::test]
async fn abort_mid_stream_fails_immediately() {
    let base = serve(slow_router("slow.bin", 6)).await;
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_string_lossy().to_string();
    let recording = Recording::new();
    let downloader = HttpDownloader::new(&base).unwrap();

    downloader.start(&root, "slow.bin", recording.hooks()).await;
    wait_first_chunk(&downloader).await;

    downloader.abort().await;

    // abort 返回时失败已经生效
    assert_eq!(downloader.error_code(), DownloadErrorCode::Abort);
    assert_eq!(recording.errors(), vec![DownloadErrorCode::Abort]);
    assert!(downloader.is_released().await);

    let completed = downloader.completed_length();
    let progress_len = recording.progress().len();
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(downloader.completed_length(), completed);
    assert_eq!(recording.progress().len(), progress_len);

    // 已结束的下载再次 abort 是空操作
    downloader.abort().await;
    assert_eq!(recording.errors().len(), 1);
}

// ═══════════════════════════ 重复 start ═══════════════════════════

/// 上一次仍在进行时再次 start：旧尝试被静默中止，新尝试沿用之前的回调并正常完成。
#[tokio::test]
async fn start_while_in_flight_supersedes_previous_attempt() {
    let fast = payload(256);
    let served = fast.clone();
    let router = slow_router("slow.bin", 10).route(
        "/assets/fast.bin",
        get(move || {
            let served = served.clone();
            async move {
                Response::builder()
                    .status(StatusCode::OK)
                    .header(CONTENT_LENGTH, served.len())
                    .body(axum::body::Body::from(served))
                    .unwrap()
            }
        }),
    );
    let base = serve(router).await;
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_string_lossy().to_string();
    let recording = Recording::new();
    let downloader = HttpDownloader::new(&base).unwrap();

    downloader.start(&root, "slow.bin", recording.hooks()).await;
    wait_first_chunk(&downloader).await;

    downloader.start(&root, "fast.bin", DownloadHooks::new()).await;
    let result = wait_finished(&downloader).await;

    assert!(result.done);
    assert_eq!(result.local_name, "fast.bin");
    assert_eq!(result.completed_length, 256);
    assert!(recording.errors().is_empty(), "被取代的尝试不触发失败回调");
    assert_eq!(recording.progress().last(), Some(&0));
    assert_eq!(std::fs::read(dir.path().join("fast.bin")).unwrap(), fast);

    // 旧尝试不再写入
    let slow_len = std::fs::metadata(dir.path().join("slow.bin")).unwrap().len();
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(
        std::fs::metadata(dir.path().join("slow.bin")).unwrap().len(),
        slow_len
    );
}

// ═══════════════════════════ 异常响应 ═══════════════════════════

#[tokio::test]
async fn unexpected_status_fails_with_no_response() {
    let base = serve(Router::new()).await;
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_string_lossy().to_string();
    let recording = Recording::new();
    let downloader = HttpDownloader::new(&base).unwrap();

    downloader.start(&root, "missing.bin", recording.hooks()).await;
    let result = wait_finished(&downloader).await;

    assert_eq!(result.error_code, DownloadErrorCode::NoResponse);
    assert!(!result.done);
    assert_eq!(recording.errors(), vec![DownloadErrorCode::NoResponse]);
    assert!(recording.progress().is_empty());
    assert!(!dir.path().join("missing.bin").exists());
    assert!(downloader.is_released().await);
}

/// 请求目标无法构建：在 start 内同步失败。
#[tokio::test]
async fn invalid_url_fails_inside_start() {
    let recording = Recording::new();
    let downloader = HttpDownloader::new("not a url/").unwrap();

    downloader.start("/tmp", "x.bin", recording.hooks()).await;

    assert_eq!(recording.errors(), vec![DownloadErrorCode::NoResponse]);
    assert_eq!(downloader.error_code(), DownloadErrorCode::NoResponse);
    assert!(downloader.is_released().await);
}

/// 连接被拒绝属于请求发出失败。
#[tokio::test]
async fn refused_connection_fails_with_no_response() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_string_lossy().to_string();
    let recording = Recording::new();
    let downloader = HttpDownloader::new(&format!("http://{}/assets/", addr)).unwrap();

    downloader.start(&root, "a.bin", recording.hooks()).await;
    let result = wait_finished(&downloader).await;

    assert_eq!(result.error_code, DownloadErrorCode::NoResponse);
    assert_eq!(recording.errors(), vec![DownloadErrorCode::NoResponse]);
}

/// 同一个下载器失败后可以再次 start，并重置状态。
#[tokio::test]
async fn restart_after_failure_resets_state() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let base = serve(Router::new().route(
        "/assets/flaky.bin",
        get(move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Response::builder()
                        .status(StatusCode::INTERNAL_SERVER_ERROR)
                        .body(axum::body::Body::empty())
                        .unwrap();
                }
                Response::builder()
                    .status(StatusCode::OK)
                    .header(CONTENT_LENGTH, 10)
                    .body(axum::body::Body::from(payload(10)))
                    .unwrap()
            }
        }),
    ))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_string_lossy().to_string();
    let recording = Recording::new();
    let downloader = HttpDownloader::new(&base).unwrap();

    downloader.start(&root, "flaky.bin", recording.hooks()).await;
    let first = wait_finished(&downloader).await;
    assert_eq!(first.error_code, DownloadErrorCode::NoResponse);

    downloader.start(&root, "flaky.bin", DownloadHooks::new()).await;
    let second = wait_finished(&downloader).await;
    assert!(second.done);
    assert_eq!(second.error_code, DownloadErrorCode::None);
    assert_eq!(second.completed_length, 10);
    assert_eq!(recording.errors(), vec![DownloadErrorCode::NoResponse]);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

// ═══════════════════════════ 回调注册 ═══════════════════════════

/// 闭包形式的单阶段回调；重新 start 时未提供的回调沿用之前注册的。
#[tokio::test]
async fn closure_hooks_are_kept_across_restarts() {
    let base = serve(Router::new().route(
        "/assets/h.bin",
        get(|| async {
            Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_LENGTH, 50)
                .body(axum::body::Body::from(payload(50)))
                .unwrap()
        }),
    ))
    .await;

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_string_lossy().to_string();
    let finished = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));

    let on_progress = Arc::clone(&finished);
    let on_error = Arc::clone(&errors);
    let hooks = DownloadHooks::new()
        .with_progress_hook(move |snapshot, bytes_read| {
            if bytes_read == 0 {
                assert!(snapshot.done);
                on_progress.fetch_add(1, Ordering::SeqCst);
            }
        })
        .with_error_hook(move |_| {
            on_error.fetch_add(1, Ordering::SeqCst);
        });
    assert!(hooks.has_progress_hook());
    assert!(hooks.has_error_hook());

    let downloader = HttpDownloader::new(&base).unwrap();
    downloader.start(&root, "h.bin", hooks).await;
    assert!(wait_finished(&downloader).await.done);

    std::fs::remove_file(dir.path().join("h.bin")).unwrap();
    downloader.start(&root, "h.bin", DownloadHooks::new()).await;
    assert!(wait_finished(&downloader).await.done);

    assert_eq!(finished.load(Ordering::SeqCst), 2);
    assert_eq!(errors.load(Ordering::SeqCst), 0);
}

// ═══════════════════════════ 响应到达之前 ═══════════════════════════

/// 先拖延 `delay` 再返回 100 字节的 200 响应。
fn late_router(name: &'static str, delay: Duration) -> Router {
    Router::new().route(
        &format!("/assets/{}", name),
        get(move || async move {
            tokio::time::sleep(delay).await;
            Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_LENGTH, 100)
                .body(axum::body::Body::from(payload(100)))
                .unwrap()
        }),
    )
}

/// 等待响应期间取消：响应到达后读循环在第一次读取前就以 Cancel 失败。
#[tokio::test]
async fn cancel_before_response_fails_with_cancel() {
    let base = serve(late_router("slow-head.bin", Duration::from_millis(500))).await;
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_string_lossy().to_string();
    let recording = Recording::new();
    let downloader = HttpDownloader::new(&base).unwrap();

    downloader.start(&root, "slow-head.bin", recording.hooks()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    downloader.cancel().await;
    downloader.cancel().await;
    assert!(recording.errors().is_empty(), "取消是协作式的，不会立即失败");

    let result = wait_finished(&downloader).await;
    assert_eq!(result.error_code, DownloadErrorCode::Cancel);
    assert!(!result.done);
    assert_eq!(recording.errors(), vec![DownloadErrorCode::Cancel]);
    assert!(recording.progress().is_empty());
    assert!(downloader.is_released().await);
}

/// 等待响应期间强制中止：abort 返回时失败回调已经触发，之后不再有任何回调。
#[tokio::test]
async fn abort_before_response_fails_immediately() {
    let base = serve(late_router("slow-head.bin", Duration::from_millis(300))).await;
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_string_lossy().to_string();
    let recording = Recording::new();
    let downloader = HttpDownloader::new(&base).unwrap();

    downloader.start(&root, "slow-head.bin", recording.hooks()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    downloader.abort().await;

    assert_eq!(recording.errors(), vec![DownloadErrorCode::Abort]);
    assert_eq!(downloader.error_code(), DownloadErrorCode::Abort);
    assert!(!downloader.is_done());
    assert!(downloader.is_released().await);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(recording.errors(), vec![DownloadErrorCode::Abort]);
    assert!(recording.progress().is_empty());
    assert!(!dir.path().join("slow-head.bin").exists());
}

/// 服务器声明 1000 字节却只发 400 字节就断开：读取出错，以 DownLoadError 失败。
#[tokio::test]
async fn truncated_body_fails_with_download_error() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    crate::tests::init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 2048];
        let _ = socket.read(&mut request).await;
        let head = "HTTP/1.1 200 OK\r\nContent-Length: 1000\r\nConnection: close\r\n\r\n";
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&payload(400)).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_string_lossy().to_string();
    let recording = Recording::new();
    let downloader = HttpDownloader::new(&format!("http://{}/assets/", addr)).unwrap();

    downloader.start(&root, "cut.bin", recording.hooks()).await;
    let result = wait_finished(&downloader).await;

    assert_eq!(result.error_code, DownloadErrorCode::DownLoadError);
    assert!(!result.done);
    assert_eq!(result.total_length, 1000);
    assert!(result.completed_length <= 400);
    assert_eq!(recording.errors(), vec![DownloadErrorCode::DownLoadError]);
    assert!(!recording.progress().contains(&0));
    assert!(downloader.is_released().await);
}

/// 根目录或文件名为空：在 start 内以 NoResponse 失败，不发出请求。
#[tokio::test]
async fn empty_root_or_name_fails_before_request() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let base = serve(Router::new().fallback(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async { StatusCode::OK }
    }))
    .await;
    let recording = Recording::new();
    let downloader = HttpDownloader::new(&base).unwrap();

    downloader.start("", "a.bin", recording.hooks()).await;
    assert_eq!(downloader.error_code(), DownloadErrorCode::NoResponse);
    assert!(downloader.is_released().await);

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_string_lossy().to_string();
    downloader.start(&root, "", DownloadHooks::new()).await;
    assert_eq!(downloader.error_code(), DownloadErrorCode::NoResponse);

    assert_eq!(
        recording.errors(),
        vec![DownloadErrorCode::NoResponse, DownloadErrorCode::NoResponse]
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

// ═══════════════════════════ 配置 ═══════════════════════════

/// 超时与缓冲区大小只能在第一次 start 之前修改。
#[tokio::test]
async fn config_setters_only_before_first_start() {
    let base = serve(late_router("cfg.bin", Duration::ZERO)).await;
    let downloader = HttpDownloader::new(&base)
        .unwrap()
        .request_timeout(1500)
        .unwrap()
        .buffer_size(32)
        .unwrap();
    assert_eq!(downloader.config().request_timeout_ms, 1500);
    assert_eq!(downloader.config().buffer_size, 32);

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_string_lossy().to_string();
    let recording = Recording::new();
    downloader.start(&root, "cfg.bin", recording.hooks()).await;
    let result = wait_finished(&downloader).await;
    assert!(result.done);
    assert!(recording.progress().iter().all(|n| *n <= 32));

    assert!(matches!(
        downloader.request_timeout(10),
        Err(DownloadError::AlreadyStarted)
    ));
}
