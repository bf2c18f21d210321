use serde::{Deserialize, Serialize};

/// 对外暴露的下载错误分类（扁平枚举）。
///
/// 每次失败的下载尝试只会落到除 `None` 以外的某一个值上，`None` 仅作为初始值，
/// 不会通过错误回调报告给调用方。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DownloadErrorCode {
    /// 未出错（初始值）
    #[default]
    None,
    /// 取消下载：读循环在下一次读取前观察到取消请求
    Cancel,
    /// 没有响应：状态码不符合预期，或请求构建 / 发出失败
    NoResponse,
    /// 下载出错：解析响应或读写字节时出错
    DownLoadError,
    /// 请求超时：看门狗在响应到达前触发
    TimeOut,
    /// 强制关闭；续传校验时服务器返回 304 也用它表示“文件已完整，无需下载”
    Abort,
}

impl DownloadErrorCode {
    /// 是否表示一次失败（`None` 以外的值）。
    pub fn is_failure(&self) -> bool {
        !matches!(self, DownloadErrorCode::None)
    }
}
