/// 内部导出的模块
mod internal;


/// 单文件可续传下载：下载器、内容持有者、超时看门狗与错误分类
pub mod http_download {
    use crate::internal;
    // 结构体模型
    pub use internal::http_download::structs::*;
    // 回调接口
    pub use internal::http_download::traits::*;
}

pub mod states {
    pub mod unlock_reactive {
        use crate::internal;
        pub use internal::states::unlock_reactive::*;
    }
}

/// 存储根目录解析（下载器只把它们当作不透明的根路径）
pub mod platform {
    use crate::internal;
    pub use internal::platform::storage_roots::*;
}

pub use internal::http_download::structs::{
    DownloadErrorCode, DownloadHooks, DownloadSnapshot, DownloaderConfig, HttpDownloader,
};
