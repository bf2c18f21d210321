//! 存储根目录：只读资源根（StreamingAssets）与可写数据根（PersistentAssets）。
//!
//! 下载器把两者都当作不透明的字符串，直接传给 `start` 的 `root` 参数。

use std::path::{Path, PathBuf};

use crate::internal::http_download::structs::DownloadError;

const STREAMING_ASSETS_DIR: &str = "StreamingAssets";
const PERSISTENT_ASSETS_DIR: &str = "PersistentAssets";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRoots {
    /// 随程序分发的只读资源目录
    pub streaming_assets: PathBuf,
    /// 下载写入的可写数据目录
    pub persistent_data: PathBuf,
}

impl StorageRoots {
    pub fn new(streaming_assets: impl Into<PathBuf>, persistent_data: impl Into<PathBuf>) -> Self {
        Self {
            streaming_assets: streaming_assets.into(),
            persistent_data: persistent_data.into(),
        }
    }

    /// 按当前平台解析：
    /// - 可写数据根：`<系统数据目录>/<app_name>/PersistentAssets`
    /// - 只读资源根：可执行文件所在目录下的 `StreamingAssets`
    pub fn resolve(app_name: &str) -> Result<Self, DownloadError> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| DownloadError::StorageRoot("系统数据目录不可用".to_string()))?;
        let exe = std::env::current_exe()
            .map_err(|e| DownloadError::StorageRoot(e.to_string()))?;
        let exe_dir = exe
            .parent()
            .ok_or_else(|| DownloadError::StorageRoot("可执行文件没有父目录".to_string()))?;

        Ok(Self::from_base_dirs(exe_dir, &data_dir, app_name))
    }

    fn from_base_dirs(exe_dir: &Path, data_dir: &Path, app_name: &str) -> Self {
        Self {
            streaming_assets: exe_dir.join(STREAMING_ASSETS_DIR),
            persistent_data: data_dir.join(app_name).join(PERSISTENT_ASSETS_DIR),
        }
    }

    /// 可写数据根的字符串形式，供 `start` 使用。
    pub fn persistent_root(&self) -> String {
        self.persistent_data.to_string_lossy().into_owned()
    }

    pub fn streaming_root(&self) -> String {
        self.streaming_assets.to_string_lossy().into_owned()
    }
}
