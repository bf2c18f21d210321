pub mod download_hook;

pub use download_hook::DownloadHook;
