pub mod http_download;
pub mod platform;
pub mod states;
