//! # UnlockReactiveProperty
//!
//! 读写都不阻塞的响应式属性，适合高频更新的下载状态快照。
//!
//! ## 使用示例
//! ```rust,no_run
//! use http_resume::states::unlock_reactive::UnlockReactiveProperty;
//!
//! let prop = UnlockReactiveProperty::new(0u64);
//! prop.update(1).unwrap();
//! assert_eq!(prop.get_current(), Some(1));
//! ```

pub use super::reactive_core::{PropertyWatcher, ReactivePropertyError as UnlockReactivePropertyError};

/// 轻量级响应式属性容器（纯通知机制，无条件等待能力）。
pub type UnlockReactiveProperty<T> = super::reactive_core::ReactiveProperty<T>;
