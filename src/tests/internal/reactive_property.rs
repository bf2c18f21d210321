//! 响应式属性测试：基础读写、watch 监听、销毁后唤醒监听者。

use std::time::Duration;

use crate::states::unlock_reactive::{UnlockReactiveProperty, UnlockReactivePropertyError};

#[tokio::test]
async fn basic_update_and_read() {
    let prop = UnlockReactiveProperty::new(0u64);
    prop.update(42).unwrap();
    assert_eq!(prop.get_current(), Some(42));
    assert_eq!(prop.map(|v| v * 2), Some(84));
}

#[tokio::test]
async fn clones_share_the_same_value() {
    let prop = UnlockReactiveProperty::new(String::from("a"));
    let other = prop.clone();
    other.update("b".to_string()).unwrap();
    assert_eq!(prop.get_current().as_deref(), Some("b"));
}

#[tokio::test]
async fn watch_receives_updates() {
    let prop = UnlockReactiveProperty::new(0i32);
    let mut watcher = prop.watch();

    prop.update(1).unwrap();
    assert_eq!(watcher.changed().await.unwrap(), 1);

    prop.update(2).unwrap();
    prop.update(3).unwrap();
    // 只保留最新值
    assert_eq!(watcher.changed().await.unwrap(), 3);
    assert_eq!(watcher.borrow(), Some(3));
}

#[tokio::test]
async fn watcher_waits_across_tasks() {
    let prop = UnlockReactiveProperty::new(0u32);
    let mut watcher = prop.watch();

    let writer = prop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        writer.update(7).unwrap();
    });

    let v = tokio::time::timeout(Duration::from_secs(2), watcher.changed())
        .await
        .expect("应在超时前收到变化")
        .unwrap();
    assert_eq!(v, 7);
}

#[tokio::test]
async fn watcher_keeps_property_alive() {
    let prop = UnlockReactiveProperty::new(1u8);
    let watcher = prop.watch();
    drop(prop);
    assert_eq!(watcher.borrow(), Some(1));

    // 没有写入方后不会再有变化
    let mut watcher = watcher;
    let pending = tokio::time::timeout(Duration::from_millis(50), watcher.changed()).await;
    assert!(pending.is_err());
}

#[test]
fn error_messages_are_readable() {
    assert_eq!(
        UnlockReactivePropertyError::WatcherClosed.to_string(),
        "监听器已被销毁"
    );
}
