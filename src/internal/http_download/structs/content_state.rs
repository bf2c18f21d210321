/// 内容持有者状态
///
/// `Canceling` 只是一个请求标志：读循环在发起下一次读取前才会看到它，
/// 已经在途的读取不会被打断。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentState {
    DownLoading,
    Canceling,
    Completed,
    Failed,
}

impl ContentState {
    /// 仍处于传输过程中（包括已请求取消但尚未观察到的情况）。
    pub fn is_active(&self) -> bool {
        matches!(self, ContentState::DownLoading | ContentState::Canceling)
    }
}
