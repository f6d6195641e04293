//! 唤醒信号（WakeupSignal）
//!
//! 每个命名空间一条容量为 1 的信号通道：
//! - `notify`：非阻塞发送，已有未消费信号时直接丢弃（合并），
//!   必须在事务提交之后调用；
//! - `recv`：调度器侧等待下一次唤醒。
//!
//! 正确性不依赖信号数量，只依赖"至少还会有一次扫描"；
//! 丢失的信号由调度器的周期兜底扫描补偿。
//!
use tokio::sync::mpsc;

/// 创建一对唤醒信号端点（生产方 / 调度器方）
pub fn wakeup_channel() -> (WakeupSignal, WakeupListener) {
    let (tx, rx) = mpsc::channel(1);
    (WakeupSignal { tx }, WakeupListener { rx })
}

/// 生产方端点：提交事务后触发一次扫描
#[derive(Clone)]
pub struct WakeupSignal {
    tx: mpsc::Sender<()>,
}

impl WakeupSignal {
    /// 非阻塞、可合并的唤醒；信号槽已满或通道关闭时静默丢弃
    pub fn notify(&self) {
        let _ = self.tx.try_send(());
    }
}

/// 调度器端点：等待下一次唤醒
pub struct WakeupListener {
    rx: mpsc::Receiver<()>,
}

impl WakeupListener {
    /// 等待一次唤醒。所有发送端关闭后永远挂起，
    /// 退出统一由调度器的取消令牌负责。
    pub async fn recv(&mut self) {
        if self.rx.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}
