use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

/// 进程级关闭信号：只广播一次，晚到的订阅者立即得到已触发的信号
pub struct ShutdownManager {
    /// 触发后置空，兼作已关闭标记
    sender: Mutex<Option<broadcast::Sender<()>>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    /// 订阅关闭信号；关闭已触发时返回立即就绪的接收器
    pub async fn subscribe(&self) -> broadcast::Receiver<()> {
        let guard = self.sender.lock().await;
        match guard.as_ref() {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = broadcast::channel(1);
                let _ = sender.send(());
                receiver
            }
        }
    }

    /// 触发关闭并广播给当前全部订阅者，重复触发无操作
    pub async fn shutdown(&self) {
        let mut guard = self.sender.lock().await;
        match guard.take() {
            Some(sender) => {
                info!("触发关闭，通知 {} 个订阅者", sender.receiver_count());
                let _ = sender.send(());
            }
            None => debug!("关闭信号已触发过"),
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_shutdown_reaches_every_subscriber() {
        let manager = ShutdownManager::new();
        let mut first = manager.subscribe().await;
        let mut second = manager.subscribe().await;

        manager.shutdown().await;

        timeout(Duration::from_secs(1), first.recv())
            .await
            .expect("订阅者应收到关闭信号")
            .unwrap();
        timeout(Duration::from_secs(1), second.recv())
            .await
            .expect("订阅者应收到关闭信号")
            .unwrap();
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_signal_immediately() {
        let manager = ShutdownManager::new();
        manager.shutdown().await;

        // 晚于关闭的订阅不能挂起
        let mut late = manager.subscribe().await;
        timeout(Duration::from_secs(1), late.recv())
            .await
            .expect("晚到的订阅者应立即收到信号")
            .unwrap();
    }

    #[tokio::test]
    async fn test_repeated_shutdown_fires_once() {
        let manager = ShutdownManager::new();
        let mut rx = manager.subscribe().await;

        manager.shutdown().await;
        manager.shutdown().await;

        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("应收到关闭信号")
            .unwrap();
        // 重复触发不产生第二个信号，发送端已随首次触发释放
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Closed)
        ));
    }
}
