//! 中断信号 - 基础设施层
//!
//! 把 Ctrl-C / SIGTERM 转换成各层共享的取消令牌

use std::time::Duration;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 共享的中断信号
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建并监听 Ctrl-C (SIGINT)，Unix 上同时监听 SIGTERM
    pub fn install_ctrl_c() -> Self {
        let shutdown = Self::new();
        let token = shutdown.token.clone();
        tokio::spawn(async move {
            match wait_for_signal().await {
                Ok(name) => {
                    info!("\n⛔ 收到中断信号 ({})，正在停止...", name);
                    token.cancel();
                }
                Err(e) => warn!("无法监听中断信号: {}", e),
            }
        });
        shutdown
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn triggered(&self) {
        self.token.cancelled().await
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// 可中断的等待，完整睡眠返回 true，被中断返回 false
    pub async fn sleep(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.is_triggered();
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.token.cancelled() => false,
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    tokio::select! {
        result = signal::ctrl_c() => result.map(|_| "Ctrl-C"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    signal::ctrl_c().await.map(|_| "Ctrl-C")
}
