//! 持续运行循环 - 编排层
//!
//! 反复以子进程方式调用批次管理器，直到全部完成、用户中断或达到次数上限。
//! 下层的任何失败都不会让循环退出，只会在恢复等待后继续。

use std::fmt;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::Config;
use crate::infrastructure::Shutdown;
use crate::models::outcome::{EXIT_INTERRUPTED, EXIT_SUCCESS};
use crate::models::ProcessOutcome;
use crate::orchestrator::launcher::ManagerLauncher;

/// 循环的终止状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// 批次管理器报告全部完成
    Complete,
    /// 用户中断
    Interrupted,
    /// 达到最大批次数
    MaxReached,
}

impl LoopExit {
    pub fn exit_code(&self) -> i32 {
        match self {
            LoopExit::Interrupted => EXIT_INTERRUPTED,
            LoopExit::Complete | LoopExit::MaxReached => EXIT_SUCCESS,
        }
    }
}

impl fmt::Display for LoopExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopExit::Complete => write!(f, "全部完成"),
            LoopExit::Interrupted => write!(f, "用户中断"),
            LoopExit::MaxReached => write!(f, "达到最大批次数"),
        }
    }
}

/// 循环统计
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSummary {
    pub iterations: u64,
    pub successes: u64,
    pub failures: u64,
    pub exit: LoopExit,
}

/// 持续运行循环
pub struct ContinuousLoop<L: ManagerLauncher> {
    launcher: L,
    max_batches: u64,
    pause: Duration,
    recovery_delay: Duration,
    shutdown: Shutdown,
}

impl<L: ManagerLauncher> ContinuousLoop<L> {
    pub fn new(config: &Config, launcher: L, shutdown: Shutdown) -> Self {
        Self {
            launcher,
            max_batches: config.max_batches,
            pause: config.pause_between_batches(),
            recovery_delay: config.recovery_delay(),
            shutdown,
        }
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// 运行直到终止，返回统计
    pub async fn run(&self) -> LoopSummary {
        log_loop_start(self.max_batches, self.pause);

        let mut iterations = 0;
        let mut successes = 0;
        let mut failures = 0;

        let exit = loop {
            if self.shutdown.is_triggered() {
                break LoopExit::Interrupted;
            }
            if iterations >= self.max_batches {
                break LoopExit::MaxReached;
            }

            iterations += 1;
            log_iteration(iterations, self.max_batches);

            let launched = self.launcher.launch_manager().await;
            if self.shutdown.is_triggered() {
                break LoopExit::Interrupted;
            }

            match launched {
                Ok(ProcessOutcome::Complete) => break LoopExit::Complete,
                Ok(ProcessOutcome::Success) => {
                    successes += 1;
                    info!("✅ 第 {} 次批次成功", iterations);
                    if !self.pause.is_zero() {
                        info!("⏸️ 暂停 {} 秒后继续", self.pause.as_secs());
                        if !self.shutdown.sleep(self.pause).await {
                            break LoopExit::Interrupted;
                        }
                    }
                }
                // 本进程的中断已在上面处理，子进程自己报告的中断也算一次失败
                Ok(outcome) => {
                    failures += 1;
                    warn!("⚠️ 第 {} 次批次结果: {}", iterations, outcome);
                    if !self.recover().await {
                        break LoopExit::Interrupted;
                    }
                }
                Err(e) => {
                    failures += 1;
                    error!("❌ 无法运行批次管理器: {}", e);
                    if !self.recover().await {
                        break LoopExit::Interrupted;
                    }
                }
            }
        };

        let summary = LoopSummary {
            iterations,
            successes,
            failures,
            exit,
        };
        log_loop_summary(&summary);
        summary
    }

    async fn recover(&self) -> bool {
        info!("⏳ {} 秒后重试", self.recovery_delay.as_secs());
        self.shutdown.sleep(self.recovery_delay).await
    }
}

// ========== 日志辅助函数 ==========

fn log_loop_start(max_batches: u64, pause: Duration) {
    info!("{}", "=".repeat(60));
    info!("🚀 持续抓取模式启动");
    info!("📊 最大批次数: {}", max_batches);
    info!("⏸️ 批次间暂停: {} 秒", pause.as_secs());
    info!("{}", "=".repeat(60));
}

fn log_iteration(iteration: u64, max_batches: u64) {
    info!("\n{}", "=".repeat(60));
    info!("🔁 第 {}/{} 次批次", iteration, max_batches);
    info!("{}", "=".repeat(60));
}

fn log_loop_summary(summary: &LoopSummary) {
    info!("\n{}", "=".repeat(60));
    info!("📊 持续抓取统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("🔁 批次: {}", summary.iterations);
    info!("✅ 成功: {}", summary.successes);
    info!("❌ 失败: {}", summary.failures);
    info!("🏁 结束原因: {}", summary.exit);
    info!("{}", "=".repeat(60));
}
