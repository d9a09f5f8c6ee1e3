//! 批次管理器 - 编排层
//!
//! ## 职责
//!
//! 一次调用只处理一个批次：
//!
//! 1. **读取断点**：断点超过总页数时直接报告全部完成，不启动抓取进程
//! 2. **规划区间**：`[start, min(start + batch_size - 1, total_pages_limit)]`
//! 3. **启动抓取**：在批次目录下生成唯一输出文件名，启动抓取进程并等待
//! 4. **推进断点**：只有抓取成功才保存 `end + 1`
//! 5. **封禁冷却**：硬封禁固定冷却，软封禁随机冷却，冷却期间可被中断
//!
//! ## 设计特点
//!
//! - **至少一次**：失败的区间会在下一次调用时原样重试
//! - **保留退出码**：抓取进程报告的"全部完成"视为崩溃，只有本层能报告完成
//! - **中断归属**：只有本进程收到中断时才报告中断，否则抓取进程的中断按崩溃处理

use std::fs;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{CheckpointStore, Shutdown};
use crate::models::outcome::{EXIT_INTERNAL_ERROR, EXIT_INTERRUPTED};
use crate::models::{BatchRange, ProcessOutcome};
use crate::orchestrator::launcher::WorkerLauncher;
use crate::services::CooldownPolicy;

/// 批次管理器
pub struct BatchManager<L: WorkerLauncher> {
    config: Config,
    store: CheckpointStore,
    launcher: L,
    cooldown: CooldownPolicy,
    rng: StdRng,
    shutdown: Shutdown,
}

impl<L: WorkerLauncher> BatchManager<L> {
    pub fn new(config: Config, launcher: L, shutdown: Shutdown) -> Self {
        Self {
            store: CheckpointStore::new(config.checkpoint_path.clone()),
            cooldown: CooldownPolicy::from_config(&config),
            rng: StdRng::from_entropy(),
            config,
            launcher,
            shutdown,
        }
    }

    /// 替换软封禁冷却使用的随机源
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.store
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// 处理一个批次
    pub async fn run_once(&mut self) -> AppResult<ProcessOutcome> {
        let start = self.store.load();
        let Some(range) =
            BatchRange::plan(start, self.config.batch_size, self.config.total_pages_limit)
        else {
            log_all_complete(start, self.config.total_pages_limit);
            return Ok(ProcessOutcome::Complete);
        };

        fs::create_dir_all(&self.config.batch_folder)?;
        let output = range.unique_output_path(
            &self.config.batch_folder,
            &self.config.output_prefix,
            chrono::Local::now(),
        );
        log_batch_start(range, self.config.total_pages_limit, &output.display().to_string());

        let outcome = match self.launcher.launch_worker(range, &output).await? {
            ProcessOutcome::Complete => {
                warn!("⚠️ 抓取进程报告了保留的完成状态，按崩溃处理");
                ProcessOutcome::Crashed(EXIT_INTERNAL_ERROR)
            }
            // 本进程未收到中断，130 只是抓取进程自己的退出码
            ProcessOutcome::Interrupted if !self.shutdown.is_triggered() => {
                warn!("⚠️ 抓取进程报告中断，但本进程未收到中断信号，按崩溃处理");
                ProcessOutcome::Crashed(EXIT_INTERRUPTED)
            }
            other => other,
        };

        match outcome {
            ProcessOutcome::Success => {
                let next = range.next_checkpoint();
                self.store.save(next)?;
                log_batch_success(range, next);
            }
            ProcessOutcome::HardBan | ProcessOutcome::SoftBan => {
                let Some(delay) = self.cooldown.delay_for(outcome, &mut self.rng) else {
                    return Ok(outcome);
                };
                log_cooldown(range, outcome, delay.as_secs());
                if !self.shutdown.sleep(delay).await {
                    warn!("⛔ 冷却期间收到中断信号");
                    return Ok(ProcessOutcome::Interrupted);
                }
                info!("✓ 冷却结束，区间 {} 将在下一次调用时重试", range);
            }
            ProcessOutcome::Interrupted => {
                warn!("⛔ 区间 {} 的抓取被中断，断点保持 {}", range, start);
            }
            ProcessOutcome::Crashed(code) => {
                error!("❌ 区间 {} 抓取失败 (退出码 {})，断点保持 {}", range, code, start);
            }
            ProcessOutcome::Complete => {}
        }

        Ok(outcome)
    }
}

// ========== 日志辅助函数 ==========

fn log_all_complete(checkpoint: u32, total: u32) {
    info!("{}", "=".repeat(60));
    info!("🎉 全部页面已抓取完成 (断点 {} > 总页数 {})", checkpoint, total);
    info!("{}", "=".repeat(60));
}

fn log_batch_start(range: BatchRange, total: u32, output: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始处理批次 {} / 共 {} 页", range, total);
    info!("💾 输出文件: {}", output);
    info!("{}", "=".repeat(60));
}

fn log_batch_success(range: BatchRange, next: u32) {
    info!("\n{}", "─".repeat(60));
    info!("✅ 批次 {} 完成，断点推进到 {}", range, next);
    info!("{}", "─".repeat(60));
}

fn log_cooldown(range: BatchRange, outcome: ProcessOutcome, secs: u64) {
    warn!("\n{}", "─".repeat(60));
    warn!("🚫 批次 {} 结果: {}", range, outcome);
    warn!("⏳ 冷却 {} 秒，断点保持不变", secs);
    warn!("{}", "─".repeat(60));
}
