// Common test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use listing_harvester::{AppResult, BatchManager, BatchRange, Config, ManagerLauncher, ProcessOutcome, WorkerLauncher};

/// 按脚本依次返回结果的抓取进程，脚本耗尽后一直返回 `fallback`
pub struct ScriptedWorker {
    script: Mutex<VecDeque<ProcessOutcome>>,
    fallback: ProcessOutcome,
    calls: Mutex<Vec<(BatchRange, PathBuf)>>,
}

impl ScriptedWorker {
    pub fn new(script: impl IntoIterator<Item = ProcessOutcome>, fallback: ProcessOutcome) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(outcome: ProcessOutcome) -> Self {
        Self::new([], outcome)
    }

    pub fn ranges(&self) -> Vec<BatchRange> {
        self.calls.lock().unwrap().iter().map(|(r, _)| *r).collect()
    }

    pub fn outputs(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().iter().map(|(_, p)| p.clone()).collect()
    }
}

impl WorkerLauncher for ScriptedWorker {
    async fn launch_worker(&self, range: BatchRange, output: &Path) -> AppResult<ProcessOutcome> {
        self.calls
            .lock()
            .unwrap()
            .push((range, output.to_path_buf()));
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        if outcome == ProcessOutcome::Success {
            fs::write(output, "ad_id\n")?;
        }
        Ok(outcome)
    }
}

/// 在当前进程内运行批次管理器，代替 `batch` 子进程
pub struct InProcessManager {
    pub manager: tokio::sync::Mutex<BatchManager<ScriptedWorker>>,
}

impl InProcessManager {
    pub fn new(manager: BatchManager<ScriptedWorker>) -> Self {
        Self {
            manager: tokio::sync::Mutex::new(manager),
        }
    }

    pub async fn worker_ranges(&self) -> Vec<BatchRange> {
        self.manager.lock().await.launcher().ranges()
    }
}

impl ManagerLauncher for InProcessManager {
    async fn launch_manager(&self) -> AppResult<ProcessOutcome> {
        self.manager.lock().await.run_once().await
    }
}

/// 指向临时目录的配置
pub fn config_in(dir: &Path, batch_size: u32, total_pages_limit: u32) -> Config {
    Config {
        batch_size,
        total_pages_limit,
        checkpoint_path: dir.join("checkpoint.txt"),
        batch_folder: dir.join("batches"),
        ..Config::default()
    }
}

pub fn range(start: u32, end: u32) -> BatchRange {
    BatchRange { start, end }
}
