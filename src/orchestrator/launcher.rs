//! 子进程启动器 - 编排层
//!
//! 上层只通过这两个 trait 调用下层，测试里可以替换成进程内的假实现。

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{ChildCommand, Shutdown};
use crate::models::{BatchRange, ProcessOutcome};

/// 为一个区间启动抓取进程
#[allow(async_fn_in_trait)]
pub trait WorkerLauncher {
    async fn launch_worker(&self, range: BatchRange, output: &Path) -> AppResult<ProcessOutcome>;
}

/// 启动一次批次管理进程
#[allow(async_fn_in_trait)]
pub trait ManagerLauncher {
    async fn launch_manager(&self) -> AppResult<ProcessOutcome>;
}

/// 以子进程方式启动下一层
///
/// 未配置外部抓取程序时，抓取和批次管理都由当前可执行文件的子命令完成，
/// 并把 `--config` 原样传给子进程。
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    worker_program: Option<String>,
    worker_args: Vec<String>,
    config_path: Option<PathBuf>,
    shutdown: Shutdown,
}

impl ProcessLauncher {
    pub fn new(config: &Config, config_path: Option<PathBuf>, shutdown: Shutdown) -> Self {
        Self {
            worker_program: config.worker_program.clone(),
            worker_args: config.worker_args.clone(),
            config_path,
            shutdown,
        }
    }

    fn self_command(&self) -> AppResult<ChildCommand> {
        let command = ChildCommand::current_exe()?;
        Ok(match &self.config_path {
            Some(path) => command
                .arg("--config")
                .arg(path.to_string_lossy().to_string()),
            None => command,
        })
    }

    /// 抓取进程命令：`<program> [args..] <start> <end> <output>`
    pub fn worker_command(&self, range: BatchRange, output: &Path) -> AppResult<ChildCommand> {
        let command = match &self.worker_program {
            Some(program) => ChildCommand::new(program.as_str()).args(self.worker_args.iter().cloned()),
            None => self.self_command()?.arg("fetch"),
        };
        Ok(command
            .arg(range.start.to_string())
            .arg(range.end.to_string())
            .arg(output.to_string_lossy().to_string()))
    }

    pub fn manager_command(&self) -> AppResult<ChildCommand> {
        Ok(self.self_command()?.arg("batch"))
    }
}

impl WorkerLauncher for ProcessLauncher {
    async fn launch_worker(&self, range: BatchRange, output: &Path) -> AppResult<ProcessOutcome> {
        self.worker_command(range, output)?.run(&self.shutdown).await
    }
}

impl ManagerLauncher for ProcessLauncher {
    async fn launch_manager(&self) -> AppResult<ProcessOutcome> {
        self.manager_command()?.run(&self.shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_worker_command() {
        let config = Config {
            worker_program: Some("python3".to_string()),
            worker_args: vec!["spider.py".to_string()],
            ..Config::default()
        };
        let launcher = ProcessLauncher::new(&config, None, Shutdown::new());
        let command = launcher
            .worker_command(BatchRange { start: 101, end: 200 }, Path::new("batches/out.csv"))
            .unwrap();

        assert_eq!(command.program(), "python3");
        assert_eq!(
            command.arguments(),
            &["spider.py", "101", "200", "batches/out.csv"]
        );
    }

    #[test]
    fn test_builtin_worker_passes_config_through() {
        let launcher = ProcessLauncher::new(
            &Config::default(),
            Some(PathBuf::from("harvest.toml")),
            Shutdown::new(),
        );
        let command = launcher
            .worker_command(BatchRange { start: 1, end: 100 }, Path::new("out.csv"))
            .unwrap();

        assert_eq!(
            command.arguments(),
            &["--config", "harvest.toml", "fetch", "1", "100", "out.csv"]
        );
    }

    #[test]
    fn test_manager_command() {
        let launcher = ProcessLauncher::new(&Config::default(), None, Shutdown::new());
        assert_eq!(launcher.manager_command().unwrap().arguments(), &["batch"]);
    }
}
