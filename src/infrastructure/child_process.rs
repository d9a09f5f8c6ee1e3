//! 子进程执行器 - 基础设施层
//!
//! 启动隔离的子进程、转发其输出、读取结构化结果行并等待退出
//!
//! Unix 上每个子进程独占一个进程组，中断时先向整个组转发 SIGINT，
//! 宽限期过后再发送 SIGKILL，子进程派生的进程不会被遗留下来。

use std::process::Stdio;
use std::time::Duration;

#[cfg(unix)]
use nix::sys::signal::{killpg, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{AppResult, HarvestError};
use crate::infrastructure::Shutdown;
use crate::models::ProcessOutcome;

/// 中断后等待子进程自行退出的时间
pub const CHILD_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// 子进程命令
#[derive(Debug, Clone)]
pub struct ChildCommand {
    program: String,
    args: Vec<String>,
}

impl ChildCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// 当前可执行文件
    pub fn current_exe() -> AppResult<Self> {
        let exe = std::env::current_exe()?;
        Ok(Self::new(exe.to_string_lossy().to_string()))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// 运行子进程直到退出，返回其结果
    ///
    /// 优先使用子进程打印的结构化结果行，没有时按退出码分类。
    /// 收到中断信号后把它转发给子进程并给一段宽限时间，超时则强制结束，结果为 Interrupted。
    pub async fn run(&self, shutdown: &Shutdown) -> AppResult<ProcessOutcome> {
        debug!("启动子进程: {} {:?}", self.program, self.args);

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|source| HarvestError::SpawnFailed {
                program: self.program.clone(),
                source,
            })?;

        let reader = child.stdout.take().map(forward_stdout);

        let finished = tokio::select! {
            status = child.wait() => Some(status),
            _ = shutdown.triggered() => None,
        };

        let status = match finished {
            Some(status) => status.map_err(|source| HarvestError::WaitFailed {
                program: self.program.clone(),
                source,
            })?,
            None => {
                self.stop_after_interrupt(&mut child).await;
                if let Some(reader) = reader {
                    reader.abort();
                }
                return Ok(ProcessOutcome::Interrupted);
            }
        };

        let reported = match reader {
            Some(reader) => reader.await.unwrap_or_else(|e| {
                warn!("读取子进程输出失败: {}", e);
                None
            }),
            None => None,
        };

        let outcome = reported.unwrap_or_else(|| ProcessOutcome::from_exit_status(status));
        debug!(
            "子进程退出: {} (状态: {}, 结果: {})",
            self.program, status, outcome
        );
        Ok(outcome)
    }

    async fn stop_after_interrupt(&self, child: &mut Child) {
        forward_interrupt(child);
        match tokio::time::timeout(CHILD_GRACE_PERIOD, child.wait()).await {
            Ok(_) => debug!("子进程已在中断后退出"),
            Err(_) => {
                warn!("⚠️ 子进程未在 {:?} 内退出，强制结束", CHILD_GRACE_PERIOD);
                kill_group(child);
                if let Err(e) = child.kill().await {
                    warn!("结束子进程失败: {}", e);
                }
            }
        }
    }
}

#[cfg(unix)]
fn signal_group(child: &Child, signal: Signal) {
    // 已被回收的子进程没有 pid
    let Some(pid) = child.id() else { return };
    if let Err(e) = killpg(Pid::from_raw(pid as i32), signal) {
        debug!("向进程组 {} 发送 {:?} 失败: {}", pid, signal, e);
    }
}

#[cfg(unix)]
fn forward_interrupt(child: &Child) {
    signal_group(child, Signal::SIGINT);
}

#[cfg(unix)]
fn kill_group(child: &Child) {
    signal_group(child, Signal::SIGKILL);
}

#[cfg(not(unix))]
fn forward_interrupt(_child: &Child) {}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

/// 转发子进程 stdout，截获其中的结构化结果行
fn forward_stdout(stdout: ChildStdout) -> JoinHandle<Option<ProcessOutcome>> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        let mut reported = None;
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match ProcessOutcome::parse_line(&line) {
                    Some(outcome) => reported = Some(outcome),
                    None => println!("{}", line),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("子进程输出读取中断: {}", e);
                    break;
                }
            }
        }
        reported
    })
}
