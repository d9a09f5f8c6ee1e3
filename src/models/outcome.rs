//! 进程结果协议
//!
//! 每一层子进程退出前在 stdout 打印一行结构化结果，父进程优先读取该行；
//! 缺失时（外部抓取程序、崩溃）再退回到退出码。

use std::fmt;
use std::process::ExitStatus;

use serde::{Deserialize, Serialize};

/// 结构化结果行前缀
pub const OUTCOME_LINE_PREFIX: &str = "@@harvest-outcome ";

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_INTERNAL_ERROR: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_SOFT_BAN: i32 = 5;
pub const EXIT_COMPLETE: i32 = 99;
pub const EXIT_INTERRUPTED: i32 = 130;
pub const EXIT_HARD_BAN: i32 = 429;

/// Unix 只保留退出码低 8 位，429 实际会变成 173
pub const EXIT_HARD_BAN_TRUNCATED: i32 = EXIT_HARD_BAN & 0xFF;

#[cfg(unix)]
const SIGINT: i32 = 2;

/// 一次进程调用的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "code", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// 批次成功
    Success,
    /// 整个范围没有提取到任何记录，疑似静默限流
    SoftBan,
    /// 观察到明确的限流响应
    HardBan,
    /// 所有页面已处理完毕（仅 Manager → Loop）
    Complete,
    /// 用户中断
    Interrupted,
    /// 未分类的失败
    Crashed(i32),
}

impl ProcessOutcome {
    /// 对应的进程退出码
    pub fn exit_code(&self) -> i32 {
        match self {
            ProcessOutcome::Success => EXIT_SUCCESS,
            ProcessOutcome::SoftBan => EXIT_SOFT_BAN,
            ProcessOutcome::HardBan => EXIT_HARD_BAN,
            ProcessOutcome::Complete => EXIT_COMPLETE,
            ProcessOutcome::Interrupted => EXIT_INTERRUPTED,
            ProcessOutcome::Crashed(code) => *code,
        }
    }

    /// 根据退出码分类
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            EXIT_SUCCESS => ProcessOutcome::Success,
            EXIT_SOFT_BAN => ProcessOutcome::SoftBan,
            EXIT_HARD_BAN | EXIT_HARD_BAN_TRUNCATED => ProcessOutcome::HardBan,
            EXIT_COMPLETE => ProcessOutcome::Complete,
            EXIT_INTERRUPTED => ProcessOutcome::Interrupted,
            other => ProcessOutcome::Crashed(other),
        }
    }

    /// 根据子进程退出状态分类（无结构化结果行时使用）
    pub fn from_exit_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::from_exit_code(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if status.signal() == Some(SIGINT) {
                return ProcessOutcome::Interrupted;
            }
        }

        ProcessOutcome::Crashed(-1)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProcessOutcome::Success)
    }

    /// 编码为结构化结果行
    pub fn to_line(&self) -> String {
        // 枚举序列化不会失败
        let body = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("{}{}", OUTCOME_LINE_PREFIX, body)
    }

    /// 解析结构化结果行，非协议行返回 None
    pub fn parse_line(line: &str) -> Option<Self> {
        let body = line.trim_end().strip_prefix(OUTCOME_LINE_PREFIX)?;
        serde_json::from_str(body).ok()
    }
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessOutcome::Success => write!(f, "成功"),
            ProcessOutcome::SoftBan => write!(f, "软封禁"),
            ProcessOutcome::HardBan => write!(f, "硬封禁 (429)"),
            ProcessOutcome::Complete => write!(f, "全部完成"),
            ProcessOutcome::Interrupted => write!(f, "用户中断"),
            ProcessOutcome::Crashed(code) => write!(f, "崩溃 (退出码 {})", code),
        }
    }
}
