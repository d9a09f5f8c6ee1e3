use std::io;

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum HarvestError {
    /// 检查点写入失败
    #[error("检查点写入失败 ({path}): {source}")]
    CheckpointWrite {
        path: String,
        #[source]
        source: io::Error,
    },

    /// 子进程启动失败
    #[error("无法启动子进程 {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: io::Error,
    },

    /// 等待子进程退出失败
    #[error("等待子进程 {program} 退出失败: {source}")]
    WaitFailed {
        program: String,
        #[source]
        source: io::Error,
    },

    /// 网络请求失败
    #[error("请求失败 ({url}): {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// 服务器返回非预期状态码
    #[error("请求 {url} 返回异常状态码: {status}")]
    BadStatus { url: String, status: u16 },

    /// 请求频率限制 (HTTP 429)
    #[error("请求频率限制 (HTTP 429): {url}")]
    RateLimited { url: String },

    /// 页面解析失败
    #[error("页面解析失败: {0}")]
    Parse(String),

    /// 输出文件写入失败
    #[error("输出文件写入失败 ({path}): {source}")]
    OutputWrite {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Regex(#[from] regex::Error),
}

// ========== 便捷构造函数 ==========

impl HarvestError {
    /// 创建检查点写入错误
    pub fn checkpoint_write(path: impl Into<String>, source: io::Error) -> Self {
        HarvestError::CheckpointWrite {
            path: path.into(),
            source,
        }
    }

    /// 创建请求失败错误
    pub fn request_failed(url: impl Into<String>, source: reqwest::Error) -> Self {
        HarvestError::RequestFailed {
            url: url.into(),
            source,
        }
    }

    /// 创建输出写入错误
    pub fn output_write(path: impl Into<String>, source: csv::Error) -> Self {
        HarvestError::OutputWrite {
            path: path.into(),
            source,
        }
    }

    /// 是否为限流错误
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, HarvestError::RateLimited { .. })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, HarvestError>;
