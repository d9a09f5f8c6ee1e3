use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::{AppResult, HarvestError};

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 批次配置 ---
    /// 每批处理的页数
    pub batch_size: u32,
    /// 总页数上限
    pub total_pages_limit: u32,
    /// 检查点文件
    pub checkpoint_path: PathBuf,
    /// 批次输出目录
    pub batch_folder: PathBuf,
    /// 输出文件名前缀
    pub output_prefix: String,

    // --- 冷却配置 ---
    /// 硬封禁 (429) 后的冷却秒数
    pub hard_ban_cooldown_secs: u64,
    /// 软封禁冷却窗口下限（秒）
    pub soft_ban_cooldown_min_secs: u64,
    /// 软封禁冷却窗口上限（秒）
    pub soft_ban_cooldown_max_secs: u64,

    // --- 循环配置 ---
    /// 批次失败后的恢复等待秒数
    pub recovery_delay_secs: u64,
    /// 成功批次之间的暂停分钟数
    pub pause_minutes: u64,
    /// 单次运行最多执行的批次数
    pub max_batches: u64,

    // --- 抓取进程配置 ---
    /// 外部抓取程序（未设置时使用本程序的 fetch 子命令）
    pub worker_program: Option<String>,
    /// 外部抓取程序的前置参数
    pub worker_args: Vec<String>,

    // --- 抓取配置 ---
    /// 列表页地址
    pub listing_url: String,
    /// 广告链接匹配片段
    pub ad_link_pattern: String,
    /// 电话号码接口（`{ad_id}` 会被替换）
    pub phone_endpoint: Option<String>,
    /// 同时进行的请求数量
    pub concurrent_requests: usize,
    /// 每个请求前的等待毫秒数
    pub request_delay_ms: u64,
    /// 请求超时秒数
    pub request_timeout_secs: u64,
    /// 可重试错误的最大重试次数
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: 100,
            total_pages_limit: 8000,
            checkpoint_path: PathBuf::from("checkpoint.txt"),
            batch_folder: PathBuf::from("batches"),
            output_prefix: "listings".to_string(),
            hard_ban_cooldown_secs: 120,
            soft_ban_cooldown_min_secs: 120,
            soft_ban_cooldown_max_secs: 240,
            recovery_delay_secs: 10,
            pause_minutes: 0,
            max_batches: 8800,
            worker_program: None,
            worker_args: Vec::new(),
            listing_url: "https://www.otomoto.pl/osobowe".to_string(),
            ad_link_pattern: "otomoto.pl/osobowe/oferta".to_string(),
            phone_endpoint: Some(
                "https://www.otomoto.pl/ajax/misc/contact/multi_phone/{ad_id}/0/".to_string(),
            ),
            concurrent_requests: 8,
            request_delay_ms: 200,
            request_timeout_secs: 30,
            max_retries: 5,
        }
    }
}

impl Config {
    /// 加载配置：默认值 → TOML 文件（可选）→ 环境变量
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let base = match config_file {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        let config = base.with_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载配置
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 用外部键值覆盖配置，无法解析的值保持原样
    pub fn with_overrides<F>(self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            batch_size: parsed(&lookup, "BATCH_SIZE").unwrap_or(self.batch_size),
            total_pages_limit: parsed(&lookup, "TOTAL_PAGES_LIMIT")
                .unwrap_or(self.total_pages_limit),
            checkpoint_path: lookup("CHECKPOINT_PATH")
                .map(PathBuf::from)
                .unwrap_or(self.checkpoint_path),
            batch_folder: lookup("BATCH_FOLDER")
                .map(PathBuf::from)
                .unwrap_or(self.batch_folder),
            output_prefix: lookup("OUTPUT_PREFIX").unwrap_or(self.output_prefix),
            hard_ban_cooldown_secs: parsed(&lookup, "HARD_BAN_COOLDOWN_SECS")
                .unwrap_or(self.hard_ban_cooldown_secs),
            soft_ban_cooldown_min_secs: parsed(&lookup, "SOFT_BAN_COOLDOWN_MIN_SECS")
                .unwrap_or(self.soft_ban_cooldown_min_secs),
            soft_ban_cooldown_max_secs: parsed(&lookup, "SOFT_BAN_COOLDOWN_MAX_SECS")
                .unwrap_or(self.soft_ban_cooldown_max_secs),
            recovery_delay_secs: parsed(&lookup, "RECOVERY_DELAY_SECS")
                .unwrap_or(self.recovery_delay_secs),
            pause_minutes: parsed(&lookup, "PAUSE_MINUTES").unwrap_or(self.pause_minutes),
            max_batches: parsed(&lookup, "MAX_BATCHES").unwrap_or(self.max_batches),
            worker_program: lookup("WORKER_PROGRAM").or(self.worker_program),
            worker_args: self.worker_args,
            listing_url: lookup("LISTING_URL").unwrap_or(self.listing_url),
            ad_link_pattern: lookup("AD_LINK_PATTERN").unwrap_or(self.ad_link_pattern),
            phone_endpoint: lookup("PHONE_ENDPOINT").or(self.phone_endpoint),
            concurrent_requests: parsed(&lookup, "CONCURRENT_REQUESTS")
                .unwrap_or(self.concurrent_requests),
            request_delay_ms: parsed(&lookup, "REQUEST_DELAY_MS")
                .unwrap_or(self.request_delay_ms),
            request_timeout_secs: parsed(&lookup, "REQUEST_TIMEOUT_SECS")
                .unwrap_or(self.request_timeout_secs),
            max_retries: parsed(&lookup, "MAX_RETRIES").unwrap_or(self.max_retries),
        }
    }

    /// 校验配置
    pub fn validate(&self) -> AppResult<()> {
        if self.batch_size == 0 {
            return Err(HarvestError::Config("batch_size 必须大于 0".to_string()));
        }
        if self.total_pages_limit == 0 {
            return Err(HarvestError::Config("total_pages_limit 必须大于 0".to_string()));
        }
        if self.soft_ban_cooldown_min_secs > self.soft_ban_cooldown_max_secs {
            return Err(HarvestError::Config(format!(
                "软封禁冷却窗口无效: {} > {}",
                self.soft_ban_cooldown_min_secs, self.soft_ban_cooldown_max_secs
            )));
        }
        if self.concurrent_requests == 0 {
            return Err(HarvestError::Config("concurrent_requests 必须大于 0".to_string()));
        }
        Ok(())
    }

    pub fn recovery_delay(&self) -> Duration {
        Duration::from_secs(self.recovery_delay_secs)
    }

    pub fn pause_between_batches(&self) -> Duration {
        Duration::from_secs(self.pause_minutes.saturating_mul(60))
    }
}

/// 读取并解析一个覆盖值，缺失或无法解析时返回 None
fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_reference_values() {
        let config = Config::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.total_pages_limit, 8000);
        assert_eq!(config.hard_ban_cooldown_secs, 120);
        assert_eq!(config.soft_ban_cooldown_min_secs, 120);
        assert_eq!(config.soft_ban_cooldown_max_secs, 240);
        assert_eq!(config.recovery_delay(), Duration::from_secs(10));
        assert_eq!(config.pause_minutes, 0);
        assert_eq!(config.max_batches, 8800);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides_only_given_keys() {
        let config = Config::from_toml_str(
            r#"
            batch_size = 10
            total_pages_limit = 25
            checkpoint_path = "state/cp.txt"
            worker_program = "python3"
            worker_args = ["spider.py"]
            "#,
        )
        .unwrap();

        assert_eq!(config.batch_size, 10);
        assert_eq!(config.total_pages_limit, 25);
        assert_eq!(config.checkpoint_path, PathBuf::from("state/cp.txt"));
        assert_eq!(config.worker_program.as_deref(), Some("python3"));
        assert_eq!(config.worker_args, vec!["spider.py".to_string()]);
        assert_eq!(config.hard_ban_cooldown_secs, 120);
    }

    #[test]
    fn test_env_overrides_win_and_bad_values_are_ignored() {
        let env: HashMap<&str, &str> = [
            ("PAUSE_MINUTES", "3"),
            ("MAX_BATCHES", "not-a-number"),
            ("BATCH_SIZE", " 50 "),
            ("CONCURRENT_REQUESTS", "16"),
            ("HARD_BAN_COOLDOWN_SECS", "-1"),
        ]
        .into_iter()
        .collect();

        let config =
            Config::default().with_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.pause_minutes, 3);
        assert_eq!(config.pause_between_batches(), Duration::from_secs(180));
        assert_eq!(config.max_batches, 8800);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.concurrent_requests, 16);
        assert_eq!(config.hard_ban_cooldown_secs, 120);
    }

    #[test]
    fn test_huge_pause_saturates() {
        let config = Config {
            pause_minutes: u64::MAX,
            ..Default::default()
        };
        assert_eq!(config.pause_between_batches(), Duration::from_secs(u64::MAX));

        let env: HashMap<&str, &str> = [("PAUSE_MINUTES", "18446744073709551615")]
            .into_iter()
            .collect();
        let config =
            Config::default().with_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.pause_minutes, u64::MAX);
        assert_eq!(config.pause_between_batches(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_validate_rejects_inverted_window() {
        let config = Config {
            soft_ban_cooldown_min_secs: 300,
            soft_ban_cooldown_max_secs: 200,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
