//! 冷却策略 - 业务能力层
//!
//! 只负责"某种失败之后应该等多久"，不负责真正睡眠

use std::time::Duration;

use rand::Rng;

use crate::config::Config;
use crate::models::ProcessOutcome;

/// 封禁后的冷却策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    hard_ban: Duration,
    soft_ban_min_secs: u64,
    soft_ban_max_secs: u64,
}

impl CooldownPolicy {
    pub fn new(hard_ban_secs: u64, soft_ban_min_secs: u64, soft_ban_max_secs: u64) -> Self {
        Self {
            hard_ban: Duration::from_secs(hard_ban_secs),
            soft_ban_min_secs: soft_ban_min_secs.min(soft_ban_max_secs),
            soft_ban_max_secs,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.hard_ban_cooldown_secs,
            config.soft_ban_cooldown_min_secs,
            config.soft_ban_cooldown_max_secs,
        )
    }

    /// 硬封禁：固定时长
    pub fn hard_ban(&self) -> Duration {
        self.hard_ban
    }

    /// 软封禁：窗口内的随机时长（含两端）
    pub fn soft_ban<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_secs(rng.gen_range(self.soft_ban_min_secs..=self.soft_ban_max_secs))
    }

    pub fn soft_ban_window(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.soft_ban_min_secs),
            Duration::from_secs(self.soft_ban_max_secs),
        )
    }

    /// 某个结果之后的冷却时长，不需要冷却时返回 None
    pub fn delay_for<R: Rng + ?Sized>(&self, outcome: ProcessOutcome, rng: &mut R) -> Option<Duration> {
        match outcome {
            ProcessOutcome::HardBan => Some(self.hard_ban()),
            ProcessOutcome::SoftBan => Some(self.soft_ban(rng)),
            _ => None,
        }
    }
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
