//! HTTP 客户端 - 基础设施层
//!
//! 持有连接池，只暴露"取回一个页面"的能力：随机 UA、请求间隔、可重试状态码重试、
//! 遇到 429 立即返回限流错误。

use std::future::Future;
use std::time::Duration;

use rand::seq::SliceRandom;
use reqwest::header::USER_AGENT;
use reqwest::StatusCode;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppResult, HarvestError};

/// 需要重试的状态码
const RETRY_STATUS_CODES: [u16; 5] = [403, 500, 502, 503, 504];

const USER_AGENTS: [&str; 6] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

/// 取回页面正文的能力
pub trait PageFetcher: Send + Sync + 'static {
    fn get_text(&self, url: &str) -> impl Future<Output = AppResult<String>> + Send;
}

/// 页面抓取客户端
#[derive(Clone)]
pub struct PageClient {
    client: reqwest::Client,
    request_delay: Duration,
    max_retries: u32,
}

impl PageClient {
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| HarvestError::request_failed("<client>", e))?;

        Ok(Self {
            client,
            request_delay: Duration::from_millis(config.request_delay_ms),
            max_retries: config.max_retries,
        })
    }
}

impl PageFetcher for PageClient {
    /// 取回页面正文
    async fn get_text(&self, url: &str) -> AppResult<String> {
        let mut attempt = 0;
        loop {
            if !self.request_delay.is_zero() {
                sleep(self.request_delay).await;
            }

            let result = self
                .client
                .get(url)
                .header(USER_AGENT, random_user_agent())
                .send()
                .await;

            let retry_reason = match result {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        warn!("🚫 429 Too Many Requests: {}", url);
                        return Err(HarvestError::RateLimited {
                            url: url.to_string(),
                        });
                    }
                    if status.is_success() {
                        return response
                            .text()
                            .await
                            .map_err(|e| HarvestError::request_failed(url, e));
                    }
                    if !RETRY_STATUS_CODES.contains(&status.as_u16()) || attempt >= self.max_retries
                    {
                        return Err(HarvestError::BadStatus {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }
                    format!("状态码 {}", status.as_u16())
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(HarvestError::request_failed(url, e));
                    }
                    e.to_string()
                }
            };

            attempt += 1;
            debug!(
                "重试 {} ({}/{}): {}",
                url, attempt, self.max_retries, retry_reason
            );
        }
    }
}

fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}
