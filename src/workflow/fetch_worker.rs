//! 抓取流程 - 流程层
//!
//! 核心职责：定义"一个页码区间"的完整抓取流程
//!
//! 流程顺序：
//! 1. 并发抓取区间内每个列表页 → 提取广告链接
//! 2. 并发抓取每个广告详情页 → 构建记录 → 查询电话
//! 3. 至少有一条记录时写出表格文件
//!
//! 任何请求遇到 429 都会标记本批次被限流，并停止发出新的请求。

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{PageClient, PageFetcher, Shutdown};
use crate::models::{BatchRange, ListingRecord, ProcessOutcome};
use crate::services::listing_parser::{self, NO_PHONE};
use crate::services::RecordWriter;
use crate::utils::logging::truncate_text;
use crate::workflow::page_ctx::PageCtx;

/// 一次区间抓取的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub pages_visited: usize,
    pub empty_pages: usize,
    pub ads_found: usize,
    pub records: usize,
    pub failed_items: usize,
    pub rate_limited: bool,
    pub interrupted: bool,
    pub output_written: bool,
}

impl WorkerReport {
    /// 按优先级归类：中断 > 限流 > 无记录 > 成功
    pub fn outcome(&self) -> ProcessOutcome {
        if self.interrupted {
            ProcessOutcome::Interrupted
        } else if self.rate_limited {
            ProcessOutcome::HardBan
        } else if self.records == 0 {
            ProcessOutcome::SoftBan
        } else {
            ProcessOutcome::Success
        }
    }
}

/// 区间抓取流程
///
/// - 不关心断点，也不关心冷却
/// - 只依赖页面抓取能力（PageFetcher）和解析能力（listing_parser）
pub struct FetchWorker<F: PageFetcher = PageClient> {
    fetcher: Arc<F>,
    listing_url: String,
    ad_link_pattern: String,
    phone_endpoint: Option<String>,
    concurrent_requests: usize,
}

/// 单次运行共享的状态
struct HarvestRun<F> {
    fetcher: Arc<F>,
    ad_link_pattern: String,
    phone_endpoint: Option<String>,
    current_date: String,
    stop: CancellationToken,
    rate_limited: AtomicBool,
}

enum PageResult {
    Links(PageCtx, Vec<String>),
    Failed,
    Skipped,
}

enum AdvertResult {
    Record(Box<ListingRecord>),
    Missing,
    Failed,
    Skipped,
}

impl FetchWorker<PageClient> {
    pub fn new(config: &Config) -> AppResult<Self> {
        Ok(Self::with_fetcher(config, PageClient::new(config)?))
    }
}

impl<F: PageFetcher> FetchWorker<F> {
    pub fn with_fetcher(config: &Config, fetcher: F) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            listing_url: config.listing_url.clone(),
            ad_link_pattern: config.ad_link_pattern.clone(),
            phone_endpoint: config.phone_endpoint.clone(),
            concurrent_requests: config.concurrent_requests.max(1),
        }
    }

    /// 抓取整个区间并写出结果
    pub async fn run(
        &self,
        range: BatchRange,
        output: &Path,
        shutdown: &Shutdown,
    ) -> AppResult<WorkerReport> {
        log_worker_start(range, output, self.concurrent_requests);

        let run = Arc::new(HarvestRun {
            fetcher: Arc::clone(&self.fetcher),
            ad_link_pattern: self.ad_link_pattern.clone(),
            phone_endpoint: self.phone_endpoint.clone(),
            current_date: chrono::Local::now().format("%d/%m/%Y").to_string(),
            stop: shutdown.token().child_token(),
            rate_limited: AtomicBool::new(false),
        });
        let semaphore = Arc::new(Semaphore::new(self.concurrent_requests));
        let mut report = WorkerReport::default();

        // ========== 阶段 1: 列表页 ==========
        let page_handles = range
            .pages()
            .map(|page_number| {
                let page = PageCtx::new(&self.listing_url, page_number);
                let run = Arc::clone(&run);
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return PageResult::Skipped;
                    };
                    run.listing_page(page).await
                })
            })
            .collect::<Vec<_>>();

        let mut adverts = Vec::new();
        for joined in join_all(page_handles).await {
            match joined {
                Ok(PageResult::Links(page, links)) => {
                    report.pages_visited += 1;
                    if links.is_empty() {
                        report.empty_pages += 1;
                    }
                    report.ads_found += links.len();
                    adverts.extend(links.into_iter().map(|link| (page.page_number, link)));
                }
                Ok(PageResult::Failed) => report.failed_items += 1,
                Ok(PageResult::Skipped) => {}
                Err(e) => {
                    error!("列表页任务执行失败: {}", e);
                    report.failed_items += 1;
                }
            }
        }

        // ========== 阶段 2: 广告详情 ==========
        let advert_handles = adverts
            .into_iter()
            .map(|(page_number, link)| {
                let run = Arc::clone(&run);
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return AdvertResult::Skipped;
                    };
                    run.advert(page_number, link).await
                })
            })
            .collect::<Vec<_>>();

        let mut records = Vec::new();
        for joined in join_all(advert_handles).await {
            match joined {
                Ok(AdvertResult::Record(record)) => records.push(*record),
                Ok(AdvertResult::Missing) | Ok(AdvertResult::Failed) => report.failed_items += 1,
                Ok(AdvertResult::Skipped) => {}
                Err(e) => {
                    error!("广告任务执行失败: {}", e);
                    report.failed_items += 1;
                }
            }
        }

        report.records = records.len();
        report.rate_limited = run.rate_limited.load(Ordering::SeqCst);
        report.interrupted = shutdown.is_triggered();

        // ========== 阶段 3: 写出 ==========
        if !report.interrupted && !records.is_empty() {
            RecordWriter::new(output).write_all(&records)?;
            report.output_written = true;
        }

        log_worker_report(range, &report);
        Ok(report)
    }
}

impl<F: PageFetcher> HarvestRun<F> {
    /// 发出一个请求；已停止时返回 None，遇到 429 时停止后续请求
    async fn fetch(&self, url: &str) -> Option<AppResult<String>> {
        if self.stop.is_cancelled() {
            return None;
        }

        let result = tokio::select! {
            result = self.fetcher.get_text(url) => result,
            _ = self.stop.cancelled() => return None,
        };

        if let Err(e) = &result {
            if e.is_rate_limited() && !self.rate_limited.swap(true, Ordering::SeqCst) {
                warn!("🚫 本批次被限流，停止发出新的请求");
                self.stop.cancel();
            }
        }
        Some(result)
    }

    async fn listing_page(&self, page: PageCtx) -> PageResult {
        let html = match self.fetch(&page.url).await {
            None => return PageResult::Skipped,
            Some(Ok(html)) => html,
            Some(Err(e)) => {
                warn!("{} ❌ 列表页抓取失败: {}", page, e);
                return PageResult::Failed;
            }
        };

        match listing_parser::extract_ad_links(&html, &page.url, &self.ad_link_pattern) {
            Ok(links) => {
                if links.is_empty() {
                    warn!("{} ⚠️ 没有找到广告链接，可能被软封禁", page);
                } else {
                    debug!("{} 找到 {} 个广告", page, links.len());
                }
                PageResult::Links(page, links)
            }
            Err(e) => {
                warn!("{} ❌ 列表页解析失败: {}", page, e);
                PageResult::Failed
            }
        }
    }

    async fn advert(&self, page_number: u32, link: String) -> AdvertResult {
        let html = match self.fetch(&link).await {
            None => return AdvertResult::Skipped,
            Some(Ok(html)) => html,
            Some(Err(e)) => {
                warn!("❌ 广告页抓取失败 {}: {}", truncate_text(&link, 80), e);
                return AdvertResult::Failed;
            }
        };

        let advert = match listing_parser::extract_advert(&html) {
            Ok(Some(advert)) => advert,
            Ok(None) => {
                warn!("⚠️ 广告页没有数据脚本: {}", link);
                return AdvertResult::Missing;
            }
            Err(e) => {
                warn!("❌ 广告数据解析失败 {}: {}", link, e);
                return AdvertResult::Failed;
            }
        };

        let mut record =
            listing_parser::build_record(&advert, page_number, &link, &self.current_date);
        record.phone_number = self.phone_number(&record.ad_id).await;
        AdvertResult::Record(Box::new(record))
    }

    async fn phone_number(&self, ad_id: &str) -> String {
        let Some(endpoint) = self.phone_endpoint.as_deref() else {
            return NO_PHONE.to_string();
        };
        if ad_id.is_empty() {
            return NO_PHONE.to_string();
        }

        match self.fetch(&endpoint.replace("{ad_id}", ad_id)).await {
            Some(Ok(body)) => listing_parser::parse_phone(&body),
            Some(Err(e)) => {
                debug!("电话查询失败 {}: {}", ad_id, e);
                NO_PHONE.to_string()
            }
            None => NO_PHONE.to_string(),
        }
    }
}

// ========== 日志辅助函数 ==========

fn log_worker_start(range: BatchRange, output: &Path, concurrent: usize) {
    info!("{}", "=".repeat(60));
    info!("🕷️ 开始抓取页码区间 {}", range);
    info!("📄 共 {} 页，最大并发 {}", range.page_count(), concurrent);
    info!("💾 输出文件: {}", output.display());
    info!("{}", "=".repeat(60));
}

fn log_worker_report(range: BatchRange, report: &WorkerReport) {
    info!("\n{}", "─".repeat(60));
    info!("📊 区间 {} 抓取统计", range);
    info!(
        "列表页: {} (空页 {})，广告: {}",
        report.pages_visited, report.empty_pages, report.ads_found
    );
    info!("✅ 记录: {}", report.records);
    info!("❌ 失败: {}", report.failed_items);
    if report.rate_limited {
        warn!("🚫 本批次遇到 429 限流");
    }
    if report.interrupted {
        warn!("⛔ 抓取被中断，未写出文件");
    } else if !report.output_written {
        warn!("⚠️ 没有提取到任何记录，未写出文件");
    }
    info!("结果: {}", report.outcome());
    info!("{}", "─".repeat(60));
}
