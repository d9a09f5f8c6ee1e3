use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;

use listing_harvester::models::outcome::{EXIT_INTERNAL_ERROR, EXIT_USAGE};
use listing_harvester::utils::logging;
use listing_harvester::{
    BatchManager, BatchRange, Config, ContinuousLoop, FetchWorker, ProcessLauncher,
    ProcessOutcome, Shutdown,
};

#[derive(Parser)]
#[command(name = "listing-harvester")]
#[command(about = "可断点续传的分批列表抓取器")]
struct Cli {
    /// TOML 配置文件，会原样传给子进程
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 持续运行，反复调用批次管理器直到全部完成
    Run,

    /// 处理一个批次（由 run 调用）
    Batch,

    /// 抓取一个页码区间并写出表格（由 batch 调用）
    Fetch {
        start_page: u32,
        end_page: u32,
        output_path: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 初始化日志
    logging::init();

    let shutdown = Shutdown::install_ctrl_c();
    let code = execute(cli, shutdown).await;
    std::process::exit(code);
}

async fn execute(cli: Cli, shutdown: Shutdown) -> i32 {
    let config_path = cli.config;
    match cli.command {
        Commands::Run => match run_loop(config_path, shutdown).await {
            Ok(code) => code,
            Err(e) => {
                error!("❌ 持续运行失败: {:#}", e);
                EXIT_INTERNAL_ERROR
            }
        },
        Commands::Batch => report(run_batch(config_path, shutdown).await),
        Commands::Fetch {
            start_page,
            end_page,
            output_path,
        } => {
            if start_page < 1 || end_page < start_page {
                error!(
                    "❌ 无效的页码区间: {}-{} (要求 1 <= start_page <= end_page)",
                    start_page, end_page
                );
                return EXIT_USAGE;
            }
            let range = BatchRange {
                start: start_page,
                end: end_page,
            };
            report(run_fetch(config_path.as_deref(), range, &output_path, shutdown).await)
        }
    }
}

/// 打印结构化结果行并返回退出码
fn report(result: Result<ProcessOutcome>) -> i32 {
    let outcome = result.unwrap_or_else(|e| {
        error!("❌ {:#}", e);
        ProcessOutcome::Crashed(EXIT_INTERNAL_ERROR)
    });
    println!("{}", outcome.to_line());
    outcome.exit_code()
}

async fn run_loop(config_path: Option<PathBuf>, shutdown: Shutdown) -> Result<i32> {
    let config = Config::load(config_path.as_deref())?;
    let launcher = ProcessLauncher::new(&config, config_path, shutdown.clone());
    let summary = ContinuousLoop::new(&config, launcher, shutdown).run().await;
    Ok(summary.exit.exit_code())
}

async fn run_batch(config_path: Option<PathBuf>, shutdown: Shutdown) -> Result<ProcessOutcome> {
    let config = Config::load(config_path.as_deref())?;
    let launcher = ProcessLauncher::new(&config, config_path, shutdown.clone());
    let mut manager = BatchManager::new(config, launcher, shutdown);
    manager.run_once().await.context("批次处理失败")
}

async fn run_fetch(
    config_path: Option<&Path>,
    range: BatchRange,
    output: &Path,
    shutdown: Shutdown,
) -> Result<ProcessOutcome> {
    let config = Config::load(config_path)?;
    let worker = FetchWorker::new(&config).context("无法创建 HTTP 客户端")?;
    let report = worker
        .run(range, output, &shutdown)
        .await
        .with_context(|| format!("区间 {} 抓取失败", range))?;
    Ok(report.outcome())
}
