//! # Listing Harvester
//!
//! 一个可断点续传的分批列表抓取器
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部资源，只暴露能力
//! - `CheckpointStore` - 断点的原子读写
//! - `ChildCommand` - 启动子进程并读取结构化结果
//! - `PageClient` - 带重试和限流识别的页面抓取
//! - `Shutdown` - Ctrl-C 转换成的共享中断信号
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `listing_parser` - 列表页链接、广告数据、电话号码解析
//! - `RecordWriter` - 写出批次表格
//! - `CooldownPolicy` - 封禁后的冷却时长
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个页码区间"的完整抓取流程
//! - `PageCtx` - 列表页上下文（页码 + 地址）
//! - `FetchWorker` - 列表页 → 广告页 → 电话 → 写出
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_manager` - 一次处理一个批次，管理断点和冷却
//! - `orchestrator/continuous_loop` - 反复调用批次管理器直到完成
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppResult, HarvestError};
pub use infrastructure::{CheckpointStore, ChildCommand, PageClient, PageFetcher, Shutdown};
pub use models::{BatchRange, ListingRecord, ProcessOutcome};
pub use orchestrator::{
    BatchManager, ContinuousLoop, LoopExit, LoopSummary, ManagerLauncher, ProcessLauncher,
    WorkerLauncher,
};
pub use workflow::{FetchWorker, PageCtx, WorkerReport};
