//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批次调度和故障恢复，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `continuous_loop` - 持续运行循环
//! - 反复启动批次管理进程
//! - 成功后按配置暂停，失败后等待恢复时间再重试
//! - 全部完成、用户中断或达到上限时停止，输出统计
//!
//! ### `batch_manager` - 批次管理器
//! - 读取断点、规划页码区间
//! - 启动抓取进程并解释其结果
//! - 只在成功时推进断点，封禁时冷却
//!
//! ### `launcher` - 子进程启动器
//! - 把"调用下一层"抽象成 trait，默认实现为启动子进程
//!
//! ## 层次关系
//!
//! ```text
//! continuous_loop (run 子命令)
//!     ↓ 子进程
//! batch_manager (batch 子命令)
//!     ↓ 子进程
//! workflow::FetchWorker (fetch 子命令)
//!     ↓
//! services (能力层：parser / writer / cooldown)
//!     ↓
//! infrastructure (基础设施：checkpoint / http / child process)
//! ```
//!
//! ## 设计原则
//!
//! 1. **进程隔离**：每一层都在独立进程中运行，崩溃不会拖垮上层
//! 2. **串行调度**：同一时刻只有一个批次在运行
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure

pub mod batch_manager;
pub mod continuous_loop;
pub mod launcher;

// 重新导出主要类型
pub use batch_manager::BatchManager;
pub use continuous_loop::{ContinuousLoop, LoopExit, LoopSummary};
pub use launcher::{ManagerLauncher, ProcessLauncher, WorkerLauncher};
