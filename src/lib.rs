//! # jasp - 队列感知的 VASP 计算目录管理
//!
//! 每个计算目录的生命周期只记录在磁盘文件中。每次调用都重新推导状态，
//! 恢复计算器，判断是否需要重新计算，然后直接运行或提交到 PBS / SGE。
//!
//! ## 子命令
//! - `run`     - 需要时运行或提交计算
//! - `status`  - 显示目录状态
//! - `exec`    - 在队列作业内运行 VASP
//! - `sum`     - 计算摘要
//! - `collect` - 汇总完成的计算到 CSV
//! - `clone` / `strip` - 复制与清理计算目录
//! - `memory`  - 估计所需内存
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/          (命令行参数定义)
//!   ├── commands/     (命令执行逻辑)
//!   │     ├── calculator/ (状态机、工厂、运行调度)
//!   │     ├── queue/      (PBS / SGE 调度器)
//!   │     ├── parsers/    (VASP 文件读写)
//!   │     └── models/     (数据模型)
//!   ├── batch/        (批量处理)
//!   ├── config.rs     (jasprc 配置)
//!   ├── utils/        (输出、日志、进度条)
//!   └── error.rs      (错误处理)
//! ```

pub mod batch;
pub mod calculator;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod parsers;
pub mod queue;
pub mod utils;

pub use calculator::{CalcRequest, Calculator, DirectoryState, Hooks, Jasp, Quantity, RunOutcome};
pub use config::JaspRc;
pub use error::{JaspError, Result};
