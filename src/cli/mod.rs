//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `run`: 需要时运行或提交计算
//! - `status`: 显示目录生命周期状态
//! - `exec`: 在队列作业内运行 VASP
//! - `sum`: 计算摘要
//! - `collect`: 汇总完成的计算到 CSV
//! - `clone`: 复制计算目录
//! - `strip`: 删除大文件
//! - `memory`: 估计所需内存
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: run, status, exec, summary, collect, clone, strip, memory

pub mod clone;
pub mod collect;
pub mod exec;
pub mod memory;
pub mod run;
pub mod status;
pub mod strip;
pub mod summary;

use crate::config::{RunMode, Scheduler};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// jasp - 队列感知的 VASP 计算目录管理
#[derive(Parser)]
#[command(name = "jasp")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Queue-aware VASP calculation directory manager", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    // ─────────────────────────────────────────────────────────────
    // Global options
    // ─────────────────────────────────────────────────────────────
    /// Configuration file (default: $JASPRC, ./.jasprc.yaml, ~/.jasprc.yaml)
    #[arg(long, global = true)]
    pub rc: Option<PathBuf>,

    /// Override the run mode from the configuration
    #[arg(long, global = true, value_enum, env = "JASP_MODE")]
    pub mode: Option<RunMode>,

    /// Override the batch scheduler from the configuration
    #[arg(long, global = true, value_enum, env = "JASP_SCHEDULER")]
    pub scheduler: Option<Scheduler>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log every classification decision
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,
}

impl Cli {
    /// 日志详细程度
    pub fn verbosity(&self) -> u8 {
        if self.debug {
            self.verbose.max(2)
        } else {
            self.verbose
        }
    }
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Run or submit calculations that need (re)computing
    Run(run::RunArgs),

    /// Show the lifecycle state of calculation directories
    Status(status::StatusArgs),

    /// Run VASP in the current directory (used inside queue jobs)
    Exec(exec::ExecArgs),

    /// Print a summary of a calculation
    Sum(summary::SumArgs),

    /// Collect finished calculations into a CSV file
    Collect(collect::CollectArgs),

    /// Copy a calculation into a new directory
    Clone(clone::CloneArgs),

    /// Remove large, uncritical files from a calculation
    Strip(strip::StripArgs),

    /// Estimate the memory a calculation needs
    Memory(memory::MemoryArgs),
}
