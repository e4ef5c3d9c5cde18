//! # 批量处理模块
//!
//! 对多个计算目录统一执行命令。
//!
//! ## 功能
//! - 收集计算目录列表
//! - 顺序或并行处理
//! - 进度反馈与统计
//!
//! ## 依赖关系
//! - 被各命令模块使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::CalcCollector;
pub use runner::{BatchResult, BatchRunner, ProcessResult};
