//! # 批量执行器
//!
//! 对计算目录列表执行处理函数并汇总结果。
//!
//! ## 功能
//! - 基于 rayon 的并行迭代（只读命令）
//! - `jobs = 1` 时按顺序执行（会切换工作目录的命令必须如此）
//! - 进度条显示
//! - 错误收集与汇总报告
//!
//! ## 依赖关系
//! - 被 `commands/run.rs`, `commands/status.rs`, `commands/collect.rs` 调用
//! - 使用 `utils/progress.rs` 创建进度条
//! - 使用 `rayon` 进行并行处理

use crate::utils::progress;

use rayon::prelude::*;
use std::path::PathBuf;
use tracing::warn;

/// 单个目录的处理结果
#[derive(Debug, Clone)]
pub enum ProcessResult {
    /// 完成（结果可用或已运行）
    Success(String),
    /// 作业在队列中或刚提交
    Pending(String),
    /// 跳过
    Skipped(String),
    /// 处理失败
    Failed(String, String), // (目录, 错误信息)
}

/// 批量处理结果统计
#[derive(Debug, Default)]
pub struct BatchResult {
    pub success: usize,
    pub pending: usize,
    pub skipped: usize,
    pub failed: usize,
    /// 失败详情
    pub failures: Vec<(String, String)>,
}

impl BatchResult {
    /// 合并处理结果
    pub fn merge(&mut self, result: ProcessResult) {
        match result {
            ProcessResult::Success(_) => self.success += 1,
            ProcessResult::Pending(_) => self.pending += 1,
            ProcessResult::Skipped(_) => self.skipped += 1,
            ProcessResult::Failed(path, err) => {
                self.failed += 1;
                self.failures.push((path, err));
            }
        }
    }

    /// 总处理数量
    pub fn total(&self) -> usize {
        self.success + self.pending + self.skipped + self.failed
    }
}

/// 批量执行器
pub struct BatchRunner {
    /// 并行作业数
    jobs: usize,
}

impl BatchRunner {
    /// 创建执行器；0 表示使用全部 CPU
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        Self { jobs }
    }

    /// 顺序执行器
    pub fn sequential() -> Self {
        Self { jobs: 1 }
    }

    /// 处理目录列表；结果按输入顺序返回
    pub fn run<F>(&self, dirs: &[PathBuf], processor: F) -> (BatchResult, Vec<ProcessResult>)
    where
        F: Fn(&PathBuf) -> ProcessResult + Sync + Send,
    {
        let pb = progress::create_progress_bar(dirs.len() as u64, "Processing");
        let step = |dir: &PathBuf| {
            let result = processor(dir);
            pb.inc(1);
            result
        };

        let results: Vec<ProcessResult> = if self.jobs <= 1 {
            dirs.iter().map(step).collect()
        } else {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .build()
            {
                Ok(pool) => pool.install(|| dirs.par_iter().map(step).collect()),
                Err(e) => {
                    warn!("Could not start thread pool ({}); running sequentially", e);
                    dirs.iter().map(step).collect()
                }
            }
        };

        pb.finish_and_clear();

        let mut summary = BatchResult::default();
        for result in &results {
            summary.merge(result.clone());
        }
        (summary, results)
    }
}
