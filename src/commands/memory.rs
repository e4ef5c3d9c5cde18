//! # memory 命令实现
//!
//! ## 依赖关系
//! - 使用 `cli/memory.rs` 定义的参数
//! - 使用 `calculator/memory.rs`

use crate::calculator::memory::mem_request;
use crate::calculator::{CalcRequest, Hooks, Jasp};
use crate::cli::memory::MemoryArgs;
use crate::config::JaspRc;
use crate::error::Result;
use crate::utils::{output, progress};

/// 执行 memory 命令
pub fn execute(args: MemoryArgs, mut rc: JaspRc) -> Result<()> {
    if let Some(timeout) = args.timeout {
        rc.memory_probe_timeout = timeout;
    }
    let queue = rc.queue.clone();
    let jasp = Jasp::from_rc(rc, Hooks::none())?;

    let spinner = progress::create_spinner("Estimating memory");
    let estimate = jasp.enter(&args.dir, CalcRequest::new(), |calc| calc.required_memory());
    spinner.finish_and_clear();
    let gb = estimate?;

    output::print_success(&format!("{:.3} GB per process", gb));
    output::print_info(&format!(
        "Job request for {} node(s) x {} ppn: mem={}",
        queue.nodes,
        queue.ppn,
        mem_request(&queue, gb)
    ));
    Ok(())
}
