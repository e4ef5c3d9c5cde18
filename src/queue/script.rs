//! # 作业脚本生成
//!
//! 作业脚本进入计算目录，在计算期间保留 `running` 标记，
//! 然后执行配置的 `run_command`（默认 `jasp exec`）。

use crate::config::JaspRc;
use std::path::Path;

/// 计算进行中标记
pub const RUNNING_FILE: &str = "running";

/// 生成作业脚本内容
pub fn render_job_script(rc: &JaspRc, workdir: &Path) -> String {
    let module_load = rc
        .module
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .map(|m| format!("module load {}\n", m))
        .unwrap_or_default();

    format!(
        r#"#!/bin/{shell}
{module_load}cd "{workdir}"
touch {running}
{run}
status=$?
rm -f {running}
exit $status
"#,
        shell = rc.queue.shell,
        module_load = module_load,
        workdir = workdir.display(),
        running = RUNNING_FILE,
        run = rc.run_command,
    )
}
