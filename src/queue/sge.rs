//! # Sun Grid Engine 适配器
//!
//! - 提交：脚本写入计算目录的 `qscript`，`qsub <options> -N name [-q q] -pe pe nprocs qscript`
//! - 查询：`qstat` 列表中第一列为作业号，第五列为状态

use super::{
    check_query, check_submission, run_command, BatchQueue, JobHandle, JobSpec, QueueProbe,
    QueueStatus,
};
use crate::config::QueueSettings;
use crate::error::{JaspError, Result};
use std::fs;

pub const SCRIPT_FILE: &str = "qscript";

/// SGE 调度器
pub struct SgeQueue {
    settings: QueueSettings,
}

impl SgeQueue {
    pub fn new(settings: QueueSettings) -> Self {
        SgeQueue { settings }
    }

    /// 构造 qsub 参数；SGE 作业名不允许 '/'
    pub fn submit_args(&self, job_name: &str) -> Vec<String> {
        let s = &self.settings;
        let mut args: Vec<String> = s.options.split_whitespace().map(str::to_string).collect();
        args.push("-N".to_string());
        args.push(job_name.replace('/', "|"));
        if let Some(q) = &s.q {
            args.push("-q".to_string());
            args.push(q.clone());
        }
        args.extend([
            "-pe".to_string(),
            s.pe.clone(),
            s.nprocs.to_string(),
            SCRIPT_FILE.to_string(),
        ]);
        args
    }
}

impl QueueProbe for SgeQueue {
    fn status(&self, job: &JobHandle) -> Result<QueueStatus> {
        let output = run_command("qstat", &[], None, None)?;
        let listing = check_query("qstat", &output)?;
        Ok(parse_qstat_listing(&listing, job.id()))
    }
}

impl BatchQueue for SgeQueue {
    fn submit(&self, job: &JobSpec) -> Result<JobHandle> {
        let script_path = job.workdir.join(SCRIPT_FILE);
        fs::write(&script_path, &job.script).map_err(|e| JaspError::write(&script_path, e))?;

        let command = &self.settings.command;
        let args = self.submit_args(&job.name);
        let output = run_command(command, &args, Some(&job.workdir), None)?;
        let stdout = check_submission(command, &output)?;
        parse_qsub_output(&stdout)
    }

    fn name(&self) -> &str {
        "SGE"
    }
}

/// `Your job 12345 ("name") has been submitted` → 12345
pub fn parse_qsub_output(output: &str) -> Result<JobHandle> {
    output
        .split_whitespace()
        .nth(2)
        .filter(|id| id.chars().all(|c| c.is_ascii_digit()))
        .map(JobHandle::new)
        .ok_or_else(|| JaspError::SubmissionError {
            command: "qsub".to_string(),
            message: format!("Unexpected output format: {}", output.trim()),
        })
}

/// 在 qstat 列表中查找作业
///
/// ```text
/// job-ID  prior   name       user         state submit/start at     queue  slots
/// -----------------------------------------------------------------------------
///  12345 0.55500 calc       jane         r     05/01/2014 10:00:00 all.q@n1  16
/// ```
pub fn parse_qstat_listing(output: &str, job_id: &str) -> QueueStatus {
    output
        .lines()
        .skip(2)
        .map(|l| l.split_whitespace().collect::<Vec<_>>())
        .find(|parts| parts.first() == Some(&job_id))
        .map(|parts| match parts.get(4) {
            Some(state) if state.contains('r') || state.contains('t') => QueueStatus::Running,
            _ => QueueStatus::Queued,
        })
        .unwrap_or(QueueStatus::NotQueued)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
job-ID  prior   name       user         state submit/start at     queue          slots
-----------------------------------------------------------------------------------------
  12345 0.55500 calc       jane         r     05/01/2014 10:00:00 all.q@n1          16
  12346 0.00000 calc2      jane         qw    05/01/2014 10:01:00                   16
";

    #[test]
    fn test_parse_qsub_output() {
        let out = "Your job 12345 (\"calcs|cu\") has been submitted\n";
        assert_eq!(parse_qsub_output(out).unwrap().id(), "12345");
        assert!(parse_qsub_output("error: no suitable queues").is_err());
    }

    #[test]
    fn test_parse_qstat_listing() {
        assert_eq!(parse_qstat_listing(LISTING, "12345"), QueueStatus::Running);
        assert_eq!(parse_qstat_listing(LISTING, "12346"), QueueStatus::Queued);
        assert_eq!(parse_qstat_listing(LISTING, "99"), QueueStatus::NotQueued);
        assert_eq!(parse_qstat_listing("", "12345"), QueueStatus::NotQueued);
    }

    #[test]
    fn test_job_name_has_no_slash() {
        let queue = SgeQueue::new(QueueSettings {
            q: Some("all.q".to_string()),
            nprocs: 16,
            ..Default::default()
        });
        let args = queue.submit_args("calcs/cu/relax");
        assert!(args.contains(&"calcs|cu|relax".to_string()));
        assert!(args.contains(&"all.q".to_string()));
        assert_eq!(args.last().map(String::as_str), Some(SCRIPT_FILE));
    }
}
