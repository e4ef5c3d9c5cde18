//! # PBS / Torque 适配器
//!
//! - 提交：`qsub <options> -N name -l walltime=.. -l nodes=N:ppn=P -l mem=..`，脚本经标准输入传入
//! - 查询：先用 `qselect` 判断作业号是否属于当前用户的作业，再用 `qstat <id>` 读取状态码

use super::{
    check_query, check_submission, run_command, BatchQueue, JobHandle, JobSpec, QueueProbe,
    QueueStatus,
};
use crate::config::QueueSettings;
use crate::error::{JaspError, Result};
use tracing::debug;

/// PBS 调度器
pub struct PbsQueue {
    settings: QueueSettings,
}

impl PbsQueue {
    pub fn new(settings: QueueSettings) -> Self {
        PbsQueue { settings }
    }

    /// 构造 qsub 参数
    pub fn submit_args(&self, job_name: &str, mem: Option<&str>) -> Vec<String> {
        let s = &self.settings;
        let mut args: Vec<String> = s.options.split_whitespace().map(str::to_string).collect();
        args.extend([
            "-N".to_string(),
            job_name.to_string(),
            "-l".to_string(),
            format!("walltime={}", s.walltime),
            "-l".to_string(),
            format!("nodes={}:ppn={}", s.nodes, s.ppn),
            "-l".to_string(),
            format!("mem={}", mem.unwrap_or(&s.mem)),
        ]);
        args
    }
}

impl QueueProbe for PbsQueue {
    fn status(&self, job: &JobHandle) -> Result<QueueStatus> {
        let output = run_command("qselect", &[], None, None)?;
        let listed = check_query("qselect", &output)?;
        if !parse_qselect_output(&listed).contains(&job.id()) {
            debug!("{} not listed by qselect", job);
            return Ok(QueueStatus::NotQueued);
        }

        let output = run_command("qstat", &[job.id().to_string()], None, None)?;
        let text = check_query(&format!("qstat {}", job), &output)?;
        Ok(parse_qstat_state(&text).map_or(QueueStatus::Queued, status_from_code))
    }
}

impl BatchQueue for PbsQueue {
    fn submit(&self, job: &JobSpec) -> Result<JobHandle> {
        let command = &self.settings.command;
        let args = self.submit_args(&job.name, job.mem.as_deref());
        let output = run_command(command, &args, Some(&job.workdir), Some(&job.script))?;
        let stdout = check_submission(command, &output)?;
        parse_qsub_output(&stdout)
    }

    fn name(&self) -> &str {
        "PBS"
    }
}

/// 解析 qsub 输出中的作业号
///
/// - PBS Pro: "12345.pbs-server"
/// - Torque: "12345.server.domain.com"
/// - 也可能只返回数字
pub fn parse_qsub_output(output: &str) -> Result<JobHandle> {
    let trimmed = output.trim();
    let numeric_head = trimmed
        .split('.')
        .next()
        .map(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false);

    if numeric_head && !trimmed.contains(char::is_whitespace) {
        return Ok(JobHandle::new(trimmed));
    }

    Err(JaspError::SubmissionError {
        command: "qsub".to_string(),
        message: format!("Unexpected output format: {}", trimmed),
    })
}

/// qselect 每行一个作业号
pub fn parse_qselect_output(output: &str) -> Vec<&str> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

/// 从 qstat 简要输出读取状态码（第三行起第五列）
///
/// ```text
/// Job id            Name             User              Time Use S Queue
/// ----------------  ---------------- ----------------  -------- - -----
/// 12345.pbs-server  my_job           user              00:05:23 R batch
/// ```
pub fn parse_qstat_state(output: &str) -> Option<String> {
    output
        .lines()
        .skip(2)
        .map(|l| l.split_whitespace().collect::<Vec<_>>())
        .find(|parts| parts.len() >= 6)
        .map(|parts| parts[4].to_string())
}

/// PBS 状态码到队列状态
pub fn status_from_code(code: String) -> QueueStatus {
    match code.to_uppercase().as_str() {
        "R" | "E" | "B" => QueueStatus::Running,
        "C" | "F" | "X" => QueueStatus::Finished,
        _ => QueueStatus::Queued,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_qsub_output() {
        assert_eq!(parse_qsub_output("12345.pbs-server\n").unwrap().id(), "12345.pbs-server");
        assert_eq!(parse_qsub_output("987").unwrap().id(), "987");
        assert!(parse_qsub_output("qsub: illegal -l value").is_err());
        assert!(parse_qsub_output("").is_err());
    }

    #[test]
    fn test_parse_qstat_state() {
        let out = "\
Job id            Name             User              Time Use S Queue
----------------  ---------------- ----------------  -------- - -----
12345.server      Cu-relax         jane              00:05:23 C batch
";
        assert_eq!(parse_qstat_state(out).as_deref(), Some("C"));
        assert_eq!(parse_qstat_state("garbage"), None);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(status_from_code("Q".into()), QueueStatus::Queued);
        assert_eq!(status_from_code("H".into()), QueueStatus::Queued);
        assert_eq!(status_from_code("R".into()), QueueStatus::Running);
        assert_eq!(status_from_code("C".into()), QueueStatus::Finished);
    }

    #[test]
    fn test_submit_args() {
        let queue = PbsQueue::new(QueueSettings {
            nodes: 2,
            ppn: 8,
            ..Default::default()
        });
        let args = queue.submit_args("calcs/cu", None);
        assert_eq!(args[0], "-joe");
        assert!(args.contains(&"nodes=2:ppn=8".to_string()));
        assert!(args.contains(&"mem=2GB".to_string()));
        assert!(args.contains(&"walltime=168:00:00".to_string()));
        let n = args.iter().position(|a| a == "-N").unwrap();
        assert_eq!(args[n + 1], "calcs/cu");

        let args = queue.submit_args("calcs/cu", Some("12GB"));
        assert!(args.contains(&"mem=12GB".to_string()));
    }

    #[test]
    fn test_qselect_lines() {
        assert_eq!(parse_qselect_output("1.a\n\n 2.a \n"), vec!["1.a", "2.a"]);
    }
}
