//! # 统一错误处理模块
//!
//! 定义 jasp 的所有错误类型，使用 `thiserror` 派生。
//!
//! 排队 / 运行中 / 已提交 不是错误，由 `calculator::RunOutcome` 表达；
//! 这里只保留真正需要调用方处理的失败。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use std::path::Path;
use thiserror::Error;

/// jasp 统一错误类型
#[derive(Error, Debug)]
pub enum JaspError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    // ─────────────────────────────────────────────────────────────
    // 参数与配置错误
    // ─────────────────────────────────────────────────────────────
    #[error("Unknown VASP parameter: {0}")]
    UnknownParameter(String),

    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // 目录生命周期错误
    // ─────────────────────────────────────────────────────────────
    #[error("I do not recognize the state of this directory: {path}")]
    UnrecognizedDirectoryState { path: String },

    #[error("Calculation in {path} did not converge. Set restart_unconverged = true to restart")]
    NotConverged { path: String },

    #[error("Run mode is 'none' but {path} needs a calculation")]
    RunDisabled { path: String },

    // ─────────────────────────────────────────────────────────────
    // 作业队列错误
    // ─────────────────────────────────────────────────────────────
    #[error("Job submission failed: {command}\n{message}")]
    SubmissionError { command: String, message: String },

    #[error("Queue command failed: {command}\n{message}")]
    QueueCommandFailed { command: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // 赝势与探针错误
    // ─────────────────────────────────────────────────────────────
    #[error("No pseudopotential for {symbol}: looked for {name}")]
    MissingPseudopotential { symbol: String, name: String },

    #[error("Memory estimate timed out after {seconds} s")]
    MemoryEstimateTimeout { seconds: u64 },

    #[error(
        "The number of bands was changed by VASP ({requested:?} -> {used}). \
         INCAR has been updated; change NBANDS in your script to {used} to proceed"
    )]
    BandsChanged { requested: Option<i64>, used: i64 },

    // ─────────────────────────────────────────────────────────────
    // 外部命令错误
    // ─────────────────────────────────────────────────────────────
    #[error("External command '{command}' not found in PATH")]
    CommandNotFound { command: String },

    #[error("External command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    // ─────────────────────────────────────────────────────────────
    // 序列化错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml_ng::Error),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

impl JaspError {
    /// 读取文件失败的便捷构造
    pub fn read(path: &Path, source: std::io::Error) -> Self {
        JaspError::FileReadError {
            path: path.display().to_string(),
            source,
        }
    }

    /// 写入文件失败的便捷构造
    pub fn write(path: &Path, source: std::io::Error) -> Self {
        JaspError::FileWriteError {
            path: path.display().to_string(),
            source,
        }
    }

    /// 解析失败的便捷构造
    pub fn parse(format: &str, path: &Path, reason: impl Into<String>) -> Self {
        JaspError::ParseError {
            format: format.to_string(),
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, JaspError>;
