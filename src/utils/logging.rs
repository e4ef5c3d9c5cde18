//! # 诊断日志
//!
//! 初始化 `tracing-subscriber`：默认只输出警告，`-v` 为 info，
//! `-vv` 或 `--debug` 为 debug（记录每次分类的分支）。
//! 设置了 `RUST_LOG` 时以其为准。

use tracing_subscriber::EnvFilter;

/// 详细程度对应的默认过滤级别
pub fn default_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// 初始化全局日志；重复调用时忽略
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("jasp={}", default_level(verbosity))));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        assert_eq!(default_level(0), "warn");
        assert_eq!(default_level(2), "debug");
        assert_eq!(default_level(9), "trace");
    }
}
