//! 日志初始化

use tracing::Level;

use crate::env::{logging::LogLevel, EnvVar};

/// 根据 `LINGUANA_LOG_LEVEL` 初始化全局日志订阅器
///
/// 已经存在全局订阅器时不做任何事，可以重复调用。
pub fn init_tracing() {
    let level = match LogLevel::get() {
        Ok(level) => parse_level(&level),
        Err(e) => {
            eprintln!("{}，使用 info 级别", e);
            Level::INFO
        }
    };

    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

fn parse_level(level: &str) -> Level {
    level.parse::<Level>().unwrap_or(Level::INFO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("WARN"), Level::WARN);
        assert_eq!(parse_level("whatever"), Level::INFO);
    }

    #[test]
    fn test_init_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
