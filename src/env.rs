//! 统一的环境变量管理
//!
//! 提供类型安全、可验证的环境变量访问，用于覆盖缓存配置。

use std::env;
use std::fmt;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 日志相关环境变量
pub mod logging {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "LINGUANA_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }
}

/// 缓存相关环境变量
pub mod cache {
    use super::*;

    /// 数据库文件路径
    pub struct DbPath;
    impl EnvVar<String> for DbPath {
        const NAME: &'static str = "LINGUANA_CACHE_DB_PATH";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Path of the translation cache database file";

        fn parse(value: &str) -> EnvResult<String> {
            parse_non_empty(value, Self::NAME)
        }
    }

    /// 使用内存后端
    pub struct InMemory;
    impl EnvVar<bool> for InMemory {
        const NAME: &'static str = "LINGUANA_CACHE_IN_MEMORY";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Keep the cache in memory only (nothing is persisted)";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 内存读穿层容量
    pub struct MemorySize;
    impl EnvVar<usize> for MemorySize {
        const NAME: &'static str = "LINGUANA_CACHE_MEMORY_SIZE";
        const DEFAULT: Option<usize> = Some(crate::config::constants::DEFAULT_MEMORY_CACHE_SIZE);
        const DESCRIPTION: &'static str = "Capacity of the in-memory read-through layer";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 1_000_000)
        }
    }

    /// 启动时迁移旧版存储
    pub struct MigrateLegacy;
    impl EnvVar<bool> for MigrateLegacy {
        const NAME: &'static str = "LINGUANA_CACHE_MIGRATE_LEGACY";
        const DEFAULT: Option<bool> = Some(true);
        const DESCRIPTION: &'static str = "Migrate legacy flat storage on first open";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 扩展同步存储导出文件
    pub struct ExtensionStoragePath;
    impl EnvVar<String> for ExtensionStoragePath {
        const NAME: &'static str = "LINGUANA_CACHE_EXTENSION_STORAGE";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Legacy extension storage file to migrate from";

        fn parse(value: &str) -> EnvResult<String> {
            parse_non_empty(value, Self::NAME)
        }
    }

    /// 页面本地存储导出文件
    pub struct LocalStoragePath;
    impl EnvVar<String> for LocalStoragePath {
        const NAME: &'static str = "LINGUANA_CACHE_LOCAL_STORAGE";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Legacy page-local storage file to migrate from";

        fn parse(value: &str) -> EnvResult<String> {
            parse_non_empty(value, Self::NAME)
        }
    }
}

fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let parsed = value.trim().parse::<usize>().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: format!("Invalid number '{}'", value),
    })?;

    if parsed < min || parsed > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} out of range [{}, {}]", parsed, min, max),
        });
    }

    Ok(parsed)
}

fn parse_non_empty(value: &str, var_name: &str) -> EnvResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(EnvError {
            variable: var_name.to_string(),
            message: "Value must not be empty".to_string(),
        })
    } else {
        Ok(trimmed.to_string())
    }
}

/// 列出所有支持的环境变量及其说明
pub fn describe_all() -> Vec<(&'static str, &'static str)> {
    use cache::*;
    use logging::*;

    vec![
        (LogLevel::NAME, LogLevel::DESCRIPTION),
        (DbPath::NAME, DbPath::DESCRIPTION),
        (InMemory::NAME, InMemory::DESCRIPTION),
        (MemorySize::NAME, MemorySize::DESCRIPTION),
        (MigrateLegacy::NAME, MigrateLegacy::DESCRIPTION),
        (ExtensionStoragePath::NAME, ExtensionStoragePath::DESCRIPTION),
        (LocalStoragePath::NAME, LocalStoragePath::DESCRIPTION),
    ]
}
