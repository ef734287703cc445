//! 翻译缓存统一错误处理
//!
//! 内部操作返回 `CacheResult`，对外接口在组件边界吸收错误并记录日志，
//! 转换为 `false`、空集合或失败结果对象。

use std::fmt;

use thiserror::Error;

/// 翻译缓存错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// 初始化未完成或失败
    #[error("存储尚未就绪: {0}")]
    StoreNotReady(String),

    /// 语言对不在支持范围内
    #[error("无效的语言对: {source_language} -> {target_language}")]
    InvalidLanguagePair {
        source_language: String,
        target_language: String,
    },

    /// 存储事务提交失败
    #[error("事务已中止: {0}")]
    TransactionAborted(String),

    /// 导入记录缺少必需字段
    #[error("导入记录格式错误: {0}")]
    MalformedImportRecord(String),

    /// 底层存储错误
    #[error("存储错误: {0}")]
    StorageError(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 旧版数据迁移错误
    #[error("迁移错误: {0}")]
    MigrationError(String),

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// IO错误
    #[error("IO错误: {0}")]
    IoError(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl CacheError {
    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CacheError::StoreNotReady(_) => ErrorSeverity::Critical,
            CacheError::InvalidLanguagePair { .. } => ErrorSeverity::Info,
            CacheError::TransactionAborted(_) => ErrorSeverity::Error,
            CacheError::MalformedImportRecord(_) => ErrorSeverity::Info,
            CacheError::StorageError(_) => ErrorSeverity::Error,
            CacheError::SerializationError(_) => ErrorSeverity::Error,
            CacheError::ConfigError(_) => ErrorSeverity::Critical,
            CacheError::MigrationError(_) => ErrorSeverity::Warning,
            CacheError::InvalidInput(_) => ErrorSeverity::Info,
            CacheError::IoError(_) => ErrorSeverity::Warning,
            CacheError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 检查错误是否只影响单条记录（批量操作可以继续）
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            CacheError::InvalidLanguagePair { .. }
                | CacheError::MalformedImportRecord(_)
                | CacheError::InvalidInput(_)
        )
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(self, context: T) -> Self {
        let new_msg = |msg: String| format!("{} (上下文: {})", msg, context);

        match self {
            CacheError::StoreNotReady(msg) => CacheError::StoreNotReady(new_msg(msg)),
            CacheError::TransactionAborted(msg) => CacheError::TransactionAborted(new_msg(msg)),
            CacheError::MalformedImportRecord(msg) => {
                CacheError::MalformedImportRecord(new_msg(msg))
            }
            CacheError::StorageError(msg) => CacheError::StorageError(new_msg(msg)),
            CacheError::SerializationError(msg) => CacheError::SerializationError(new_msg(msg)),
            CacheError::ConfigError(msg) => CacheError::ConfigError(new_msg(msg)),
            CacheError::MigrationError(msg) => CacheError::MigrationError(new_msg(msg)),
            CacheError::InvalidInput(msg) => CacheError::InvalidInput(new_msg(msg)),
            CacheError::IoError(msg) => CacheError::IoError(new_msg(msg)),
            CacheError::InternalError(msg) => CacheError::InternalError(new_msg(msg)),
            pair @ CacheError::InvalidLanguagePair { .. } => pair,
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl From<redb::DatabaseError> for CacheError {
    fn from(error: redb::DatabaseError) -> Self {
        CacheError::StorageError(format!("数据库打开失败: {}", error))
    }
}

impl From<redb::TransactionError> for CacheError {
    fn from(error: redb::TransactionError) -> Self {
        CacheError::StorageError(format!("事务创建失败: {}", error))
    }
}

impl From<redb::TableError> for CacheError {
    fn from(error: redb::TableError) -> Self {
        CacheError::StorageError(format!("表访问失败: {}", error))
    }
}

impl From<redb::StorageError> for CacheError {
    fn from(error: redb::StorageError) -> Self {
        CacheError::StorageError(error.to_string())
    }
}

impl From<redb::CommitError> for CacheError {
    fn from(error: redb::CommitError) -> Self {
        CacheError::TransactionAborted(error.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(error: serde_json::Error) -> Self {
        CacheError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<std::io::Error> for CacheError {
    fn from(error: std::io::Error) -> Self {
        CacheError::IoError(error.to_string())
    }
}

impl From<toml::de::Error> for CacheError {
    fn from(error: toml::de::Error) -> Self {
        CacheError::ConfigError(format!("TOML解析错误: {}", error))
    }
}

impl From<toml::ser::Error> for CacheError {
    fn from(error: toml::ser::Error) -> Self {
        CacheError::ConfigError(format!("TOML序列化错误: {}", error))
    }
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(error: tokio::task::JoinError) -> Self {
        CacheError::InternalError(format!("存储任务异常终止: {}", error))
    }
}

/// 错误结果类型别名
pub type CacheResult<T> = Result<T, CacheError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误（错误在组件边界被吸收）
    pub fn report(operation: &str, error: &CacheError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("{}: {}", operation, error),
            ErrorSeverity::Warning => tracing::warn!("{}: {}", operation, error),
            ErrorSeverity::Error => tracing::error!("{}失败: {}", operation, error),
            ErrorSeverity::Critical => tracing::error!("{}严重错误: {}", operation, error),
        }
    }

    /// 记录错误并返回兜底值
    pub fn absorb<T>(operation: &str, result: CacheResult<T>, fallback: T) -> T {
        match result {
            Ok(value) => value,
            Err(error) => {
                report(operation, &error);
                fallback
            }
        }
    }

    /// 创建输入验证错误
    pub fn validation_error<T: fmt::Display>(msg: T) -> CacheError {
        CacheError::InvalidInput(msg.to_string())
    }
}
