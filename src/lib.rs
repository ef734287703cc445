//! # Linguana Cache
//!
//! 仅支持英语与德语互译（EN↔DE）的持久化翻译缓存。
//!
//! ## 模块组织
//!
//! - `language` - 语言对校验与归一化
//! - `keys` - 文本归一化、缓存键与反向哈希
//! - `storage` - redb 存储、内存读穿层、迁移、统计与导入导出
//! - `config` - 配置文件与环境变量
//! - `error` - 统一错误类型
//! - `logging` - 日志初始化

pub mod config;
pub mod env;
pub mod error;
pub mod keys;
pub mod language;
pub mod logging;
pub mod storage;

// Re-export commonly used items for convenience
pub use config::{load_cache_config, CacheStoreConfig, ConfigManager};
pub use error::{CacheError, CacheResult};
pub use keys::{cache_key, normalize_text, possible_keys, text_hash};
pub use language::{is_valid_pair, normalize_language_pair, Language, LanguagePair};
pub use storage::{
    CacheCheck, CacheStats, ImportReport, MatchType, MigrationReport, ReverseTranslationRecord,
    SearchOptions, SearchResult, TransferFormat, TranslationCacheStore, TranslationRecord,
};
