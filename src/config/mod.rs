//! 缓存配置管理模块
//!
//! 提供简化的配置管理，支持环境变量、配置文件和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{CacheStoreConfig, ConfigManager};

/// 配置常量
pub mod constants {
    // 存储结构
    pub const SCHEMA_VERSION: u64 = 3;
    pub const SCHEMA_VERSION_KEY: &str = "schema_version";
    pub const TRANSLATION_TABLE: &str = "translations";
    pub const REVERSE_TRANSLATION_TABLE: &str = "reverseTranslations";
    pub const EMOJI_TABLE: &str = "customEmojis";
    pub const META_TABLE: &str = "meta";
    pub const EMOJI_RECORD_ID: &str = "custom_emojis";

    // 默认值
    pub const DEFAULT_DB_PATH: &str = "~/.local/share/linguana/translation-cache.redb";
    pub const DEFAULT_MEMORY_CACHE_SIZE: usize = 5000;
    pub const DEFAULT_MESSAGE_TYPE: &str = "manual";
    pub const MIGRATED_MESSAGE_TYPE: &str = "migrated";
    pub const IMPORTED_MESSAGE_TYPE: &str = "imported";

    // 旧版平面存储中的键
    pub const LEGACY_CACHE_KEY: &str = "maloum_translations_cache";
    pub const LEGACY_REVERSE_CACHE_KEY: &str = "maloum_reverse_translations_cache";

    // 导出元数据
    pub const EXPORT_VERSION: &str = "3.0";
    pub const STORAGE_TYPE_LABEL: &str = "redb";
    pub const MEMORY_STORAGE_TYPE_LABEL: &str = "redb (in-memory)";
    pub const DEGRADED_STORAGE_TYPE_LABEL: &str = "In-Memory read-through layer (degraded)";
    pub const SUPPORTED_PAIRS_LABEL: &str = "EN↔DE Only";

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "linguana-cache.toml",
        ".linguana-cache.toml",
        "~/.config/linguana/cache.toml",
        "/etc/linguana/cache.toml",
    ];
}

/// 加载配置，失败时退回默认配置
pub fn load_cache_config() -> CacheStoreConfig {
    match ConfigManager::new() {
        Ok(manager) => manager.get_config().clone(),
        Err(e) => {
            tracing::warn!("创建配置管理器失败，使用默认配置: {}", e);
            CacheStoreConfig::default()
        }
    }
}
