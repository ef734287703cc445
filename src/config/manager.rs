//! 简化的配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::constants;
use crate::error::{CacheError, CacheResult};

/// 翻译缓存配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheStoreConfig {
    // 存储配置
    pub db_path: String,
    pub in_memory: bool,

    // 内存读穿层
    pub memory_cache_size: usize,

    // 旧版存储迁移
    pub migrate_legacy: bool,
    pub extension_storage_path: Option<String>,
    pub local_storage_path: Option<String>,
}

impl Default for CacheStoreConfig {
    fn default() -> Self {
        Self {
            db_path: constants::DEFAULT_DB_PATH.to_string(),
            in_memory: false,
            memory_cache_size: constants::DEFAULT_MEMORY_CACHE_SIZE,
            migrate_legacy: true,
            extension_storage_path: None,
            local_storage_path: None,
        }
    }
}

impl CacheStoreConfig {
    /// 使用指定数据库文件的配置
    pub fn with_db_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            db_path: path.as_ref().to_string_lossy().into_owned(),
            ..Self::default()
        }
    }

    /// 仅在内存中保存数据的配置
    pub fn in_memory() -> Self {
        Self {
            in_memory: true,
            migrate_legacy: false,
            ..Self::default()
        }
    }

    /// 验证配置
    pub fn validate(&self) -> CacheResult<()> {
        if self.memory_cache_size == 0 {
            return Err(CacheError::ConfigError("内存缓存大小不能为0".to_string()));
        }

        if !self.in_memory && self.db_path.trim().is_empty() {
            return Err(CacheError::ConfigError("数据库路径不能为空".to_string()));
        }

        Ok(())
    }

    /// 展开 `~` 后的数据库路径
    pub fn resolved_db_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.db_path).as_ref())
    }

    /// 展开 `~` 后的旧版存储路径
    pub fn resolved_legacy_paths(&self) -> (Option<PathBuf>, Option<PathBuf>) {
        let expand = |path: &Option<String>| {
            path.as_ref()
                .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
        };
        (
            expand(&self.extension_storage_path),
            expand(&self.local_storage_path),
        )
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{cache, EnvVar};

        if let Ok(db_path) = cache::DbPath::get() {
            self.db_path = db_path;
            tracing::info!("环境变量覆盖数据库路径: {}", self.db_path);
        }

        if let Ok(in_memory) = cache::InMemory::get() {
            if in_memory {
                self.in_memory = true;
            }
        }

        if let Ok(size) = cache::MemorySize::get() {
            if std::env::var(cache::MemorySize::NAME).is_ok() {
                self.memory_cache_size = size;
            }
        }

        if std::env::var(cache::MigrateLegacy::NAME).is_ok() {
            if let Ok(migrate) = cache::MigrateLegacy::get() {
                self.migrate_legacy = migrate;
            }
        }

        if let Ok(path) = cache::ExtensionStoragePath::get() {
            self.extension_storage_path = Some(path);
        }

        if let Ok(path) = cache::LocalStoragePath::get() {
            self.local_storage_path = Some(path);
        }
    }
}

/// 简化的配置管理器
pub struct ConfigManager {
    config: CacheStoreConfig,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new() -> CacheResult<Self> {
        let mut config = Self::load_config()?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config })
    }

    /// 使用给定配置创建（仍然会验证）
    pub fn from_config(config: CacheStoreConfig) -> CacheResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 获取配置
    pub fn get_config(&self) -> &CacheStoreConfig {
        &self.config
    }

    /// 取出配置
    pub fn into_config(self) -> CacheStoreConfig {
        self.config
    }

    /// 从文件加载配置
    fn load_config() -> CacheResult<CacheStoreConfig> {
        // 首先尝试加载 .env 文件
        Self::load_dotenv();

        // 查找配置文件
        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(&expanded_path);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok(CacheStoreConfig::default())
    }

    /// 从指定文件加载配置
    pub fn load_from_file(path: &str) -> CacheResult<CacheStoreConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CacheError::ConfigError(format!("读取配置文件失败: {}", e)))?;

        // 尝试TOML格式
        if path.ends_with(".toml") {
            toml::from_str(&content)
                .map_err(|e| CacheError::ConfigError(format!("解析TOML配置失败: {}", e)))
        } else {
            // 尝试JSON格式
            serde_json::from_str(&content)
                .map_err(|e| CacheError::ConfigError(format!("解析JSON配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env.development", ".env.production", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> CacheResult<()> {
        let config = CacheStoreConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| CacheError::ConfigError(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| CacheError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CacheStoreConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.migrate_legacy);
        assert!(!config.in_memory);
    }

    #[test]
    fn test_validate_rejects_zero_memory() {
        let config = CacheStoreConfig {
            memory_cache_size: 0,
            ..CacheStoreConfig::in_memory()
        };
        assert!(matches!(config.validate(), Err(CacheError::ConfigError(_))));
    }

    #[test]
    fn test_validate_rejects_empty_path_on_disk() {
        let config = CacheStoreConfig::with_db_path("  ");
        assert!(config.validate().is_err());

        let config = CacheStoreConfig {
            db_path: String::new(),
            ..CacheStoreConfig::in_memory()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_generate_and_load_example_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.toml");
        let path = path.to_str().unwrap();

        ConfigManager::generate_example_config(path).unwrap();
        let loaded = ConfigManager::load_from_file(path).unwrap();
        assert_eq!(loaded, CacheStoreConfig::default());
    }

    #[test]
    fn test_load_partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, r#"{ "memory_cache_size": 42, "in_memory": true }"#).unwrap();

        let loaded = ConfigManager::load_from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.memory_cache_size, 42);
        assert!(loaded.in_memory);
        assert_eq!(loaded.db_path, constants::DEFAULT_DB_PATH);
    }
}
