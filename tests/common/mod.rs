// 集成测试公共模块
//
// 提供测试环境、测试数据与断言辅助

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use linguana_cache::config::CacheStoreConfig;
use linguana_cache::storage::{
    CacheCheck, LegacySource, ReverseTranslationRecord, TranslationCacheStore, TranslationRecord,
};
use linguana_cache::text_hash;
use tempfile::TempDir;

/// 测试环境：缓存组件及其临时目录
pub struct TestEnvironment {
    pub store: TranslationCacheStore,
    pub temp_dir: Option<TempDir>,
}

impl TestEnvironment {
    /// 内存后端
    pub fn in_memory() -> Self {
        Self {
            store: TranslationCacheStore::new(CacheStoreConfig::in_memory()),
            temp_dir: None,
        }
    }

    /// 临时目录中的数据库文件，不迁移旧版数据
    pub fn on_disk() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = Self::disk_config(temp_dir.path());
        Self {
            store: TranslationCacheStore::new(config),
            temp_dir: Some(temp_dir),
        }
    }

    /// 带旧版数据来源的环境
    pub fn with_legacy_sources(sources: Vec<Arc<dyn LegacySource>>) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = Self::disk_config(temp_dir.path());
        Self {
            store: TranslationCacheStore::with_legacy_sources(config, sources),
            temp_dir: Some(temp_dir),
        }
    }

    pub fn disk_config(dir: &Path) -> CacheStoreConfig {
        CacheStoreConfig {
            migrate_legacy: false,
            memory_cache_size: 64,
            ..CacheStoreConfig::with_db_path(dir.join("cache.redb"))
        }
    }

    pub fn db_path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|dir| dir.path().join("cache.redb"))
    }

    /// 用同一个数据库文件创建新的缓存组件（模拟重启）
    pub fn reopen(&self) -> TranslationCacheStore {
        let dir = self
            .temp_dir
            .as_ref()
            .expect("reopen requires an on-disk environment");
        TranslationCacheStore::new(Self::disk_config(dir.path()))
    }
}

/// 测试数据生成器
pub struct TestDataGenerator;

impl TestDataGenerator {
    /// EN→DE 文本对
    pub fn english_german_pairs() -> Vec<(&'static str, &'static str)> {
        vec![
            ("Good morning", "Guten Morgen"),
            ("Thank you very much", "Vielen Dank"),
            ("See you tomorrow", "Bis morgen"),
            ("How are you?", "Wie geht es dir?"),
            ("Good night", "Gute Nacht"),
        ]
    }

    pub fn forward_record(
        key: &str,
        original: &str,
        translated: &str,
        source: &str,
        target: &str,
        timestamp: i64,
    ) -> TranslationRecord {
        TranslationRecord {
            cache_key: key.to_string(),
            original_text: original.to_string(),
            translated_text: translated.to_string(),
            source_language: source.to_string(),
            target_language: target.to_string(),
            message_type: "manual".to_string(),
            timestamp,
        }
    }

    pub fn reverse_record(
        original: &str,
        translated: &str,
        source: &str,
        target: &str,
        timestamp: i64,
    ) -> ReverseTranslationRecord {
        ReverseTranslationRecord {
            text_hash: text_hash(translated),
            original_text: original.to_string(),
            translated_text: translated.to_string(),
            source_language: source.to_string(),
            target_language: target.to_string(),
            message_type: "manual".to_string(),
            original_message_hash: String::new(),
            timestamp,
        }
    }

    /// 以 `cache_key` 为键的正向映射
    pub fn forward_map(records: Vec<TranslationRecord>) -> HashMap<String, TranslationRecord> {
        records
            .into_iter()
            .map(|record| (record.cache_key.clone(), record))
            .collect()
    }
}

/// 把所有 EN→DE 测试文本写入缓存
pub async fn seed_english_german(store: &TranslationCacheStore) -> usize {
    let pairs = TestDataGenerator::english_german_pairs();
    for (original, translated) in &pairs {
        assert!(
            store.store(original, translated, "EN", "DE", None).await,
            "Storing '{}' should succeed",
            original
        );
    }
    pairs.len()
}

/// 断言辅助
pub struct AssertionHelper;

impl AssertionHelper {
    pub fn assert_found(check: &CacheCheck, expected: &str, is_reverse: bool) {
        assert!(check.found, "Expected a cache hit for '{}'", expected);
        assert_eq!(check.translation.as_deref(), Some(expected));
        assert_eq!(
            check.is_reverse, is_reverse,
            "Unexpected lookup direction for '{}'",
            expected
        );
    }

    pub fn assert_not_found(check: &CacheCheck) {
        assert!(!check.found, "Expected a cache miss, got {:?}", check);
        assert!(check.translation.is_none());
    }
}
