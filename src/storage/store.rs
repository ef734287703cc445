//! 翻译缓存存储组件
//!
//! `TranslationCacheStore` 是唯一的对外入口：持久化的正向 / 反向表、内存读穿层、
//! 旧版数据迁移、检索、统计、导入导出、去重与过期清理。
//!
//! 初始化只执行一次，所有调用共享同一个初始化结果。每个公开方法都会先等待初始化，
//! 并在组件边界吸收内部错误，返回 `false`、`None`、空集合或失败结果对象。

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{Database, ReadOnlyTable, WriteTransaction};
use serde::Serialize;
use tokio::sync::{Mutex, OnceCell};

use super::legacy::{
    write_legacy_data, ExtensionStorageFile, LegacySource, LocalStorageFile, MigrationReport,
};
use super::memory::{MemoryLayer, MemoryStats};
use super::record::{EmojiBlob, ReverseTranslationRecord, StoredRecord, TranslationRecord};
use super::stats::CacheStats;
use super::tables;
use super::transfer::{parse_import, ExportDocument, ImportReport, TransferFormat};
use crate::config::{constants, load_cache_config, CacheStoreConfig};
use crate::error::{helpers, CacheError, CacheResult};
use crate::keys::{cache_key, normalize_text, possible_keys, text_hash};
use crate::language::{normalize_language_pair, LanguagePair, AUTO};

/// 检索过滤条件（精确匹配，大小写不敏感）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub source_language: Option<String>,
    pub target_language: Option<String>,
}

/// 检索命中的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Original,
    Translated,
    All,
}

/// 检索结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub hash: String,
    pub original_text: String,
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub message_type: String,
    pub timestamp: i64,
    pub match_type: MatchType,
}

/// 缓存检查结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheCheck {
    pub found: bool,
    pub translation: Option<String>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    pub is_reverse: bool,
}

/// 查询命中计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupCounters {
    pub memory_hits: u64,
    pub store_hits: u64,
    pub index_hits: u64,
    pub misses: u64,
}

#[derive(Default)]
struct Counters {
    memory_hits: AtomicU64,
    store_hits: AtomicU64,
    index_hits: AtomicU64,
    misses: AtomicU64,
    user_hits: AtomicU64,
}

impl Counters {
    fn record(&self, tier: Option<LookupTier>) {
        let counter = match tier {
            Some(LookupTier::Memory) => &self.memory_hits,
            Some(LookupTier::Store) => &self.store_hits,
            Some(LookupTier::Index) => &self.index_hits,
            None => &self.misses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> LookupCounters {
        LookupCounters {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            store_hits: self.store_hits.load(Ordering::Relaxed),
            index_hits: self.index_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// 查询命中的层级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LookupTier {
    Memory,
    Store,
    Index,
}

/// 一次 store 调用需要写入的全部记录
#[derive(Debug, Clone)]
struct PreparedStore {
    forward: TranslationRecord,
    aliases: Vec<TranslationRecord>,
    reverse: ReverseTranslationRecord,
}

impl PreparedStore {
    fn new(
        original: &str,
        translated: &str,
        source: &str,
        target: &str,
        message_type: &str,
        timestamp: i64,
    ) -> CacheResult<Self> {
        let resolution = normalize_language_pair(Some(source), Some(target));
        if resolution.fell_back {
            return Err(CacheError::InvalidLanguagePair {
                source_language: source.to_string(),
                target_language: target.to_string(),
            });
        }
        Self::for_pair(original, translated, resolution.pair, message_type, timestamp)
    }

    fn for_pair(
        original: &str,
        translated: &str,
        pair: LanguagePair,
        message_type: &str,
        timestamp: i64,
    ) -> CacheResult<Self> {
        let original = original.trim();
        let translated = translated.trim();
        if original.is_empty() || translated.is_empty() {
            return Err(helpers::validation_error("原文和译文不能为空"));
        }

        let source = pair.source.as_str();
        let target = pair.target.as_str();
        let key = cache_key(original, target, Some(source));

        let forward = TranslationRecord {
            cache_key: key.clone(),
            original_text: original.to_string(),
            translated_text: translated.to_string(),
            source_language: source.to_string(),
            target_language: target.to_string(),
            message_type: message_type.to_string(),
            timestamp,
        };

        // 以 AUTO 替换目标或源语言的别名键。cache_key 会把 AUTO 归一化为有效语言，
        // 因此有效语言对的两个别名都等于主键，实际不会产生别名记录
        let mut aliases: Vec<TranslationRecord> = Vec::new();
        for alias in [
            cache_key(original, AUTO, Some(source)),
            cache_key(original, target, Some(AUTO)),
        ] {
            if alias != key && aliases.iter().all(|r| r.cache_key != alias) {
                aliases.push(TranslationRecord {
                    cache_key: alias,
                    ..forward.clone()
                });
            }
        }

        let reverse = ReverseTranslationRecord {
            text_hash: text_hash(translated),
            original_text: forward.original_text.clone(),
            translated_text: forward.translated_text.clone(),
            source_language: forward.source_language.clone(),
            target_language: forward.target_language.clone(),
            message_type: forward.message_type.clone(),
            original_message_hash: key,
            timestamp,
        };

        Ok(Self {
            forward,
            aliases,
            reverse,
        })
    }

    /// 写入全部记录，返回因译文变化而删除的旧反向记录哈希
    fn write(&self, txn: &WriteTransaction) -> CacheResult<Option<String>> {
        let previous = tables::put_record(txn, &self.forward)?;
        for alias in &self.aliases {
            tables::put_record(txn, alias)?;
        }
        tables::put_record(txn, &self.reverse)?;

        match previous {
            Some(previous) => remove_stale_reverse(txn, &previous, &self.reverse),
            None => Ok(None),
        }
    }
}

/// 删除旧译文对应的反向记录；只删除仍指向同一正向键的记录
fn remove_stale_reverse(
    txn: &WriteTransaction,
    previous: &TranslationRecord,
    current: &ReverseTranslationRecord,
) -> CacheResult<Option<String>> {
    let stale = text_hash(&previous.translated_text);
    if stale == current.text_hash {
        return Ok(None);
    }

    let owned = {
        let table = txn.open_table(ReverseTranslationRecord::TABLE)?;
        tables::get_record::<ReverseTranslationRecord, _>(&table, &stale)?
            .is_some_and(|record| record.original_message_hash == current.original_message_hash)
    };
    if !owned {
        return Ok(None);
    }

    tables::delete_record::<ReverseTranslationRecord>(txn, &stale)?;
    tracing::debug!("删除过期反向记录: {}", stale);
    Ok(Some(stale))
}

/// 在阻塞线程池中执行数据库操作
async fn blocking<T, F>(database: Arc<Database>, op: F) -> CacheResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> CacheResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || op(&database)).await?
}

type AllRecords = (Vec<TranslationRecord>, Vec<ReverseTranslationRecord>);

fn scan_all(database: &Database) -> CacheResult<AllRecords> {
    tables::read(database, |txn| {
        Ok((
            tables::scan_records::<TranslationRecord>(txn)?,
            tables::scan_records::<ReverseTranslationRecord>(txn)?,
        ))
    })
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// EN↔DE 翻译缓存
pub struct TranslationCacheStore {
    config: CacheStoreConfig,
    legacy_sources: Vec<Arc<dyn LegacySource>>,
    database: OnceCell<Result<Arc<Database>, CacheError>>,
    memory: Mutex<MemoryLayer>,
    counters: Counters,
}

impl TranslationCacheStore {
    /// 使用给定配置创建；旧版来源取自配置中的路径
    pub fn new(config: CacheStoreConfig) -> Self {
        let legacy_sources = Self::configured_legacy_sources(&config);
        Self::with_legacy_sources(config, legacy_sources)
    }

    /// 使用显式指定的旧版数据来源创建
    pub fn with_legacy_sources(
        config: CacheStoreConfig,
        legacy_sources: Vec<Arc<dyn LegacySource>>,
    ) -> Self {
        let memory = MemoryLayer::new(config.memory_cache_size);
        Self {
            config,
            legacy_sources,
            database: OnceCell::new(),
            memory: Mutex::new(memory),
            counters: Counters::default(),
        }
    }

    /// 从配置文件与环境变量加载配置后创建
    pub fn from_default_config() -> Self {
        Self::new(load_cache_config())
    }

    fn configured_legacy_sources(config: &CacheStoreConfig) -> Vec<Arc<dyn LegacySource>> {
        if !config.migrate_legacy {
            return Vec::new();
        }

        let (extension, local) = config.resolved_legacy_paths();
        let mut sources: Vec<Arc<dyn LegacySource>> = Vec::new();
        if let Some(path) = extension {
            sources.push(Arc::new(ExtensionStorageFile::new(path)));
        }
        if let Some(path) = local {
            sources.push(Arc::new(LocalStorageFile::new(path)));
        }
        sources
    }

    pub fn config(&self) -> &CacheStoreConfig {
        &self.config
    }

    fn storage_label(&self) -> &'static str {
        if self.config.in_memory {
            constants::MEMORY_STORAGE_TYPE_LABEL
        } else {
            constants::STORAGE_TYPE_LABEL
        }
    }

    // ------------------------------------------------------------------
    // 初始化
    // ------------------------------------------------------------------

    /// 等待初始化完成；初始化失败时返回 `StoreNotReady`
    pub async fn ensure_ready(&self) -> CacheResult<()> {
        self.database().await.map(|_| ())
    }

    /// 初始化是否已成功完成
    pub fn is_ready(&self) -> bool {
        matches!(self.database.get(), Some(Ok(_)))
    }

    async fn database(&self) -> CacheResult<Arc<Database>> {
        let outcome = self
            .database
            .get_or_init(|| async {
                let result = self.initialize().await;
                if let Err(e) = &result {
                    tracing::error!("翻译缓存初始化失败: {}", e);
                }
                result
            })
            .await;

        match outcome {
            Ok(database) => Ok(Arc::clone(database)),
            Err(e) => Err(CacheError::StoreNotReady(e.to_string())),
        }
    }

    async fn initialize(&self) -> CacheResult<Arc<Database>> {
        self.config.validate()?;

        let config = self.config.clone();
        let database =
            Arc::new(tokio::task::spawn_blocking(move || tables::open_database(&config)).await??);

        // 迁移是尽力而为的，失败不影响初始化
        if !self.legacy_sources.is_empty() {
            match Self::migrate_sources(Arc::clone(&database), &self.legacy_sources).await {
                Ok(Some(report)) => tracing::info!(
                    "已从 {} 迁移旧版缓存: 正向 {} 条（跳过 {}），反向 {} 条（跳过 {}）",
                    report.source,
                    report.migrated,
                    report.skipped,
                    report.reverse_migrated,
                    report.reverse_skipped
                ),
                Ok(None) => tracing::debug!("没有需要迁移的旧版缓存"),
                Err(e) => tracing::warn!("旧版缓存迁移失败，继续初始化: {}", e),
            }
        }

        match Self::sweep_invalid(Arc::clone(&database)).await {
            Ok((0, 0)) => {}
            Ok((forward, reverse)) => tracing::info!(
                "已清理无效语言对条目: 正向 {} 条，反向 {} 条",
                forward,
                reverse
            ),
            Err(e) => tracing::warn!("清理无效语言对失败: {}", e),
        }

        tracing::info!("翻译缓存已就绪 ({})", self.storage_label());
        Ok(database)
    }

    async fn migrate_sources(
        database: Arc<Database>,
        sources: &[Arc<dyn LegacySource>],
    ) -> CacheResult<Option<MigrationReport>> {
        for source in sources {
            let loader = Arc::clone(source);
            let data = match tokio::task::spawn_blocking(move || loader.load()).await? {
                Ok(Some(data)) => data,
                Ok(None) => {
                    tracing::debug!("旧版存储 {} 中没有数据", source.name());
                    continue;
                }
                Err(e) => {
                    tracing::warn!("读取旧版存储 {} 失败: {}", source.name(), e);
                    continue;
                }
            };

            let name = source.name().to_string();
            let report = blocking(Arc::clone(&database), move |db| {
                tables::write_atomically(db, |txn| write_legacy_data(txn, &name, &data))
            })
            .await?;

            // 只有提交成功后才删除来源数据
            let purger = Arc::clone(source);
            if let Err(e) = tokio::task::spawn_blocking(move || purger.purge()).await? {
                tracing::warn!("删除旧版存储 {} 中的数据失败: {}", source.name(), e);
            }

            return Ok(Some(report));
        }

        Ok(None)
    }

    async fn sweep_invalid(database: Arc<Database>) -> CacheResult<(usize, usize)> {
        blocking(database, |db| {
            tables::write_atomically(db, |txn| {
                let forward = tables::delete_invalid::<TranslationRecord>(txn)?;
                let reverse = tables::delete_invalid::<ReverseTranslationRecord>(txn)?;
                Ok((forward, reverse))
            })
        })
        .await
    }

    async fn run_blocking<T, F>(&self, op: F) -> CacheResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> CacheResult<T> + Send + 'static,
    {
        let database = self.database().await?;
        blocking(database, op).await
    }

    /// 删除两张表中语言对无效的条目，返回删除总数
    pub async fn cleanup_invalid_language_pairs(&self) -> usize {
        let result = match self.database().await {
            Ok(database) => Self::sweep_invalid(database).await,
            Err(e) => Err(e),
        };
        let (forward, reverse) = helpers::absorb("清理无效语言对", result, (0, 0));
        forward + reverse
    }

    /// 从旧版存储迁移（通常在初始化时已自动执行）
    pub async fn migrate_from_legacy_storage(&self) -> Option<MigrationReport> {
        let result = match self.database().await {
            Ok(database) => Self::migrate_sources(database, &self.legacy_sources).await,
            Err(e) => Err(e),
        };
        helpers::absorb("迁移旧版缓存", result, None)
    }

    // ------------------------------------------------------------------
    // 写入与查询
    // ------------------------------------------------------------------

    /// 写入一条翻译：正向记录、反向记录以及别名记录在同一事务中提交
    ///
    /// 语言对无效或文本为空时不写入并返回 false。
    pub async fn store(
        &self,
        original: &str,
        translated: &str,
        source_language: &str,
        target_language: &str,
        message_type: Option<&str>,
    ) -> bool {
        let result = self
            .try_store(
                original,
                translated,
                source_language,
                target_language,
                message_type.unwrap_or(constants::DEFAULT_MESSAGE_TYPE),
            )
            .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                helpers::report("存储翻译", &e);
                false
            }
        }
    }

    async fn try_store(
        &self,
        original: &str,
        translated: &str,
        source_language: &str,
        target_language: &str,
        message_type: &str,
    ) -> CacheResult<()> {
        let database = self.database().await?;
        let prepared = PreparedStore::new(
            original,
            translated,
            source_language,
            target_language,
            message_type,
            now_millis(),
        )?;

        let writes = prepared.clone();
        let stale = blocking(database, move |db| {
            tables::write_atomically(db, |txn| writes.write(txn))
        })
        .await?;

        let stale: Vec<String> = stale.into_iter().collect();
        self.remember(std::slice::from_ref(&prepared), &stale).await;
        Ok(())
    }

    // 别名记录不进入内存层
    async fn remember(&self, prepared: &[PreparedStore], stale_reverse: &[String]) {
        let mut memory = self.memory.lock().await;
        for hash in stale_reverse {
            memory.remove_reverse(hash);
        }
        for item in prepared {
            memory.put_forward(item.forward.cache_key.clone(), item.forward.clone());
            memory.put_reverse(item.reverse.text_hash.clone(), item.reverse.clone());
        }
    }

    /// 正向查询：内存层 → 候选键 → originalText 索引
    pub async fn lookup_forward(&self, text: &str) -> Option<TranslationRecord> {
        helpers::absorb("查询正向缓存", self.try_lookup_forward(text).await, None)
    }

    async fn try_lookup_forward(&self, text: &str) -> CacheResult<Option<TranslationRecord>> {
        let database = self.database().await?;

        let mut candidates = possible_keys(text, "DE", Some("EN"));
        for key in possible_keys(text, "EN", Some("DE")) {
            if !candidates.contains(&key) {
                candidates.push(key);
            }
        }

        {
            let mut memory = self.memory.lock().await;
            let keys = std::iter::once(text).chain(candidates.iter().map(String::as_str));
            if let Some(record) = memory.find_forward(keys) {
                self.counters.record(Some(LookupTier::Memory));
                return Ok(Some(record));
            }
        }

        let normalized = normalize_text(text);
        let found = blocking(database, move |db| {
            tables::read(db, |txn| {
                let table: ReadOnlyTable<&str, &[u8]> = txn.open_table(TranslationRecord::TABLE)?;
                for key in &candidates {
                    if let Some(record) = tables::get_record::<TranslationRecord, _>(&table, key)? {
                        if record.has_valid_pair() {
                            return Ok(Some((record, LookupTier::Store)));
                        }
                    }
                }

                let spec = tables::index_named::<TranslationRecord>("originalText")?;
                Ok(tables::find_by_index(txn, spec, &normalized)?
                    .into_iter()
                    .find(|record| record.has_valid_pair())
                    .map(|record| (record, LookupTier::Index)))
            })
        })
        .await?;

        match found {
            Some((record, tier)) => {
                self.counters.record(Some(tier));
                let mut memory = self.memory.lock().await;
                memory.put_forward(record.cache_key.clone(), record.clone());
                Ok(Some(record))
            }
            None => {
                self.counters.record(None);
                Ok(None)
            }
        }
    }

    /// 反向查询：内存层 → 译文哈希 → translatedText 索引
    pub async fn lookup_reverse(&self, text: &str) -> Option<ReverseTranslationRecord> {
        helpers::absorb("查询反向缓存", self.try_lookup_reverse(text).await, None)
    }

    async fn try_lookup_reverse(&self, text: &str) -> CacheResult<Option<ReverseTranslationRecord>> {
        let database = self.database().await?;
        let hash = text_hash(text);

        {
            let mut memory = self.memory.lock().await;
            if let Some(record) = memory.get_reverse(&hash) {
                self.counters.record(Some(LookupTier::Memory));
                return Ok(Some(record));
            }
        }

        let normalized = normalize_text(text);
        let key = hash.clone();
        let found = blocking(database, move |db| {
            tables::read(db, |txn| {
                let table: ReadOnlyTable<&str, &[u8]> =
                    txn.open_table(ReverseTranslationRecord::TABLE)?;
                if let Some(record) = tables::get_record::<ReverseTranslationRecord, _>(&table, &key)? {
                    if record.has_valid_pair() {
                        return Ok(Some((record, LookupTier::Store)));
                    }
                }

                let spec = tables::index_named::<ReverseTranslationRecord>("translatedText")?;
                Ok(tables::find_by_index(txn, spec, &normalized)?
                    .into_iter()
                    .find(|record| record.has_valid_pair())
                    .map(|record| (record, LookupTier::Index)))
            })
        })
        .await?;

        match found {
            Some((record, tier)) => {
                self.counters.record(Some(tier));
                let mut memory = self.memory.lock().await;
                memory.put_reverse(record.text_hash.clone(), record.clone());
                Ok(Some(record))
            }
            None => {
                self.counters.record(None);
                Ok(None)
            }
        }
    }

    // ------------------------------------------------------------------
    // 批量操作
    // ------------------------------------------------------------------

    /// 读取全部有效正向记录（键为 cache_key）
    pub async fn load_all(&self) -> HashMap<String, TranslationRecord> {
        let result = self
            .run_blocking(|db| tables::read(db, tables::scan_records::<TranslationRecord>))
            .await
            .map(|records| {
                records
                    .into_iter()
                    .filter(|r| r.has_valid_pair())
                    .map(|r| (r.cache_key.clone(), r))
                    .collect()
            });
        helpers::absorb("加载正向缓存", result, HashMap::new())
    }

    /// 读取全部有效反向记录（键为 text_hash）
    pub async fn load_reverse_all(&self) -> HashMap<String, ReverseTranslationRecord> {
        let result = self
            .run_blocking(|db| tables::read(db, tables::scan_records::<ReverseTranslationRecord>))
            .await
            .map(|records| {
                records
                    .into_iter()
                    .filter(|r| r.has_valid_pair())
                    .map(|r| (r.text_hash.clone(), r))
                    .collect()
            });
        helpers::absorb("加载反向缓存", result, HashMap::new())
    }

    /// 用给定内容替换两张表，无效条目跳过；整个过程在一个事务中完成
    pub async fn save_all(
        &self,
        forward: HashMap<String, TranslationRecord>,
        reverse: HashMap<String, ReverseTranslationRecord>,
    ) -> bool {
        let result = self
            .run_blocking(move |db| {
                tables::write_atomically(db, |txn| {
                    tables::clear_records::<TranslationRecord>(txn)?;
                    tables::clear_records::<ReverseTranslationRecord>(txn)?;

                    let mut skipped = 0;
                    let mut saved_forward = Vec::with_capacity(forward.len());
                    for (key, mut record) in forward {
                        if !record.has_valid_pair() {
                            skipped += 1;
                            continue;
                        }
                        record.cache_key = key;
                        tables::put_record(txn, &record)?;
                        saved_forward.push(record);
                    }

                    let mut saved_reverse = Vec::with_capacity(reverse.len());
                    for (hash, mut record) in reverse {
                        if !record.has_valid_pair() {
                            skipped += 1;
                            continue;
                        }
                        record.text_hash = hash;
                        tables::put_record(txn, &record)?;
                        saved_reverse.push(record);
                    }

                    Ok((saved_forward, saved_reverse, skipped))
                })
            })
            .await;

        match result {
            Ok((saved_forward, saved_reverse, skipped)) => {
                if skipped > 0 {
                    tracing::info!("保存缓存时跳过 {} 条无效条目", skipped);
                }
                let mut memory = self.memory.lock().await;
                memory.clear();
                for record in saved_forward {
                    memory.put_forward(record.cache_key.clone(), record);
                }
                for record in saved_reverse {
                    memory.put_reverse(record.text_hash.clone(), record);
                }
                true
            }
            Err(e) => {
                helpers::report("保存缓存", &e);
                false
            }
        }
    }

    /// 检索正向记录，按时间戳从新到旧排序
    ///
    /// 查询归一化后为空时返回全部有效条目（`MatchType::All`）。
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchResult> {
        let result = self
            .run_blocking(|db| tables::read(db, tables::scan_records::<TranslationRecord>))
            .await
            .map(|records| search_records(records, query, options));
        helpers::absorb("检索缓存", result, Vec::new())
    }

    /// 缓存统计；存储不可用时退化为内存层统计
    pub async fn stats(&self) -> CacheStats {
        let label = self.storage_label();
        let result = self
            .run_blocking(move |db| {
                let (forward, reverse) = scan_all(db)?;
                Ok(CacheStats::compute(&forward, &reverse, label))
            })
            .await;

        match result {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!("无法从存储计算统计，改用内存层: {}", e);
                let memory = self.memory.lock().await;
                CacheStats::from_memory(&memory)
            }
        }
    }

    /// 导出全部有效记录，失败时返回空字符串
    pub async fn export_data(&self, format: TransferFormat) -> String {
        let label = self.storage_label();
        let result = self
            .run_blocking(move |db| {
                let (forward, reverse) = scan_all(db)?;
                let document = ExportDocument::build(&forward, &reverse, label);
                match format {
                    TransferFormat::Json => document.to_json(),
                    TransferFormat::Csv => Ok(document.to_csv()),
                }
            })
            .await;
        helpers::absorb("导出缓存", result, String::new())
    }

    /// 导入 JSON 或 CSV 数据；无效记录计为跳过，不影响其它记录
    pub async fn import_data(&self, data: &str, format: TransferFormat) -> ImportReport {
        match self.try_import(data, format).await {
            Ok(report) => report,
            Err(e) => {
                helpers::report("导入缓存", &e);
                ImportReport::failed(&e)
            }
        }
    }

    async fn try_import(&self, data: &str, format: TransferFormat) -> CacheResult<ImportReport> {
        let database = self.database().await?;
        let candidates = parse_import(data, format)?;
        let timestamp = now_millis();

        let mut skipped = 0;
        let mut prepared = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let item = candidate.and_then(|c| {
                PreparedStore::for_pair(
                    &c.original_text,
                    &c.translated_text,
                    c.pair,
                    &c.message_type,
                    timestamp,
                )
            });
            match item {
                Ok(item) => prepared.push(item),
                Err(e) => {
                    tracing::debug!("跳过导入记录: {}", e);
                    skipped += 1;
                }
            }
        }

        let writes = prepared.clone();
        let stale = blocking(database, move |db| {
            tables::write_atomically(db, |txn| {
                let mut stale = Vec::new();
                for item in &writes {
                    stale.extend(item.write(txn)?);
                }
                Ok(stale)
            })
        })
        .await?;

        self.remember(&prepared, &stale).await;
        tracing::info!("导入完成: 成功 {} 条，跳过 {} 条", prepared.len(), skipped);

        Ok(ImportReport {
            success: true,
            imported: prepared.len(),
            skipped,
            error: None,
        })
    }

    /// 删除早于截止时间的有效记录（两张表），返回删除的正向记录数
    pub async fn cleanup_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let cutoff = cutoff.timestamp_millis();
        let result = self
            .run_blocking(move |db| {
                tables::write_atomically(db, |txn| {
                    let forward = tables::delete_older_than::<TranslationRecord>(txn, cutoff)?;
                    let reverse =
                        tables::delete_older_than::<ReverseTranslationRecord>(txn, cutoff)?;
                    Ok((forward, reverse))
                })
            })
            .await;

        match result {
            Ok((forward, reverse)) => {
                let mut memory = self.memory.lock().await;
                for key in &forward {
                    memory.remove_forward(key);
                }
                for hash in &reverse {
                    memory.remove_reverse(hash);
                }
                tracing::info!("已清理过期条目: 正向 {} 条，反向 {} 条", forward.len(), reverse.len());
                forward.len()
            }
            Err(e) => {
                helpers::report("清理过期条目", &e);
                0
            }
        }
    }

    /// 按（归一化原文, 目标语言）去重，先出现的保留，同时删除重复条目对应的反向记录
    pub async fn deduplicate(&self) -> usize {
        let result = self
            .run_blocking(|db| {
                tables::write_atomically(db, |txn| {
                    let rows = {
                        let table = txn.open_table(TranslationRecord::TABLE)?;
                        tables::scan_rows::<TranslationRecord, _>(&table)?
                    };

                    let mut seen = HashSet::new();
                    let mut removed = Vec::new();
                    for record in rows.into_iter().filter_map(|(_, record)| record) {
                        if !record.has_valid_pair() {
                            continue;
                        }
                        let identity = (
                            normalize_text(&record.original_text),
                            record.target_language.clone(),
                        );
                        if seen.insert(identity) {
                            continue;
                        }

                        let hash = text_hash(&record.translated_text);
                        tables::delete_record::<TranslationRecord>(txn, &record.cache_key)?;
                        tables::delete_record::<ReverseTranslationRecord>(txn, &hash)?;
                        removed.push((record.cache_key, hash));
                    }
                    Ok(removed)
                })
            })
            .await;

        match result {
            Ok(removed) => {
                let mut memory = self.memory.lock().await;
                for (key, hash) in &removed {
                    memory.remove_forward(key);
                    memory.remove_reverse(hash);
                }
                if !removed.is_empty() {
                    tracing::info!("去重删除 {} 条正向记录", removed.len());
                }
                removed.len()
            }
            Err(e) => {
                helpers::report("缓存去重", &e);
                0
            }
        }
    }

    /// 清空两张表与内存层
    pub async fn clear_all(&self) -> bool {
        let result = self
            .run_blocking(|db| {
                tables::write_atomically(db, |txn| {
                    tables::clear_records::<TranslationRecord>(txn)?;
                    tables::clear_records::<ReverseTranslationRecord>(txn)
                })
            })
            .await;

        match result {
            Ok(()) => {
                self.memory.lock().await.clear();
                tracing::info!("翻译缓存已清空");
                true
            }
            Err(e) => {
                helpers::report("清空缓存", &e);
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // 缓存检查与计数
    // ------------------------------------------------------------------

    /// 检查指定方向的翻译是否已缓存（内部使用，不计命中）
    ///
    /// 源语言缺省或为 AUTO 时按 EN 处理。正向未命中时尝试反向记录：
    /// 方向恰好相反的反向记录可以直接给出原文作为答案。
    pub async fn check_cache(&self, text: &str, target: &str, source: Option<&str>) -> CacheCheck {
        let source = source.map(str::trim).unwrap_or(AUTO);
        let source = if source.eq_ignore_ascii_case(AUTO) {
            "EN"
        } else {
            source
        };
        let Some(pair) = LanguagePair::parse(source, target) else {
            return CacheCheck::default();
        };

        if let Some(record) = self.lookup_forward(text).await {
            if record.source_language == pair.source.as_str()
                && record.target_language == pair.target.as_str()
            {
                return CacheCheck {
                    found: true,
                    translation: Some(record.translated_text),
                    source_language: Some(record.source_language),
                    target_language: Some(record.target_language),
                    is_reverse: false,
                };
            }
        }

        if let Some(record) = self.lookup_reverse(text).await {
            if record.target_language == pair.source.as_str()
                && record.source_language == pair.target.as_str()
            {
                return CacheCheck {
                    found: true,
                    translation: Some(record.original_text),
                    source_language: Some(pair.source.to_string()),
                    target_language: Some(pair.target.to_string()),
                    is_reverse: true,
                };
            }
        }

        CacheCheck::default()
    }

    /// 面向用户请求的缓存检查，命中时计数
    pub async fn check_cache_for_user(
        &self,
        text: &str,
        target: &str,
        source: Option<&str>,
    ) -> CacheCheck {
        let result = self.check_cache(text, target, source).await;
        if result.found {
            self.counters.user_hits.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// 用户请求命中次数
    pub fn hit_count(&self) -> u64 {
        self.counters.user_hits.load(Ordering::Relaxed)
    }

    pub fn reset_hits(&self) {
        self.counters.user_hits.store(0, Ordering::Relaxed);
    }

    /// 各层查询命中统计
    pub fn lookup_counters(&self) -> LookupCounters {
        self.counters.snapshot()
    }

    pub async fn memory_stats(&self) -> MemoryStats {
        self.memory.lock().await.stats()
    }

    /// 用持久化数据预热内存层，返回写入的正向条目数
    pub async fn warm_memory(&self) -> usize {
        let forward = self.load_all().await;
        let reverse = self.load_reverse_all().await;

        let mut memory = self.memory.lock().await;
        let count = forward.len();
        for (key, record) in forward {
            memory.put_forward(key, record);
        }
        for (hash, record) in reverse {
            memory.put_reverse(hash, record);
        }
        tracing::debug!("内存层预热完成: {} 条", count);
        count
    }

    // ------------------------------------------------------------------
    // 自定义表情
    // ------------------------------------------------------------------

    pub async fn save_custom_emojis(&self, emojis: Vec<String>) -> bool {
        let blob = EmojiBlob {
            id: constants::EMOJI_RECORD_ID.to_string(),
            emojis,
            timestamp: now_millis(),
        };
        let result = self
            .run_blocking(move |db| {
                tables::write_atomically(db, |txn| tables::put_record(txn, &blob).map(|_| ()))
            })
            .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                helpers::report("保存自定义表情", &e);
                false
            }
        }
    }

    pub async fn load_custom_emojis(&self) -> Vec<String> {
        let result = self
            .run_blocking(|db| {
                tables::read(db, |txn| {
                    let table: ReadOnlyTable<&str, &[u8]> = txn.open_table(EmojiBlob::TABLE)?;
                    Ok(tables::get_record::<EmojiBlob, _>(&table, constants::EMOJI_RECORD_ID)?
                        .map(|blob| blob.emojis)
                        .unwrap_or_default())
                })
            })
            .await;
        helpers::absorb("加载自定义表情", result, Vec::new())
    }
}

fn search_records(
    records: Vec<TranslationRecord>,
    query: &str,
    options: &SearchOptions,
) -> Vec<SearchResult> {
    let needle = normalize_text(query);
    let language_matches = |expected: &Option<String>, actual: &str| {
        expected
            .as_deref()
            .map_or(true, |expected| expected.eq_ignore_ascii_case(actual))
    };

    let mut results: Vec<SearchResult> = records
        .into_iter()
        .filter(|r| r.has_valid_pair())
        .filter(|r| language_matches(&options.source_language, &r.source_language))
        .filter(|r| language_matches(&options.target_language, &r.target_language))
        .filter_map(|r| {
            let match_type = if needle.is_empty() {
                MatchType::All
            } else if normalize_text(&r.original_text).contains(&needle) {
                MatchType::Original
            } else if normalize_text(&r.translated_text).contains(&needle) {
                MatchType::Translated
            } else {
                return None;
            };

            Some(SearchResult {
                hash: r.cache_key,
                original_text: r.original_text,
                translated_text: r.translated_text,
                source_language: r.source_language,
                target_language: r.target_language,
                message_type: r.message_type,
                timestamp: r.timestamp,
                match_type,
            })
        })
        .collect();

    results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    results
}
