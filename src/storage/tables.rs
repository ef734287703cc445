//! redb 表定义与记录读写助手
//!
//! 主表保存 JSON 编码的记录，二级索引使用多值表（索引值 → 主键）。
//! 每次写入或删除记录都会在同一个写事务中同步维护该表的全部索引。

use std::path::Path;

use redb::{
    Database, MultimapTableDefinition, ReadOnlyTable, ReadTransaction, ReadableMultimapTable,
    ReadableTable, TableDefinition, WriteTransaction,
};

use super::record::{timestamp_index_key, IndexSpec, StoredRecord};
use crate::config::{constants, CacheStoreConfig};
use crate::error::{CacheError, CacheResult};

type IndexTable = MultimapTableDefinition<'static, &'static str, &'static str>;

pub const TRANSLATIONS: TableDefinition<&str, &[u8]> =
    TableDefinition::new(constants::TRANSLATION_TABLE);
pub const REVERSE_TRANSLATIONS: TableDefinition<&str, &[u8]> =
    TableDefinition::new(constants::REVERSE_TRANSLATION_TABLE);
pub const EMOJIS: TableDefinition<&str, &[u8]> = TableDefinition::new(constants::EMOJI_TABLE);
pub const META: TableDefinition<&str, u64> = TableDefinition::new(constants::META_TABLE);

// 正向表索引
pub const FORWARD_ORIGINAL_INDEX: IndexTable =
    MultimapTableDefinition::new("translations_idx_originalText");
pub const FORWARD_TRANSLATED_INDEX: IndexTable =
    MultimapTableDefinition::new("translations_idx_translatedText");
pub const FORWARD_SOURCE_INDEX: IndexTable =
    MultimapTableDefinition::new("translations_idx_sourceLanguage");
pub const FORWARD_TARGET_INDEX: IndexTable =
    MultimapTableDefinition::new("translations_idx_targetLanguage");
pub const FORWARD_TIMESTAMP_INDEX: IndexTable =
    MultimapTableDefinition::new("translations_idx_timestamp");
pub const FORWARD_MESSAGE_TYPE_INDEX: IndexTable =
    MultimapTableDefinition::new("translations_idx_messageType");

// 反向表索引
pub const REVERSE_TRANSLATED_INDEX: IndexTable =
    MultimapTableDefinition::new("reverseTranslations_idx_translatedText");
pub const REVERSE_ORIGINAL_INDEX: IndexTable =
    MultimapTableDefinition::new("reverseTranslations_idx_originalText");
pub const REVERSE_TIMESTAMP_INDEX: IndexTable =
    MultimapTableDefinition::new("reverseTranslations_idx_timestamp");

/// 主表中的一行：主键与解码结果（无法解码时为 None）
pub type ScannedRow<R> = (String, Option<R>);

/// 打开（必要时创建）数据库并确保表结构为当前版本
pub fn open_database(config: &CacheStoreConfig) -> CacheResult<Database> {
    let database = if config.in_memory {
        tracing::debug!("使用内存后端打开翻译缓存数据库");
        Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?
    } else {
        let path = config.resolved_db_path();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        tracing::debug!("打开翻译缓存数据库: {}", path.display());
        Database::create(&path)?
    };

    let previous = ensure_schema(&database)?;
    if previous < constants::SCHEMA_VERSION {
        tracing::info!(
            "数据库结构版本从 {} 升级到 {}",
            previous,
            constants::SCHEMA_VERSION
        );
    }

    Ok(database)
}

/// 打开指定路径的数据库文件（不执行迁移与清理）
pub fn open_database_file<P: AsRef<Path>>(path: P) -> CacheResult<Database> {
    open_database(&CacheStoreConfig::with_db_path(path))
}

/// 创建缺失的表并写入结构版本，返回原有版本（新库为0）
///
/// 版本升级只补建表，不删除任何已有数据。
pub fn ensure_schema(database: &Database) -> CacheResult<u64> {
    write_atomically(database, |txn| {
        let previous = {
            let mut meta = txn.open_table(META)?;
            let previous = meta
                .get(constants::SCHEMA_VERSION_KEY)?
                .map(|guard| guard.value())
                .unwrap_or(0);
            if previous < constants::SCHEMA_VERSION {
                meta.insert(constants::SCHEMA_VERSION_KEY, constants::SCHEMA_VERSION)?;
            }
            previous
        };

        txn.open_table(TRANSLATIONS)?;
        txn.open_table(REVERSE_TRANSLATIONS)?;
        txn.open_table(EMOJIS)?;
        for table in all_index_tables() {
            txn.open_multimap_table(table)?;
        }

        Ok(previous)
    })
}

/// 读取当前结构版本
pub fn schema_version(txn: &ReadTransaction) -> CacheResult<u64> {
    let meta = txn.open_table(META)?;
    Ok(meta
        .get(constants::SCHEMA_VERSION_KEY)?
        .map(|guard| guard.value())
        .unwrap_or(0))
}

fn all_index_tables() -> impl Iterator<Item = IndexTable> {
    use super::record::{ReverseTranslationRecord, TranslationRecord};

    TranslationRecord::indexes()
        .iter()
        .map(|spec| spec.table)
        .chain(ReverseTranslationRecord::indexes().iter().map(|spec| spec.table))
}

/// 在单个写事务中执行操作：成功则提交，失败则中止
pub fn write_atomically<T, F>(database: &Database, op: F) -> CacheResult<T>
where
    F: FnOnce(&WriteTransaction) -> CacheResult<T>,
{
    let txn = database.begin_write()?;
    match op(&txn) {
        Ok(value) => {
            txn.commit()?;
            Ok(value)
        }
        Err(error) => {
            tracing::debug!("写事务已中止: {}", error);
            if let Err(abort_error) = txn.abort() {
                tracing::warn!("中止写事务失败: {}", abort_error);
            }
            Err(error)
        }
    }
}

/// 在只读事务中执行操作
pub fn read<T, F>(database: &Database, op: F) -> CacheResult<T>
where
    F: FnOnce(&ReadTransaction) -> CacheResult<T>,
{
    let txn = database.begin_read()?;
    op(&txn)
}

fn decode<R: StoredRecord>(key: &str, bytes: &[u8]) -> Option<R> {
    match serde_json::from_slice(bytes) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!("无法解码记录 {}: {}", key, e);
            None
        }
    }
}

/// 写入记录并维护索引，返回被覆盖的旧记录
pub fn put_record<R: StoredRecord>(txn: &WriteTransaction, record: &R) -> CacheResult<Option<R>> {
    let key = record.primary_key();
    let bytes = serde_json::to_vec(record)?;

    let previous = {
        let mut table = txn.open_table(R::TABLE)?;
        let previous = table
            .insert(key, bytes.as_slice())?
            .and_then(|guard| decode::<R>(key, guard.value()));
        previous
    };

    for spec in R::indexes() {
        let mut index = txn.open_multimap_table(spec.table)?;
        if let Some(old) = &previous {
            index.remove((spec.extract)(old).as_str(), key)?;
        }
        index.insert((spec.extract)(record).as_str(), key)?;
    }

    Ok(previous)
}

/// 删除记录及其索引项，返回被删除的记录
pub fn delete_record<R: StoredRecord>(txn: &WriteTransaction, key: &str) -> CacheResult<Option<R>> {
    let removed = {
        let mut table = txn.open_table(R::TABLE)?;
        let removed = table.remove(key)?.map(|guard| decode::<R>(key, guard.value()));
        removed
    };

    match removed {
        Some(Some(record)) => {
            remove_index_entries(txn, &record)?;
            Ok(Some(record))
        }
        Some(None) => {
            // 记录已损坏，无法计算索引值；残留索引项在查询时会被忽略
            Ok(None)
        }
        None => Ok(None),
    }
}

fn remove_index_entries<R: StoredRecord>(txn: &WriteTransaction, record: &R) -> CacheResult<()> {
    for spec in R::indexes() {
        let mut index = txn.open_multimap_table(spec.table)?;
        index.remove((spec.extract)(record).as_str(), record.primary_key())?;
    }
    Ok(())
}

/// 清空主表及其全部索引
pub fn clear_records<R: StoredRecord>(txn: &WriteTransaction) -> CacheResult<()> {
    txn.delete_table(R::TABLE)?;
    txn.open_table(R::TABLE)?;
    for spec in R::indexes() {
        txn.delete_multimap_table(spec.table)?;
        txn.open_multimap_table(spec.table)?;
    }
    Ok(())
}

/// 按主键读取记录
pub fn get_record<R, T>(table: &T, key: &str) -> CacheResult<Option<R>>
where
    R: StoredRecord,
    T: ReadableTable<&'static str, &'static [u8]>,
{
    Ok(table.get(key)?.and_then(|guard| decode::<R>(key, guard.value())))
}

/// 按主键顺序扫描整张表
pub fn scan_rows<R, T>(table: &T) -> CacheResult<Vec<ScannedRow<R>>>
where
    R: StoredRecord,
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let mut rows = Vec::new();
    for entry in table.iter()? {
        let (key, value) = entry?;
        let key = key.value().to_string();
        let record = decode::<R>(&key, value.value());
        rows.push((key, record));
    }
    Ok(rows)
}

/// 读取整张表中可解码的记录
pub fn scan_records<R: StoredRecord>(txn: &ReadTransaction) -> CacheResult<Vec<R>> {
    let table: ReadOnlyTable<&str, &[u8]> = txn.open_table(R::TABLE)?;
    Ok(scan_rows::<R, _>(&table)?
        .into_iter()
        .filter_map(|(_, record)| record)
        .collect())
}

/// 通过二级索引查找记录，按主键顺序返回
///
/// 指向已不存在记录的索引项会被跳过。
pub fn find_by_index<R: StoredRecord>(
    txn: &ReadTransaction,
    spec: &IndexSpec<R>,
    value: &str,
) -> CacheResult<Vec<R>> {
    let index = txn.open_multimap_table(spec.table)?;
    let mut keys = Vec::new();
    for key in index.get(value)? {
        keys.push(key?.value().to_string());
    }

    let table: ReadOnlyTable<&str, &[u8]> = txn.open_table(R::TABLE)?;
    let mut records = Vec::with_capacity(keys.len());
    for key in keys {
        if let Some(record) = get_record::<R, _>(&table, &key)? {
            records.push(record);
        }
    }
    Ok(records)
}

/// 按名称查找索引定义
pub fn index_named<R: StoredRecord>(name: &str) -> CacheResult<&'static IndexSpec<R>> {
    R::indexes()
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| CacheError::InternalError(format!("索引不存在: {}", name)))
}

/// 通过时间戳索引收集早于截止时间的主键
pub fn keys_before<R: StoredRecord>(txn: &WriteTransaction, cutoff: i64) -> CacheResult<Vec<String>> {
    let spec = index_named::<R>("timestamp")?;
    let index = txn.open_multimap_table(spec.table)?;
    let end = timestamp_index_key(cutoff);
    let end_key: &str = end.as_str();

    let mut keys = Vec::new();
    for entry in index.range(..end_key)? {
        let (_, values) = entry?;
        for key in values {
            keys.push(key?.value().to_string());
        }
    }
    Ok(keys)
}

/// 删除语言对无效或无法解码的记录，返回删除数量
pub fn delete_invalid<R: StoredRecord>(txn: &WriteTransaction) -> CacheResult<usize> {
    let rows = {
        let table = txn.open_table(R::TABLE)?;
        scan_rows::<R, _>(&table)?
    };

    let mut removed = 0;
    for (key, record) in rows {
        if record.map_or(true, |r| !r.has_valid_pair()) {
            delete_record::<R>(txn, &key)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// 删除时间戳早于截止时间的有效记录，返回被删除的主键
pub fn delete_older_than<R: StoredRecord>(
    txn: &WriteTransaction,
    cutoff: i64,
) -> CacheResult<Vec<String>> {
    // 索引键把负数时间戳压到0，截止时间不为正时只能全表扫描
    let candidates = if cutoff > 0 {
        keys_before::<R>(txn, cutoff)?
    } else {
        let table = txn.open_table(R::TABLE)?;
        scan_rows::<R, _>(&table)?
            .into_iter()
            .map(|(key, _)| key)
            .collect()
    };

    let mut removed = Vec::new();
    for key in candidates {
        let record = {
            let table = txn.open_table(R::TABLE)?;
            get_record::<R, _>(&table, &key)?
        };
        let Some(record) = record else { continue };
        if record.timestamp() < cutoff && record.has_valid_pair() {
            delete_record::<R>(txn, &key)?;
            removed.push(key);
        }
    }
    Ok(removed)
}
