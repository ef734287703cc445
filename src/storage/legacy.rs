//! 旧版平面存储迁移
//!
//! 旧版本把整个缓存序列化为 `[键, 条目]` 数组保存在两个位置：扩展同步存储
//! 与页面本地存储。迁移时按顺序尝试各个来源，只使用第一个有数据的来源，
//! 成功提交后删除来源中的旧数据。

use std::path::{Path, PathBuf};

use chrono::Utc;
use redb::WriteTransaction;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::record::{ReverseTranslationRecord, TranslationRecord};
use super::tables;
use crate::config::constants;
use crate::error::{CacheError, CacheResult};
use crate::keys::cache_key;
use crate::language::normalize_language_pair;

/// 旧版缓存条目，所有字段都可能缺失
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyEntry {
    pub original_text: Option<String>,
    pub translated_text: Option<String>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    pub message_type: Option<String>,
    pub original_message_hash: Option<String>,
    pub timestamp: Option<f64>,
}

/// 从旧版来源读取到的数据
#[derive(Debug, Clone, Default)]
pub struct LegacyData {
    pub translations: Vec<(String, LegacyEntry)>,
    pub reverse_translations: Vec<(String, LegacyEntry)>,
    /// 无法解析为 `[键, 条目]` 的元素数量
    pub malformed: usize,
}

impl LegacyData {
    /// 从两个 JSON 数组构建
    pub fn from_values(translations: Option<&Value>, reverse: Option<&Value>) -> Self {
        let mut malformed = 0;
        let translations = collect_pairs(translations, &mut malformed);
        let reverse_translations = collect_pairs(reverse, &mut malformed);

        Self {
            translations,
            reverse_translations,
            malformed,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.translations.is_empty() && self.reverse_translations.is_empty()
    }
}

fn collect_pairs(value: Option<&Value>, malformed: &mut usize) -> Vec<(String, LegacyEntry)> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut pairs = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<(String, LegacyEntry)>(item.clone()) {
            Ok(pair) => pairs.push(pair),
            Err(e) => {
                tracing::debug!("跳过无法解析的旧版条目: {}", e);
                *malformed += 1;
            }
        }
    }
    pairs
}

/// 迁移结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub source: String,
    pub migrated: usize,
    pub skipped: usize,
    pub reverse_migrated: usize,
    pub reverse_skipped: usize,
}

/// 旧版数据来源
pub trait LegacySource: Send + Sync {
    /// 来源名称（用于日志与迁移报告）
    fn name(&self) -> &str;

    /// 读取旧版数据，来源中没有数据时返回 None
    fn load(&self) -> CacheResult<Option<LegacyData>>;

    /// 删除来源中的旧版数据
    fn purge(&self) -> CacheResult<()>;
}

fn read_object(path: &Path) -> CacheResult<Option<Map<String, Value>>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(None);
    }

    match serde_json::from_str::<Value>(&content)? {
        Value::Object(object) => Ok(Some(object)),
        _ => Err(CacheError::MigrationError(format!(
            "旧版存储文件不是JSON对象: {}",
            path.display()
        ))),
    }
}

fn remove_legacy_keys(path: &Path) -> CacheResult<()> {
    let Some(mut object) = read_object(path)? else {
        return Ok(());
    };

    object.remove(constants::LEGACY_CACHE_KEY);
    object.remove(constants::LEGACY_REVERSE_CACHE_KEY);

    let content = serde_json::to_string_pretty(&Value::Object(object))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// 扩展同步存储的导出文件
///
/// JSON 对象，旧版键下直接保存 `[键, 条目]` 数组。
#[derive(Debug, Clone)]
pub struct ExtensionStorageFile {
    path: PathBuf,
}

impl ExtensionStorageFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl LegacySource for ExtensionStorageFile {
    fn name(&self) -> &str {
        "extension-storage"
    }

    fn load(&self) -> CacheResult<Option<LegacyData>> {
        let Some(object) = read_object(&self.path)? else {
            return Ok(None);
        };

        let has_translations = object
            .get(constants::LEGACY_CACHE_KEY)
            .and_then(Value::as_array)
            .is_some_and(|items| !items.is_empty());
        if !has_translations {
            return Ok(None);
        }

        Ok(Some(LegacyData::from_values(
            object.get(constants::LEGACY_CACHE_KEY),
            object.get(constants::LEGACY_REVERSE_CACHE_KEY),
        )))
    }

    fn purge(&self) -> CacheResult<()> {
        remove_legacy_keys(&self.path)
    }
}

/// 页面本地存储的导出文件
///
/// JSON 对象，旧版键的值是再次序列化后的 JSON 字符串。
#[derive(Debug, Clone)]
pub struct LocalStorageFile {
    path: PathBuf,
}

impl LocalStorageFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    fn decode_item(object: &Map<String, Value>, key: &str) -> CacheResult<Option<Value>> {
        match object.get(key) {
            Some(Value::String(raw)) if !raw.trim().is_empty() => {
                Ok(Some(serde_json::from_str(raw)?))
            }
            _ => Ok(None),
        }
    }
}

impl LegacySource for LocalStorageFile {
    fn name(&self) -> &str {
        "local-storage"
    }

    fn load(&self) -> CacheResult<Option<LegacyData>> {
        let Some(object) = read_object(&self.path)? else {
            return Ok(None);
        };

        let Some(translations) = Self::decode_item(&object, constants::LEGACY_CACHE_KEY)? else {
            return Ok(None);
        };
        let reverse = Self::decode_item(&object, constants::LEGACY_REVERSE_CACHE_KEY)?;

        Ok(Some(LegacyData::from_values(
            Some(&translations),
            reverse.as_ref(),
        )))
    }

    fn purge(&self) -> CacheResult<()> {
        remove_legacy_keys(&self.path)
    }
}

fn non_empty(text: &Option<String>) -> Option<String> {
    text.as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn legacy_timestamp(entry: &LegacyEntry, now: i64) -> i64 {
    entry
        .timestamp
        .filter(|ts| ts.is_finite() && *ts > 0.0)
        .map(|ts| ts as i64)
        .unwrap_or(now)
}

/// 把旧版数据写入新表
///
/// 语言对经过归一化；归一化时回退到默认方向的条目、缺少原文或译文的条目
/// 都计为跳过。
pub fn write_legacy_data(
    txn: &WriteTransaction,
    source: &str,
    data: &LegacyData,
) -> CacheResult<MigrationReport> {
    let now = Utc::now().timestamp_millis();
    let mut report = MigrationReport {
        source: source.to_string(),
        ..MigrationReport::default()
    };

    for (_, entry) in &data.translations {
        let resolution = normalize_language_pair(
            entry.source_language.as_deref(),
            entry.target_language.as_deref(),
        );
        let (Some(original), Some(translated)) =
            (non_empty(&entry.original_text), non_empty(&entry.translated_text))
        else {
            report.skipped += 1;
            continue;
        };
        if resolution.fell_back {
            report.skipped += 1;
            continue;
        }

        let pair = resolution.pair;
        let record = TranslationRecord {
            cache_key: cache_key(
                &original,
                pair.target.as_str(),
                Some(pair.source.as_str()),
            ),
            original_text: original,
            translated_text: translated,
            source_language: pair.source.to_string(),
            target_language: pair.target.to_string(),
            message_type: entry
                .message_type
                .clone()
                .unwrap_or_else(|| constants::MIGRATED_MESSAGE_TYPE.to_string()),
            timestamp: legacy_timestamp(entry, now),
        };
        tables::put_record(txn, &record)?;
        report.migrated += 1;
    }

    for (text_hash, entry) in &data.reverse_translations {
        let resolution = normalize_language_pair(
            entry.source_language.as_deref(),
            entry.target_language.as_deref(),
        );
        let (Some(original), Some(translated)) =
            (non_empty(&entry.original_text), non_empty(&entry.translated_text))
        else {
            report.reverse_skipped += 1;
            continue;
        };
        if resolution.fell_back || text_hash.is_empty() {
            report.reverse_skipped += 1;
            continue;
        }

        let pair = resolution.pair;
        let record = ReverseTranslationRecord {
            text_hash: text_hash.clone(),
            original_text: original,
            translated_text: translated,
            source_language: pair.source.to_string(),
            target_language: pair.target.to_string(),
            message_type: entry
                .message_type
                .clone()
                .unwrap_or_else(|| constants::MIGRATED_MESSAGE_TYPE.to_string()),
            original_message_hash: entry.original_message_hash.clone().unwrap_or_default(),
            timestamp: legacy_timestamp(entry, now),
        };
        tables::put_record(txn, &record)?;
        report.reverse_migrated += 1;
    }

    // 无法解析的元素也算作跳过
    report.skipped += data.malformed;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_legacy_data_counts_malformed_items() {
        let translations = json!([
            ["hello_DE_EN", {"originalText": "Hello", "translatedText": "Hallo"}],
            "not a pair",
            ["only-key"]
        ]);
        let data = LegacyData::from_values(Some(&translations), None);
        assert_eq!(data.translations.len(), 1);
        assert_eq!(data.malformed, 2);
        assert!(data.reverse_translations.is_empty());
    }

    #[test]
    fn test_extension_file_without_data_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extension.json");
        std::fs::write(&path, r#"{"maloum_translations_cache": []}"#).unwrap();

        let source = ExtensionStorageFile::new(&path);
        assert!(source.load().unwrap().is_none());

        let missing = ExtensionStorageFile::new(dir.path().join("missing.json"));
        assert!(missing.load().unwrap().is_none());
    }

    #[test]
    fn test_local_storage_file_decodes_nested_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        let inner = json!([["hallo_EN_DE", {"originalText": "Hallo", "translatedText": "Hello",
            "sourceLanguage": "DE", "targetLanguage": "EN"}]]);
        let outer = json!({
            "maloum_translations_cache": inner.to_string(),
            "unrelated": "keep me"
        });
        std::fs::write(&path, outer.to_string()).unwrap();

        let source = LocalStorageFile::new(&path);
        let data = source.load().unwrap().unwrap();
        assert_eq!(data.translations.len(), 1);
        assert_eq!(data.translations[0].0, "hallo_EN_DE");

        source.purge().unwrap();
        assert!(source.load().unwrap().is_none());
        let remaining: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(remaining["unrelated"], "keep me");
    }

    #[test]
    fn test_non_object_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let source = ExtensionStorageFile::new(&path);
        assert!(matches!(source.load(), Err(CacheError::MigrationError(_))));
    }
}
