//! 导入导出
//!
//! 导出支持带元数据的 JSON 文档和只含正向记录的 CSV 表格；导入时逐条校验，
//! 有效的记录再交给与实时翻译相同的写入路径。

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::record::{ReverseTranslationRecord, StoredRecord, TranslationRecord};
use crate::config::constants;
use crate::error::{CacheError, CacheResult};
use crate::keys::cache_key;
use crate::language::LanguagePair;

const CSV_HEADERS: [&str; 7] = [
    "Hash",
    "Original Text",
    "Translated Text",
    "Source Language",
    "Target Language",
    "Message Type",
    "Timestamp",
];

/// 导入导出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFormat {
    Json,
    Csv,
}

impl fmt::Display for TransferFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferFormat::Json => f.write_str("json"),
            TransferFormat::Csv => f.write_str("csv"),
        }
    }
}

impl FromStr for TransferFormat {
    type Err = CacheError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "json" => Ok(TransferFormat::Json),
            "csv" => Ok(TransferFormat::Csv),
            other => Err(CacheError::InvalidInput(format!("不支持的格式: {}", other))),
        }
    }
}

/// 导出的正向记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedTranslation {
    pub hash: String,
    pub original_text: String,
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub message_type: String,
    pub timestamp: i64,
}

/// 导出的反向记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedReverseTranslation {
    pub hash: String,
    pub original_text: String,
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub message_type: String,
    pub original_message_hash: String,
    pub timestamp: i64,
}

/// 导出条目计数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredEntries {
    pub total_exported: usize,
    pub translations_exported: usize,
    pub reverse_translations_exported: usize,
    pub invalid_entries_skipped: usize,
}

/// JSON 导出文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub translations: Vec<ExportedTranslation>,
    pub reverse_translations: Vec<ExportedReverseTranslation>,
    pub export_date: String,
    pub version: String,
    pub storage_type: String,
    pub supported_language_pairs: String,
    pub filtered_entries: FilteredEntries,
}

impl ExportDocument {
    /// 只导出语言对有效的记录
    pub fn build(
        forward: &[TranslationRecord],
        reverse: &[ReverseTranslationRecord],
        storage_type: &str,
    ) -> Self {
        let translations: Vec<ExportedTranslation> = forward
            .iter()
            .filter(|r| r.has_valid_pair())
            .map(|r| ExportedTranslation {
                hash: r.cache_key.clone(),
                original_text: r.original_text.clone(),
                translated_text: r.translated_text.clone(),
                source_language: r.source_language.clone(),
                target_language: r.target_language.clone(),
                message_type: r.message_type.clone(),
                timestamp: r.timestamp,
            })
            .collect();

        let reverse_translations: Vec<ExportedReverseTranslation> = reverse
            .iter()
            .filter(|r| r.has_valid_pair())
            .map(|r| ExportedReverseTranslation {
                hash: r.text_hash.clone(),
                original_text: r.original_text.clone(),
                translated_text: r.translated_text.clone(),
                source_language: r.source_language.clone(),
                target_language: r.target_language.clone(),
                message_type: r.message_type.clone(),
                original_message_hash: r.original_message_hash.clone(),
                timestamp: r.timestamp,
            })
            .collect();

        let invalid = (forward.len() - translations.len())
            + (reverse.len() - reverse_translations.len());

        Self {
            filtered_entries: FilteredEntries {
                total_exported: translations.len() + reverse_translations.len(),
                translations_exported: translations.len(),
                reverse_translations_exported: reverse_translations.len(),
                invalid_entries_skipped: invalid,
            },
            translations,
            reverse_translations,
            export_date: Utc::now().to_rfc3339(),
            version: constants::EXPORT_VERSION.to_string(),
            storage_type: storage_type.to_string(),
            supported_language_pairs: constants::SUPPORTED_PAIRS_LABEL.to_string(),
        }
    }

    pub fn to_json(&self) -> CacheResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// CSV 只包含正向记录
    pub fn to_csv(&self) -> String {
        let mut lines = Vec::with_capacity(self.translations.len() + 1);
        lines.push(CSV_HEADERS.join(","));

        for entry in &self.translations {
            let row = [
                quote(&entry.hash),
                quote(&entry.original_text),
                quote(&entry.translated_text),
                quote(&entry.source_language),
                quote(&entry.target_language),
                quote(&entry.message_type),
                quote(&entry.timestamp.to_string()),
            ];
            lines.push(row.join(","));
        }

        lines.join("\n")
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// 通过校验的导入记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCandidate {
    pub hash: String,
    pub original_text: String,
    pub translated_text: String,
    pub pair: LanguagePair,
    pub message_type: String,
}

/// 导入结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub success: bool,
    pub imported: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportReport {
    pub fn failed(error: &CacheError) -> Self {
        Self {
            success: false,
            imported: 0,
            skipped: 0,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawImportRecord {
    hash: Option<String>,
    original_text: Option<String>,
    translated_text: Option<String>,
    source_language: Option<String>,
    target_language: Option<String>,
    message_type: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl RawImportRecord {
    fn validate(self) -> CacheResult<ImportCandidate> {
        let (Some(hash), Some(original_text), Some(translated_text)) = (
            present(self.hash),
            present(self.original_text),
            present(self.translated_text),
        ) else {
            return Err(CacheError::MalformedImportRecord(
                "缺少 hash、originalText 或 translatedText".to_string(),
            ));
        };

        let source = self.source_language.unwrap_or_default();
        let target = self.target_language.unwrap_or_default();
        let pair = LanguagePair::parse(&source, &target).ok_or_else(|| {
            CacheError::InvalidLanguagePair {
                source_language: source.clone(),
                target_language: target.clone(),
            }
        })?;

        Ok(ImportCandidate {
            hash,
            original_text,
            translated_text,
            pair,
            message_type: present(self.message_type)
                .unwrap_or_else(|| constants::IMPORTED_MESSAGE_TYPE.to_string()),
        })
    }
}

/// 解析导入数据
///
/// 外层错误表示整个文档无法解析；内层错误对应单条被跳过的记录。
pub fn parse_import(
    data: &str,
    format: TransferFormat,
) -> CacheResult<Vec<CacheResult<ImportCandidate>>> {
    match format {
        TransferFormat::Json => parse_json(data),
        TransferFormat::Csv => Ok(parse_csv(data)),
    }
}

fn parse_json(data: &str) -> CacheResult<Vec<CacheResult<ImportCandidate>>> {
    let document: Value = serde_json::from_str(data)?;
    let Some(items) = document.get("translations") else {
        return Ok(Vec::new());
    };
    let items = items.as_array().ok_or_else(|| {
        CacheError::MalformedImportRecord("translations 字段不是数组".to_string())
    })?;

    Ok(items
        .iter()
        .map(|item| {
            serde_json::from_value::<RawImportRecord>(item.clone())
                .map_err(|e| CacheError::MalformedImportRecord(e.to_string()))
                .and_then(RawImportRecord::validate)
        })
        .collect())
}

fn parse_csv(data: &str) -> Vec<CacheResult<ImportCandidate>> {
    split_csv_records(data)
        .iter()
        .map(|record| record.trim_end_matches('\r'))
        .filter(|record| !record.trim().is_empty())
        // 第一条记录是表头
        .skip(1)
        .map(parse_csv_row)
        .collect()
}

/// 按记录拆分 CSV 文本，引号内的换行属于字段内容
fn split_csv_records(data: &str) -> Vec<String> {
    let mut records = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in data.chars() {
        match ch {
            // `""` 转义会连续切换两次，状态不变
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '\n' if !in_quotes => records.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        records.push(current);
    }
    records
}

fn parse_csv_row(line: &str) -> CacheResult<ImportCandidate> {
    let fields = parse_csv_line(line);

    let raw = if fields.len() >= 7 {
        let or_default = |value: &str, default: &str| {
            if value.is_empty() {
                default.to_string()
            } else {
                value.to_string()
            }
        };
        let source = or_default(&fields[3], "EN");
        let target = or_default(&fields[4], "DE");
        let hash = if fields[0].is_empty() && !fields[1].is_empty() {
            cache_key(&fields[1], &target, Some(source.as_str()))
        } else {
            fields[0].clone()
        };
        RawImportRecord {
            hash: Some(hash),
            original_text: Some(fields[1].clone()),
            translated_text: Some(fields[2].clone()),
            source_language: Some(source),
            target_language: Some(target),
            message_type: Some(or_default(&fields[5], constants::IMPORTED_MESSAGE_TYPE)),
        }
    } else if fields.len() >= 2 {
        // 旧版两列格式：默认 EN→DE
        RawImportRecord {
            hash: Some(cache_key(&fields[0], "DE", Some("EN"))),
            original_text: Some(fields[0].clone()),
            translated_text: Some(fields[1].clone()),
            source_language: Some("EN".to_string()),
            target_language: Some("DE".to_string()),
            message_type: Some(constants::IMPORTED_MESSAGE_TYPE.to_string()),
        }
    } else {
        return Err(CacheError::MalformedImportRecord(format!(
            "CSV 行字段不足: {}",
            line
        )));
    };

    raw.validate()
}

/// 解析一条 CSV 记录，支持引号内的逗号、换行与 `""` 转义
///
/// 带引号的字段原样保留（仅做转义还原），未加引号的字段去除首尾空白。
pub fn parse_csv_line(line: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    current.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => current.push(ch),
            }
            continue;
        }

        match ch {
            ',' => values.push(finish_field(&mut current, &mut quoted)),
            '"' if !quoted && current.trim().is_empty() => {
                current.clear();
                quoted = true;
                in_quotes = true;
            }
            // 闭合引号之后到逗号之前的内容忽略
            _ if quoted => {}
            _ => current.push(ch),
        }
    }
    values.push(finish_field(&mut current, &mut quoted));
    values
}

fn finish_field(current: &mut String, quoted: &mut bool) -> String {
    let value = std::mem::take(current);
    if std::mem::take(quoted) {
        value
    } else {
        value.trim().to_string()
    }
}
