//! 持久化记录类型
//!
//! 记录以 camelCase JSON 编码写入 redb，字段名与旧版导出格式保持一致。
//! 语言字段保留为字符串，以便检测并清理历史遗留的无效语言对。

use redb::{MultimapTableDefinition, TableDefinition};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::tables;
use crate::config::constants;
use crate::keys::normalize_text;
use crate::language::is_valid_pair;

/// 正向翻译记录，主键为 `cache_key`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRecord {
    pub cache_key: String,
    pub original_text: String,
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    #[serde(default)]
    pub timestamp: i64,
}

/// 反向翻译记录，主键为译文的 `text_hash`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseTranslationRecord {
    pub text_hash: String,
    pub original_text: String,
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    /// 指向正向记录的 `cache_key`（仅为引用，不代表所有权）
    #[serde(default)]
    pub original_message_hash: String,
    #[serde(default)]
    pub timestamp: i64,
}

/// 自定义表情数组，固定ID的单条记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmojiBlob {
    pub id: String,
    pub emojis: Vec<String>,
    #[serde(default)]
    pub timestamp: i64,
}

fn default_message_type() -> String {
    constants::DEFAULT_MESSAGE_TYPE.to_string()
}

/// 二级索引定义：索引值 → 主键
pub struct IndexSpec<R> {
    pub name: &'static str,
    pub table: MultimapTableDefinition<'static, &'static str, &'static str>,
    pub extract: fn(&R) -> String,
}

/// 可写入主表并维护二级索引的记录
pub trait StoredRecord: Serialize + DeserializeOwned + Clone + Send + 'static {
    const TABLE: TableDefinition<'static, &'static str, &'static [u8]>;

    fn primary_key(&self) -> &str;
    fn source_language(&self) -> &str;
    fn target_language(&self) -> &str;
    fn timestamp(&self) -> i64;
    fn indexes() -> &'static [IndexSpec<Self>];

    /// 语言对是否在 EN↔DE 范围内
    fn has_valid_pair(&self) -> bool {
        is_valid_pair(self.source_language(), self.target_language())
    }
}

/// 时间戳索引键：补零到固定宽度，保证字典序与时间顺序一致
pub fn timestamp_index_key(timestamp: i64) -> String {
    format!("{:020}", timestamp.max(0))
}

fn forward_original(record: &TranslationRecord) -> String {
    normalize_text(&record.original_text)
}

fn forward_translated(record: &TranslationRecord) -> String {
    normalize_text(&record.translated_text)
}

fn forward_source(record: &TranslationRecord) -> String {
    record.source_language.clone()
}

fn forward_target(record: &TranslationRecord) -> String {
    record.target_language.clone()
}

fn forward_timestamp(record: &TranslationRecord) -> String {
    timestamp_index_key(record.timestamp)
}

fn forward_message_type(record: &TranslationRecord) -> String {
    record.message_type.clone()
}

fn reverse_translated(record: &ReverseTranslationRecord) -> String {
    normalize_text(&record.translated_text)
}

fn reverse_original(record: &ReverseTranslationRecord) -> String {
    normalize_text(&record.original_text)
}

fn reverse_timestamp(record: &ReverseTranslationRecord) -> String {
    timestamp_index_key(record.timestamp)
}

static FORWARD_INDEXES: [IndexSpec<TranslationRecord>; 6] = [
    IndexSpec {
        name: "originalText",
        table: tables::FORWARD_ORIGINAL_INDEX,
        extract: forward_original,
    },
    IndexSpec {
        name: "translatedText",
        table: tables::FORWARD_TRANSLATED_INDEX,
        extract: forward_translated,
    },
    IndexSpec {
        name: "sourceLanguage",
        table: tables::FORWARD_SOURCE_INDEX,
        extract: forward_source,
    },
    IndexSpec {
        name: "targetLanguage",
        table: tables::FORWARD_TARGET_INDEX,
        extract: forward_target,
    },
    IndexSpec {
        name: "timestamp",
        table: tables::FORWARD_TIMESTAMP_INDEX,
        extract: forward_timestamp,
    },
    IndexSpec {
        name: "messageType",
        table: tables::FORWARD_MESSAGE_TYPE_INDEX,
        extract: forward_message_type,
    },
];

static REVERSE_INDEXES: [IndexSpec<ReverseTranslationRecord>; 3] = [
    IndexSpec {
        name: "translatedText",
        table: tables::REVERSE_TRANSLATED_INDEX,
        extract: reverse_translated,
    },
    IndexSpec {
        name: "originalText",
        table: tables::REVERSE_ORIGINAL_INDEX,
        extract: reverse_original,
    },
    IndexSpec {
        name: "timestamp",
        table: tables::REVERSE_TIMESTAMP_INDEX,
        extract: reverse_timestamp,
    },
];

impl StoredRecord for TranslationRecord {
    const TABLE: TableDefinition<'static, &'static str, &'static [u8]> = tables::TRANSLATIONS;

    fn primary_key(&self) -> &str {
        &self.cache_key
    }

    fn source_language(&self) -> &str {
        &self.source_language
    }

    fn target_language(&self) -> &str {
        &self.target_language
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn indexes() -> &'static [IndexSpec<Self>] {
        &FORWARD_INDEXES
    }
}

impl StoredRecord for ReverseTranslationRecord {
    const TABLE: TableDefinition<'static, &'static str, &'static [u8]> =
        tables::REVERSE_TRANSLATIONS;

    fn primary_key(&self) -> &str {
        &self.text_hash
    }

    fn source_language(&self) -> &str {
        &self.source_language
    }

    fn target_language(&self) -> &str {
        &self.target_language
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn indexes() -> &'static [IndexSpec<Self>] {
        &REVERSE_INDEXES
    }
}

impl StoredRecord for EmojiBlob {
    const TABLE: TableDefinition<'static, &'static str, &'static [u8]> = tables::EMOJIS;

    fn primary_key(&self) -> &str {
        &self.id
    }

    fn source_language(&self) -> &str {
        ""
    }

    fn target_language(&self) -> &str {
        ""
    }

    // 表情数据与语言无关
    fn has_valid_pair(&self) -> bool {
        true
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn indexes() -> &'static [IndexSpec<Self>] {
        &[]
    }
}
