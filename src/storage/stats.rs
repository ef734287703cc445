//! 缓存统计
//!
//! 正常情况下从持久化表计算；存储不可用时退化为只根据内存层计算，
//! 返回同样结构的统计结果并标记 `degraded`。

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::memory::MemoryLayer;
use super::record::{ReverseTranslationRecord, StoredRecord, TranslationRecord};
use crate::config::constants;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// 缓存统计信息
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_entries: usize,
    pub reverse_entries: usize,
    /// 被过滤掉的无效正向条目数
    pub invalid_entries_skipped: usize,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
    pub actual_size_bytes: usize,
    #[serde(rename = "actualSizeMB")]
    pub actual_size_mb: f64,
    pub storage_type: String,
    pub supported_language_pairs: String,
    /// 根据内存层计算（存储不可用）
    pub degraded: bool,
}

impl CacheStats {
    /// 空统计
    pub fn empty(storage_type: &str, degraded: bool) -> Self {
        Self {
            total_entries: 0,
            reverse_entries: 0,
            invalid_entries_skipped: 0,
            oldest_entry: None,
            newest_entry: None,
            actual_size_bytes: 0,
            actual_size_mb: 0.0,
            storage_type: storage_type.to_string(),
            supported_language_pairs: constants::SUPPORTED_PAIRS_LABEL.to_string(),
            degraded,
        }
    }

    /// 根据全部记录计算统计，只统计语言对有效的记录
    pub fn compute(
        forward: &[TranslationRecord],
        reverse: &[ReverseTranslationRecord],
        storage_type: &str,
    ) -> Self {
        let valid_forward: Vec<&TranslationRecord> =
            forward.iter().filter(|r| r.has_valid_pair()).collect();
        let valid_reverse: Vec<&ReverseTranslationRecord> =
            reverse.iter().filter(|r| r.has_valid_pair()).collect();

        let mut stats = Self::empty(storage_type, false);
        stats.total_entries = valid_forward.len();
        stats.reverse_entries = valid_reverse.len();
        stats.invalid_entries_skipped = forward.len() - valid_forward.len();
        stats.set_size(serialized_size(&valid_forward) + serialized_size(&valid_reverse));
        stats.set_time_range(valid_forward.iter().map(|r| r.timestamp));
        stats
    }

    /// 退化统计：只根据内存层计算
    pub fn from_memory(memory: &MemoryLayer) -> Self {
        let forward: Vec<(String, TranslationRecord)> = memory
            .forward_entries()
            .into_iter()
            .filter(|(_, r)| r.has_valid_pair())
            .collect();
        let reverse: Vec<(String, ReverseTranslationRecord)> = memory
            .reverse_entries()
            .into_iter()
            .filter(|(_, r)| r.has_valid_pair())
            .collect();

        let mut stats = Self::empty(constants::DEGRADED_STORAGE_TYPE_LABEL, true);
        stats.total_entries = forward.len();
        stats.reverse_entries = reverse.len();
        if forward.is_empty() {
            return stats;
        }

        stats.set_size(serialized_size(&forward) + serialized_size(&reverse));
        stats.set_time_range(forward.iter().map(|(_, r)| r.timestamp));
        stats
    }

    fn set_size(&mut self, bytes: usize) {
        self.actual_size_bytes = bytes;
        self.actual_size_mb = (bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0;
    }

    fn set_time_range(&mut self, timestamps: impl Iterator<Item = i64>) {
        let (oldest, newest) = timestamps
            .filter(|ts| *ts > 0)
            .fold((None, None), |(min, max): (Option<i64>, Option<i64>), ts| {
                (
                    Some(min.map_or(ts, |m| m.min(ts))),
                    Some(max.map_or(ts, |m| m.max(ts))),
                )
            });
        self.oldest_entry = oldest.and_then(DateTime::<Utc>::from_timestamp_millis);
        self.newest_entry = newest.and_then(DateTime::<Utc>::from_timestamp_millis);
    }
}

fn serialized_size<T: Serialize>(records: &T) -> usize {
    match serde_json::to_vec(records) {
        Ok(bytes) => bytes.len(),
        Err(e) => {
            tracing::warn!("计算缓存大小失败: {}", e);
            0
        }
    }
}
