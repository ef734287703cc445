//! 内存读穿层
//!
//! 正向与反向各一个有界 LRU 缓存。读取时先查这里，写入成功后再更新这里。

use std::num::NonZeroUsize;

use lru::LruCache;

use super::record::{ReverseTranslationRecord, StoredRecord, TranslationRecord};
use crate::config::constants;

/// 内存层统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub evictions: u64,
    pub clears: u64,
}

/// 正向 / 反向 LRU 缓存
pub struct MemoryLayer {
    forward: LruCache<String, TranslationRecord>,
    reverse: LruCache<String, ReverseTranslationRecord>,
    stats: MemoryStats,
}

impl MemoryLayer {
    /// 创建新的内存层，容量为0时使用默认容量
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or_else(|| NonZeroUsize::new(constants::DEFAULT_MEMORY_CACHE_SIZE))
            .unwrap_or(NonZeroUsize::MIN);

        Self {
            forward: LruCache::new(capacity),
            reverse: LruCache::new(capacity),
            stats: MemoryStats::default(),
        }
    }

    /// 获取正向条目，语言对无效的条目会被丢弃
    pub fn get_forward(&mut self, key: &str) -> Option<TranslationRecord> {
        match self.forward.get(key) {
            Some(record) if record.has_valid_pair() => {
                self.stats.hits += 1;
                Some(record.clone())
            }
            Some(_) => {
                self.forward.pop(key);
                self.stats.misses += 1;
                None
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// 获取反向条目，语言对无效的条目会被丢弃
    pub fn get_reverse(&mut self, hash: &str) -> Option<ReverseTranslationRecord> {
        match self.reverse.get(hash) {
            Some(record) if record.has_valid_pair() => {
                self.stats.hits += 1;
                Some(record.clone())
            }
            Some(_) => {
                self.reverse.pop(hash);
                self.stats.misses += 1;
                None
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// 按顺序尝试多个键，返回第一个有效条目（只计一次命中或未命中）
    pub fn find_forward<'a>(
        &mut self,
        keys: impl IntoIterator<Item = &'a str>,
    ) -> Option<TranslationRecord> {
        for key in keys {
            match self.forward.get(key) {
                Some(record) if record.has_valid_pair() => {
                    self.stats.hits += 1;
                    return Some(record.clone());
                }
                Some(_) => {
                    self.forward.pop(key);
                }
                None => {}
            }
        }
        self.stats.misses += 1;
        None
    }

    pub fn put_forward(&mut self, key: String, record: TranslationRecord) {
        // push 在键已存在时也会返回旧值，只有旧键已不在缓存中才算淘汰
        if self
            .forward
            .push(key, record)
            .is_some_and(|(old_key, _)| self.forward.peek(&old_key).is_none())
        {
            self.stats.evictions += 1;
        }
        self.stats.sets += 1;
    }

    pub fn put_reverse(&mut self, hash: String, record: ReverseTranslationRecord) {
        if self
            .reverse
            .push(hash, record)
            .is_some_and(|(old_key, _)| self.reverse.peek(&old_key).is_none())
        {
            self.stats.evictions += 1;
        }
        self.stats.sets += 1;
    }

    pub fn remove_forward(&mut self, key: &str) -> bool {
        self.forward.pop(key).is_some()
    }

    pub fn remove_reverse(&mut self, hash: &str) -> bool {
        self.reverse.pop(hash).is_some()
    }

    /// 清空两个缓存
    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
        self.stats.clears += 1;
    }

    pub fn forward_len(&self) -> usize {
        self.forward.len()
    }

    pub fn reverse_len(&self) -> usize {
        self.reverse.len()
    }

    /// 正向条目快照（不影响 LRU 顺序）
    pub fn forward_entries(&self) -> Vec<(String, TranslationRecord)> {
        self.forward
            .iter()
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect()
    }

    /// 反向条目快照（不影响 LRU 顺序）
    pub fn reverse_entries(&self) -> Vec<(String, ReverseTranslationRecord)> {
        self.reverse
            .iter()
            .map(|(hash, record)| (hash.clone(), record.clone()))
            .collect()
    }

    pub fn stats(&self) -> MemoryStats {
        self.stats
    }
}
