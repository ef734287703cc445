//! 翻译缓存存储
//!
//! - `record` - 持久化记录与索引定义
//! - `tables` - redb 表结构、事务与索引维护
//! - `memory` - LRU 内存读穿层
//! - `legacy` - 旧版平面存储迁移
//! - `stats` - 统计计算
//! - `transfer` - JSON / CSV 导入导出
//! - `store` - 对外的缓存组件

pub mod legacy;
pub mod memory;
pub mod record;
pub mod stats;
pub mod store;
pub mod tables;
pub mod transfer;

pub use legacy::{
    ExtensionStorageFile, LegacyData, LegacyEntry, LegacySource, LocalStorageFile,
    MigrationReport,
};
pub use memory::{MemoryLayer, MemoryStats};
pub use record::{
    EmojiBlob, ReverseTranslationRecord, StoredRecord, TranslationRecord,
};
pub use stats::CacheStats;
pub use store::{
    CacheCheck, LookupCounters, MatchType, SearchOptions, SearchResult, TranslationCacheStore,
};
pub use transfer::{ExportDocument, ImportReport, TransferFormat};
