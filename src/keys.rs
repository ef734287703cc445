//! 缓存键生成
//!
//! 所有把文本转换为键或进行比较的地方都必须使用同一个 `normalize_text`。
//! 键格式需与已持久化的数据保持兼容：`文本_目标语言_源语言`。

use std::sync::LazyLock;

use regex::Regex;

use crate::language::{normalize_language_pair, AUTO};

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

// 保留 ASCII 单词字符、空白以及 Latin-1 补充 / Latin 扩展 A、B
static NON_KEY_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9_\s\x{00C0}-\x{024F}]").expect("key character pattern is valid")
});

/// 固定的旧版键后缀，用于兼容旧数据和方向不明确的条目
const LEGACY_KEY_SUFFIXES: [&str; 6] = ["DE_EN", "EN_DE", "DE_AUTO", "EN_AUTO", "AUTO_DE", "AUTO_EN"];

/// 文本归一化：去首尾空白 → 小写 → 合并空白 → 去除标点 → 再去首尾空白
pub fn normalize_text(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let collapsed = WHITESPACE.replace_all(&lowered, " ");
    let stripped = NON_KEY_CHARS.replace_all(&collapsed, "");
    stripped.trim().to_string()
}

/// 生成缓存键，语言对先经过归一化
pub fn cache_key(text: &str, target: &str, source: Option<&str>) -> String {
    let resolved = normalize_language_pair(source, Some(target));
    format!(
        "{}_{}_{}",
        normalize_text(text),
        resolved.pair.target,
        resolved.pair.source
    )
}

/// 生成查找时需要尝试的所有键，请求的键排在最前面
pub fn possible_keys(text: &str, target: &str, source: Option<&str>) -> Vec<String> {
    let normalized = normalize_text(text);
    let resolved = normalize_language_pair(source, Some(target));

    let mut keys = Vec::with_capacity(LEGACY_KEY_SUFFIXES.len() + 1);
    keys.push(format!(
        "{}_{}_{}",
        normalized, resolved.pair.target, resolved.pair.source
    ));
    for suffix in LEGACY_KEY_SUFFIXES {
        let key = format!("{}_{}", normalized, suffix);
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

/// 反向索引使用的32位滚动哈希（非加密，允许碰撞）
///
/// 按 UTF-16 码元计算 `hash * 31 + unit`，截断为有符号32位整数。
pub fn text_hash(text: &str) -> String {
    let normalized = normalize_text(text);
    let mut hash: i32 = 0;
    for unit in normalized.encode_utf16() {
        hash = (hash << 5).wrapping_sub(hash).wrapping_add(i32::from(unit));
    }
    hash.to_string()
}

/// 特定消息的哈希：以 AUTO 为源语言的缓存键加上消息类型
pub fn message_hash(text: &str, target: &str, message_type: Option<&str>) -> String {
    let resolved = normalize_language_pair(Some(AUTO), Some(target));
    format!(
        "{}_{}",
        cache_key(
            text,
            resolved.pair.target.as_str(),
            Some(resolved.pair.source.as_str())
        ),
        message_type.unwrap_or("message")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Hello,   World!  "), "hello world");
        assert_eq!(normalize_text("Guten\tMorgen\n"), "guten morgen");
        assert_eq!(normalize_text("Grüße aus Köln!"), "grüße aus köln");
        assert_eq!(normalize_text("¿Qué?"), "qué");
        assert_eq!(normalize_text("a - b"), "a  b");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn test_cache_key_is_deterministic() {
        let first = cache_key("Hello there", "DE", Some("EN"));
        let second = cache_key("Hello there", "DE", Some("EN"));
        assert_eq!(first, second);
        assert_eq!(first, "hello there_DE_EN");
    }

    #[test]
    fn test_cache_key_target_before_source() {
        assert_eq!(cache_key("Hallo", "EN", Some("DE")), "hallo_EN_DE");
        assert_eq!(cache_key("Hallo", "en", Some("auto")), "hallo_EN_DE");
        assert_eq!(cache_key("Hello", "DE", None), "hello_DE_EN");
        // 不支持的语言对回退到 EN→DE
        assert_eq!(cache_key("Bonjour", "FR", Some("EN")), "bonjour_DE_EN");
    }

    #[test]
    fn test_possible_keys_prioritize_request() {
        let keys = possible_keys("Hallo", "EN", Some("DE"));
        assert_eq!(keys[0], "hallo_EN_DE");
        assert_eq!(keys.len(), 6);
        assert!(keys.contains(&"hallo_DE_EN".to_string()));
        assert!(keys.contains(&"hallo_AUTO_EN".to_string()));
        let unique: std::collections::HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len());
    }

    #[test]
    fn test_text_hash_matches_rolling_hash() {
        assert_eq!(text_hash(""), "0");
        assert_eq!(text_hash("a"), "97");
        // 31 * 97 + 98
        assert_eq!(text_hash("ab"), "3105");
        assert_eq!(text_hash("  AB!"), "3105");
        // 溢出后按32位截断
        assert_eq!(text_hash("hallo welt"), "1330147168");
        assert_eq!(text_hash("Guten Morgen"), "1428211473");
        assert_eq!(text_hash("Good morning!"), "-1001961631");
    }

    #[test]
    fn test_message_hash() {
        assert_eq!(message_hash("Hi!", "DE", None), "hi_DE_EN_message");
        assert_eq!(message_hash("Hi", "EN", Some("chat")), "hi_EN_DE_chat");
    }
}
