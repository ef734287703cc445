//! 语言对处理
//!
//! 缓存只支持一个双向语言对：EN→DE 与 DE→EN。任何其它组合都不允许持久化。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// 自动检测哨兵值
pub const AUTO: &str = "AUTO";

/// 支持的语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    En,
    De,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "EN",
            Language::De => "DE",
        }
    }

    /// 语言对中的另一种语言
    pub fn opposite(&self) -> Language {
        match self {
            Language::En => Language::De,
            Language::De => Language::En,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = CacheError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "EN" => Ok(Language::En),
            "DE" => Ok(Language::De),
            other => Err(CacheError::InvalidInput(format!("不支持的语言: {}", other))),
        }
    }
}

/// 有效的翻译方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LanguagePair {
    pub source: Language,
    pub target: Language,
}

impl LanguagePair {
    /// 默认方向 EN→DE
    pub const DEFAULT: LanguagePair = LanguagePair {
        source: Language::En,
        target: Language::De,
    };

    /// 源语言与目标语言必须不同
    pub fn new(source: Language, target: Language) -> Option<Self> {
        (source != target).then_some(Self { source, target })
    }

    /// 从字符串解析，大小写不敏感；不合法时返回 None
    pub fn parse(source: &str, target: &str) -> Option<Self> {
        let source = source.parse::<Language>().ok()?;
        let target = target.parse::<Language>().ok()?;
        Self::new(source, target)
    }

    pub fn reversed(&self) -> Self {
        Self {
            source: self.target,
            target: self.source,
        }
    }

    /// 两个方向：EN→DE 与 DE→EN
    pub fn all() -> [LanguagePair; 2] {
        [LanguagePair::DEFAULT, LanguagePair::DEFAULT.reversed()]
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}→{}", self.source, self.target)
    }
}

/// 语言对归一化结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairResolution {
    pub pair: LanguagePair,
    /// 输入无法解析为有效方向，已回退到默认的 EN→DE
    pub fell_back: bool,
}

/// 检查语言对是否在支持范围内（大小写不敏感）
pub fn is_valid_pair(source: &str, target: &str) -> bool {
    LanguagePair::parse(source, target).is_some()
}

/// 归一化语言对
///
/// 两侧转为大写；`AUTO` 解析为另一侧语言的反向语言。缺省源语言视为 `AUTO`，
/// 缺省目标语言视为 `DE`。结果不合法时回退到 EN→DE，并通过 `fell_back`
/// 标记这一情况，调用方不能依赖回退来判断输入是否有效。
pub fn normalize_language_pair(source: Option<&str>, target: Option<&str>) -> PairResolution {
    let source = source.unwrap_or(AUTO).trim().to_uppercase();
    let target = target.unwrap_or("DE").trim().to_uppercase();

    if source == AUTO && target == AUTO {
        tracing::debug!("语言对两侧均为 AUTO，回退到默认方向");
        return PairResolution {
            pair: LanguagePair::DEFAULT,
            fell_back: true,
        };
    }

    let resolved_source = if source == AUTO {
        let opposite = if target == "EN" { "DE" } else { "EN" };
        opposite.to_string()
    } else {
        source.clone()
    };
    let resolved_target = if target == AUTO {
        let opposite = if resolved_source == "EN" { "DE" } else { "EN" };
        opposite.to_string()
    } else {
        target.clone()
    };

    match LanguagePair::parse(&resolved_source, &resolved_target) {
        Some(pair) => PairResolution {
            pair,
            fell_back: false,
        },
        None => {
            tracing::debug!(
                "不支持的语言对 {} -> {}，回退到默认方向 EN→DE",
                source,
                target
            );
            PairResolution {
                pair: LanguagePair::DEFAULT,
                fell_back: true,
            }
        }
    }
}
