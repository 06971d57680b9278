//! 规则操作符定义

use crate::error::UnknownOperator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 条件操作符
///
/// 序列化形式与持久化规则中的 `operator` 字段保持一致（如 `">="`、`"any_ends"`）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    // 通用比较
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Neq,

    // 有序比较
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<=")]
    Lte,

    // 字符串操作
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "not_contains")]
    NotContains,
    #[serde(rename = "starts_with")]
    StartsWith,
    #[serde(rename = "ends_with")]
    EndsWith,
    #[serde(rename = "regex")]
    Regex,

    // 空值检查
    #[serde(rename = "empty")]
    Empty,
    #[serde(rename = "not_empty")]
    NotEmpty,

    // 布尔
    #[serde(rename = "yes")]
    Yes,
    #[serde(rename = "no")]
    No,

    // 集合
    #[serde(rename = "any")]
    AnyOf,
    #[serde(rename = "none")]
    NoneOf,
    #[serde(rename = "all")]
    AllOf,

    // 标签模式
    #[serde(rename = "any_ends")]
    AnyEnds,
    #[serde(rename = "any_starts")]
    AnyStarts,
    #[serde(rename = "any_contains")]
    AnyContains,
    #[serde(rename = "any_exact")]
    AnyExact,
    #[serde(rename = "none_ends")]
    NoneEnds,
    #[serde(rename = "none_starts")]
    NoneStarts,
    #[serde(rename = "none_contains")]
    NoneContains,
    #[serde(rename = "none_exact")]
    NoneExact,

    // 地址模式
    #[serde(rename = "ip_match")]
    IpMatch,
    #[serde(rename = "ip_not_match")]
    IpNotMatch,
    #[serde(rename = "email_match")]
    EmailMatch,
    #[serde(rename = "email_not_match")]
    EmailNotMatch,
}

/// 标签模式的匹配方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternMode {
    Ends,
    Starts,
    Contains,
    Exact,
}

impl Operator {
    pub const ALL: [Operator; 30] = [
        Self::Eq,
        Self::Neq,
        Self::Gt,
        Self::Lt,
        Self::Gte,
        Self::Lte,
        Self::Contains,
        Self::NotContains,
        Self::StartsWith,
        Self::EndsWith,
        Self::Regex,
        Self::Empty,
        Self::NotEmpty,
        Self::Yes,
        Self::No,
        Self::AnyOf,
        Self::NoneOf,
        Self::AllOf,
        Self::AnyEnds,
        Self::AnyStarts,
        Self::AnyContains,
        Self::AnyExact,
        Self::NoneEnds,
        Self::NoneStarts,
        Self::NoneContains,
        Self::NoneExact,
        Self::IpMatch,
        Self::IpNotMatch,
        Self::EmailMatch,
        Self::EmailNotMatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Regex => "regex",
            Self::Empty => "empty",
            Self::NotEmpty => "not_empty",
            Self::Yes => "yes",
            Self::No => "no",
            Self::AnyOf => "any",
            Self::NoneOf => "none",
            Self::AllOf => "all",
            Self::AnyEnds => "any_ends",
            Self::AnyStarts => "any_starts",
            Self::AnyContains => "any_contains",
            Self::AnyExact => "any_exact",
            Self::NoneEnds => "none_ends",
            Self::NoneStarts => "none_starts",
            Self::NoneContains => "none_contains",
            Self::NoneExact => "none_exact",
            Self::IpMatch => "ip_match",
            Self::IpNotMatch => "ip_not_match",
            Self::EmailMatch => "email_match",
            Self::EmailNotMatch => "email_not_match",
        }
    }

    /// 操作符是否完全不读取阈值
    pub fn ignores_threshold(&self) -> bool {
        matches!(self, Self::Empty | Self::NotEmpty | Self::Yes | Self::No)
    }

    /// 拆分标签模式操作符：返回 (是否为 any 极性, 匹配方式)
    pub fn pattern_mode(&self) -> Option<(bool, PatternMode)> {
        let parts = match self {
            Self::AnyEnds => (true, PatternMode::Ends),
            Self::AnyStarts => (true, PatternMode::Starts),
            Self::AnyContains => (true, PatternMode::Contains),
            Self::AnyExact => (true, PatternMode::Exact),
            Self::NoneEnds => (false, PatternMode::Ends),
            Self::NoneStarts => (false, PatternMode::Starts),
            Self::NoneContains => (false, PatternMode::Contains),
            Self::NoneExact => (false, PatternMode::Exact),
            _ => return None,
        };
        Some(parts)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == token)
            .ok_or_else(|| UnknownOperator(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_agree() {
        for op in Operator::ALL {
            assert_eq!(op.as_str().parse::<Operator>().unwrap(), op);
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(json, format!("\"{}\"", op));
        }
    }

    #[test]
    fn test_unknown_operator() {
        let err = "between".parse::<Operator>().unwrap_err();
        assert_eq!(err.0, "between");
    }

    #[test]
    fn test_pattern_mode() {
        assert_eq!(
            Operator::AnyEnds.pattern_mode(),
            Some((true, PatternMode::Ends))
        );
        assert_eq!(
            Operator::NoneExact.pattern_mode(),
            Some((false, PatternMode::Exact))
        );
        assert_eq!(Operator::Contains.pattern_mode(), None);
    }
}
