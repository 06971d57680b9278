//! 条件评估器
//!
//! 按值类型族实现比较逻辑。所有比较都是失败即不匹配：
//! 实时值或阈值无法按类型解释时返回 `false`，不会产生错误。

use crate::operators::{Operator, PatternMode};
use crate::patterns::{email_matches, ip_matches};
use chrono::{DateTime, NaiveDate, NaiveTime};
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeSet;

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 文本比较（区分大小写）
    pub fn text(operator: Operator, live: &Value, threshold: &Value) -> bool {
        match operator {
            Operator::Empty => return !Self::is_truthy(live),
            Operator::NotEmpty => return Self::is_truthy(live),
            _ => {}
        }

        let (Some(live), Some(expected)) = (Self::as_text(live), Self::as_text(threshold)) else {
            return false;
        };

        match operator {
            Operator::Eq => live == expected,
            Operator::Neq => live != expected,
            Operator::Contains => live.contains(expected.as_ref()),
            Operator::NotContains => !live.contains(expected.as_ref()),
            Operator::StartsWith => live.starts_with(expected.as_ref()),
            Operator::EndsWith => live.ends_with(expected.as_ref()),
            Operator::Regex => Self::regex_match(&live, &expected),
            _ => false,
        }
    }

    /// 数值比较
    pub fn number(operator: Operator, live: &Value, threshold: &Value) -> bool {
        let (Some(a), Some(b)) = (Self::as_f64(live), Self::as_f64(threshold)) else {
            return false;
        };

        match operator {
            // 统一转为浮点数，避免 100 与 100.0 比较失败
            Operator::Eq => Self::approx_eq(a, b),
            Operator::Neq => !Self::approx_eq(a, b),
            Operator::Gt => a > b,
            Operator::Lt => a < b,
            Operator::Gte => a >= b,
            Operator::Lte => a <= b,
            _ => false,
        }
    }

    /// 布尔判断，只看实时值的真假
    pub fn boolean(operator: Operator, live: &Value) -> bool {
        match operator {
            Operator::Yes => Self::is_truthy(live),
            Operator::No => !Self::is_truthy(live),
            _ => false,
        }
    }

    /// 日期比较（`YYYY-MM-DD`）
    pub fn date(operator: Operator, live: &Value, threshold: &Value) -> bool {
        match (Self::parse_date(live), Self::parse_date(threshold)) {
            (Some(a), Some(b)) => Self::ordered(operator, a, b),
            _ => false,
        }
    }

    /// 时刻比较（`HH:MM[:SS]`）
    pub fn time(operator: Operator, live: &Value, threshold: &Value) -> bool {
        match (Self::parse_time(live), Self::parse_time(threshold)) {
            (Some(a), Some(b)) => Self::ordered(operator, a, b),
            _ => false,
        }
    }

    /// 单选值精确比较
    pub fn select(operator: Operator, live: &Value, threshold: &Value) -> bool {
        let (Some(live), Some(expected)) = (Self::as_text(live), Self::as_text(threshold)) else {
            return false;
        };

        match operator {
            Operator::Eq => live == expected,
            Operator::Neq => live != expected,
            _ => false,
        }
    }

    /// 集合比较，两侧都按去重、无序集合处理
    pub fn set(operator: Operator, live: &Value, threshold: &Value) -> bool {
        let (Some(live), Some(expected)) = (Self::to_set(live), Self::to_set(threshold)) else {
            return false;
        };
        if expected.is_empty() {
            return false;
        }

        match operator {
            Operator::AnyOf => !live.is_disjoint(&expected),
            Operator::NoneOf => live.is_disjoint(&expected),
            Operator::AllOf => expected.is_subset(&live),
            _ => false,
        }
    }

    /// 标签模式匹配：实时字符串与任意一个（或没有一个）模式相符
    pub fn tags(operator: Operator, live: &Value, threshold: &Value) -> bool {
        let Some((any, mode)) = operator.pattern_mode() else {
            return false;
        };
        let Some(live) = Self::as_text(live) else {
            return false;
        };

        let patterns: Vec<String> = Self::pattern_list(threshold)
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect();
        if patterns.is_empty() {
            return false;
        }

        let hit = patterns.iter().any(|pattern| match mode {
            PatternMode::Ends => live.ends_with(pattern.as_str()),
            PatternMode::Starts => live.starts_with(pattern.as_str()),
            PatternMode::Contains => live.contains(pattern.as_str()),
            PatternMode::Exact => live == pattern.as_str(),
        });

        if any { hit } else { !hit }
    }

    /// IP 模式匹配
    pub fn ip(operator: Operator, live: &Value, threshold: &Value) -> bool {
        match operator {
            Operator::IpMatch => Self::address_match(live, threshold, ip_matches) == Some(true),
            Operator::IpNotMatch => Self::address_match(live, threshold, ip_matches) == Some(false),
            _ => false,
        }
    }

    /// 邮箱模式匹配
    pub fn email(operator: Operator, live: &Value, threshold: &Value) -> bool {
        match operator {
            Operator::EmailMatch => {
                Self::address_match(live, threshold, email_matches) == Some(true)
            }
            Operator::EmailNotMatch => {
                Self::address_match(live, threshold, email_matches) == Some(false)
            }
            _ => false,
        }
    }

    /// 对阈值中的每个模式求值，忽略无法解析的模式
    ///
    /// 没有任何可用模式时返回 `None`，否则返回是否命中其中之一。
    fn address_match<F>(live: &Value, threshold: &Value, matcher: F) -> Option<bool>
    where
        F: Fn(&str, &str) -> Option<bool>,
    {
        let live = live.as_str()?;
        let results: Vec<bool> = Self::pattern_list(threshold)
            .iter()
            .filter_map(|pattern| matcher(live, pattern))
            .collect();

        if results.is_empty() {
            return None;
        }
        Some(results.into_iter().any(|hit| hit))
    }

    fn ordered<T: PartialOrd>(operator: Operator, a: T, b: T) -> bool {
        match operator {
            Operator::Eq => a == b,
            Operator::Neq => a != b,
            Operator::Gt => a > b,
            Operator::Lt => a < b,
            Operator::Gte => a >= b,
            Operator::Lte => a <= b,
            _ => false,
        }
    }

    /// 正则匹配，无效的模式视为不匹配
    fn regex_match(live: &str, pattern: &str) -> bool {
        match Regex::new(pattern) {
            Ok(regex) => regex.is_match(live),
            Err(e) => {
                tracing::debug!("无效的正则表达式 '{}': {}", pattern, e);
                false
            }
        }
    }

    /// 值的真假判定：null、false、0、空字符串、空数组、空对象为假
    pub(crate) fn is_truthy(value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(arr) => !arr.is_empty(),
            Value::Object(obj) => !obj.is_empty(),
        }
    }

    /// 标量值转文本，null 与复合值返回 `None`
    pub(crate) fn as_text(value: &Value) -> Option<Cow<'_, str>> {
        match value {
            Value::String(s) => Some(Cow::Borrowed(s.as_str())),
            Value::Number(n) => Some(Cow::Owned(n.to_string())),
            Value::Bool(b) => Some(Cow::Owned(b.to_string())),
            _ => None,
        }
    }

    /// 按相对误差比较浮点数
    fn approx_eq(a: f64, b: f64) -> bool {
        a == b || (a - b).abs() <= f64::EPSILON * a.abs().max(b.abs())
    }

    /// 尝试将 Value 转换为有限的 f64
    pub(crate) fn as_f64(value: &Value) -> Option<f64> {
        let n = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }?;
        n.is_finite().then_some(n)
    }

    /// 解析日期，也接受 RFC 3339 时间戳并取其日期部分
    pub(crate) fn parse_date(value: &Value) -> Option<NaiveDate> {
        let s = value.as_str()?.trim();
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
    }

    pub(crate) fn parse_time(value: &Value) -> Option<NaiveTime> {
        let s = value.as_str()?.trim();
        NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .ok()
    }

    /// 转换为字符串集合：数组逐项转换，标量视为单元素集合，null 为空集合
    pub(crate) fn to_set(value: &Value) -> Option<BTreeSet<String>> {
        match value {
            Value::Null => Some(BTreeSet::new()),
            Value::Array(items) => items
                .iter()
                .map(|item| Self::as_text(item).map(Cow::into_owned))
                .collect(),
            other => Self::as_text(other).map(|s| BTreeSet::from([s.into_owned()])),
        }
    }

    /// 阈值中的模式列表：字符串为单个模式，数组取其中的字符串项
    pub(crate) fn pattern_list(value: &Value) -> Vec<String> {
        match value {
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}
