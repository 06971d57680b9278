//! 值类型注册表
//!
//! 每个值类型拥有自己的默认操作符集合、阈值校验和比较语义。
//! 新增类型时编译器会要求补全下面每一处 `match`。

use crate::error::UnknownValueType;
use crate::evaluator::ConditionEvaluator;
use crate::operators::Operator;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueType {
    Text,
    Number,
    NumberWithUnit,
    TextWithUnit,
    SingleSelect,
    MultiSelect,
    Boolean,
    Date,
    Time,
    IpPattern,
    EmailPattern,
    TagSet,
    ReferentialSingle,
    ReferentialMulti,
}

const TEXT_OPERATORS: &[Operator] = &[
    Operator::Eq,
    Operator::Neq,
    Operator::Contains,
    Operator::NotContains,
    Operator::StartsWith,
    Operator::EndsWith,
    Operator::Empty,
    Operator::NotEmpty,
    Operator::Regex,
];

const NUMBER_OPERATORS: &[Operator] = &[
    Operator::Eq,
    Operator::Neq,
    Operator::Gt,
    Operator::Lt,
    Operator::Gte,
    Operator::Lte,
];

const TIME_OPERATORS: &[Operator] = &[Operator::Eq, Operator::Neq, Operator::Gt, Operator::Lt];

const SELECT_OPERATORS: &[Operator] = &[Operator::Eq, Operator::Neq];

const SET_OPERATORS: &[Operator] = &[Operator::AnyOf, Operator::NoneOf, Operator::AllOf];

const BOOLEAN_OPERATORS: &[Operator] = &[Operator::Yes, Operator::No];

const IP_OPERATORS: &[Operator] = &[Operator::IpMatch, Operator::IpNotMatch];

const EMAIL_OPERATORS: &[Operator] = &[Operator::EmailMatch, Operator::EmailNotMatch];

const TAG_OPERATORS: &[Operator] = &[
    Operator::AnyEnds,
    Operator::AnyStarts,
    Operator::AnyContains,
    Operator::AnyExact,
    Operator::NoneEnds,
    Operator::NoneStarts,
    Operator::NoneContains,
    Operator::NoneExact,
];

impl ValueType {
    pub const ALL: [ValueType; 14] = [
        Self::Text,
        Self::Number,
        Self::NumberWithUnit,
        Self::TextWithUnit,
        Self::SingleSelect,
        Self::MultiSelect,
        Self::Boolean,
        Self::Date,
        Self::Time,
        Self::IpPattern,
        Self::EmailPattern,
        Self::TagSet,
        Self::ReferentialSingle,
        Self::ReferentialMulti,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::NumberWithUnit => "number-with-unit",
            Self::TextWithUnit => "text-with-unit",
            Self::SingleSelect => "single-select",
            Self::MultiSelect => "multi-select",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Time => "time",
            Self::IpPattern => "ip-pattern",
            Self::EmailPattern => "email-pattern",
            Self::TagSet => "tag-set",
            Self::ReferentialSingle => "referential-single",
            Self::ReferentialMulti => "referential-multi",
        }
    }

    /// 类型的默认操作符集合，同时也是该类型能够比较的全部操作符
    pub fn default_operators(&self) -> &'static [Operator] {
        match self {
            Self::Text | Self::TextWithUnit => TEXT_OPERATORS,
            Self::Number | Self::NumberWithUnit | Self::Date => NUMBER_OPERATORS,
            Self::Time => TIME_OPERATORS,
            Self::SingleSelect | Self::ReferentialSingle => SELECT_OPERATORS,
            Self::MultiSelect | Self::ReferentialMulti => SET_OPERATORS,
            Self::Boolean => BOOLEAN_OPERATORS,
            Self::IpPattern => IP_OPERATORS,
            Self::EmailPattern => EMAIL_OPERATORS,
            Self::TagSet => TAG_OPERATORS,
        }
    }

    pub fn supports(&self, operator: Operator) -> bool {
        self.default_operators().contains(&operator)
    }

    /// 阈值是否携带单位（`{number, unit}` / `{text, unit}`）
    pub fn is_unit_qualified(&self) -> bool {
        matches!(self, Self::NumberWithUnit | Self::TextWithUnit)
    }

    /// 上下文缺少参数时使用的零值
    pub fn zero_value(&self) -> Value {
        match self {
            Self::Number | Self::NumberWithUnit => json!(0),
            Self::Boolean => json!(false),
            Self::MultiSelect | Self::ReferentialMulti => json!([]),
            Self::Text
            | Self::TextWithUnit
            | Self::SingleSelect
            | Self::ReferentialSingle
            | Self::Date
            | Self::Time
            | Self::IpPattern
            | Self::EmailPattern
            | Self::TagSet => json!(""),
        }
    }

    /// 阈值校验
    ///
    /// `threshold` 为比较用的阈值；带单位类型应先由取值器拆出数值或文本部分。
    pub fn is_valid_threshold(&self, operator: Operator, threshold: &Value) -> bool {
        if !self.supports(operator) {
            return false;
        }
        if operator.ignores_threshold() {
            return true;
        }

        match self {
            Self::Text | Self::TextWithUnit => match operator {
                Operator::Regex => threshold
                    .as_str()
                    .is_some_and(|pattern| Regex::new(pattern).is_ok()),
                _ => ConditionEvaluator::as_text(threshold).is_some(),
            },
            Self::Number | Self::NumberWithUnit => ConditionEvaluator::as_f64(threshold).is_some(),
            Self::SingleSelect | Self::ReferentialSingle => {
                ConditionEvaluator::as_text(threshold).is_some()
            }
            Self::MultiSelect | Self::ReferentialMulti => {
                ConditionEvaluator::to_set(threshold).is_some_and(|set| !set.is_empty())
            }
            Self::Boolean => true,
            Self::Date => ConditionEvaluator::parse_date(threshold).is_some(),
            Self::Time => ConditionEvaluator::parse_time(threshold).is_some(),
            Self::IpPattern => ConditionEvaluator::pattern_list(threshold)
                .iter()
                .any(|p| crate::patterns::IpPattern::parse(p).is_some()),
            Self::EmailPattern => ConditionEvaluator::pattern_list(threshold)
                .iter()
                .any(|p| crate::patterns::EmailPattern::parse(p).is_some()),
            Self::TagSet => ConditionEvaluator::pattern_list(threshold)
                .iter()
                .any(|p| !p.is_empty()),
        }
    }

    /// 比较实时值与阈值
    ///
    /// 不支持的操作符或无效阈值直接返回 `false`。
    pub fn compare(&self, operator: Operator, live: &Value, threshold: &Value) -> bool {
        if !self.is_valid_threshold(operator, threshold) {
            return false;
        }

        match self {
            Self::Text | Self::TextWithUnit => ConditionEvaluator::text(operator, live, threshold),
            Self::Number | Self::NumberWithUnit => {
                ConditionEvaluator::number(operator, live, threshold)
            }
            Self::SingleSelect | Self::ReferentialSingle => {
                ConditionEvaluator::select(operator, live, threshold)
            }
            Self::MultiSelect | Self::ReferentialMulti => {
                ConditionEvaluator::set(operator, live, threshold)
            }
            Self::Boolean => ConditionEvaluator::boolean(operator, live),
            Self::Date => ConditionEvaluator::date(operator, live, threshold),
            Self::Time => ConditionEvaluator::time(operator, live, threshold),
            Self::IpPattern => ConditionEvaluator::ip(operator, live, threshold),
            Self::EmailPattern => ConditionEvaluator::email(operator, live, threshold),
            Self::TagSet => ConditionEvaluator::tags(operator, live, threshold),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = UnknownValueType;

    /// 接受 `number-with-unit` 与 `number_with_unit` 两种写法
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| UnknownValueType(s.to_string()))
    }
}
