//! 规则引擎领域模型

use crate::operators::Operator;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// 注入给取值回调的作者单位
pub const INJECTED_UNIT: &str = "_unit";
/// 注入给取值回调的作者数值
pub const INJECTED_NUMBER: &str = "_number";
/// 注入给取值回调的作者文本
pub const INJECTED_TEXT: &str = "_text";

/// 单条比较规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: String,
    /// 引用的条件名
    pub condition: String,
    /// 保留原始字符串，未知操作符只让这条规则失效，不影响整个规则集的解码
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

impl Rule {
    pub fn new(condition: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            condition: condition.into(),
            operator: operator.to_string(),
            value: value.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn parsed_operator(&self) -> Option<Operator> {
        self.operator.parse().ok()
    }
}

/// AND 组合的规则列表
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Group {
    pub rules: Vec<Rule>,
}

impl Group {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

/// 持久化的规则集：OR 组合的规则组，外加存储方拥有的标识与元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub meta: BTreeMap<String, Value>,
}

fn default_enabled() -> bool {
    true
}

impl Ruleset {
    pub fn new(title: impl Into<String>, groups: Vec<Group>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            enabled: true,
            groups,
            meta: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn rule_count(&self) -> usize {
        self.groups.iter().map(Group::len).sum()
    }
}

/// 参数上下文 - 每次评估时由调用方提供的只读事实
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentContext {
    data: Map<String, Value>,
}

impl ArgumentContext {
    pub fn new(data: Map<String, Value>) -> Self {
        Self { data }
    }

    /// 从 JSON 对象创建，非对象输入返回错误
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let data: Map<String, Value> = serde_json::from_str(json)?;
        Ok(Self { data })
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// 获取参数值
    ///
    /// 先按完整键查找；找不到且键中带点号时，按路径逐层访问（如 "user.profile.age"）。
    pub fn get(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.data.get(key) {
            return Some(value);
        }
        if !key.contains('.') {
            return None;
        }

        let mut parts = key.split('.');
        let mut current = self.data.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part)?,
                // 支持数组索引访问，如 "items.0.name"
                Value::Array(arr) => arr.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// 在副本上叠加键值，原上下文保持不变
    pub fn overlay(&self, injected: Map<String, Value>) -> Self {
        let mut data = self.data.clone();
        data.extend(injected);
        Self { data }
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }
}

impl From<Map<String, Value>> for ArgumentContext {
    fn from(data: Map<String, Value>) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ruleset_deserialization() {
        let json = r#"
        {
            "id": "free-shipping",
            "title": "Free shipping over 100",
            "groups": [
                [
                    {"id": "r1", "condition": "order_total", "operator": ">", "value": 100},
                    {"id": "r2", "condition": "country", "operator": "==", "value": "DE"}
                ],
                [
                    {"id": "r3", "condition": "is_vip", "operator": "yes"}
                ]
            ],
            "meta": {"priority": 10}
        }
        "#;

        let ruleset: Ruleset = serde_json::from_str(json).unwrap();
        assert_eq!(ruleset.id, "free-shipping");
        assert!(ruleset.enabled);
        assert_eq!(ruleset.groups.len(), 2);
        assert_eq!(ruleset.rule_count(), 3);
        assert_eq!(ruleset.groups[0].rules[0].parsed_operator(), Some(Operator::Gt));
        assert_eq!(ruleset.groups[1].rules[0].value, Value::Null);
        assert_eq!(ruleset.meta.get("priority"), Some(&json!(10)));
    }

    #[test]
    fn test_unknown_operator_still_decodes() {
        let rule: Rule = serde_json::from_str(
            r#"{"condition": "order_total", "operator": "between", "value": [1, 2]}"#,
        )
        .unwrap();
        assert_eq!(rule.parsed_operator(), None);
    }

    #[test]
    fn test_group_serializes_as_array() {
        let group = Group::new(vec![Rule::new("a", Operator::Eq, 1).with_id("r1")]);
        let json = serde_json::to_value(&group).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["operator"], json!("=="));
    }

    #[test]
    fn test_context_lookup() {
        let ctx = ArgumentContext::default()
            .with("order_total", 150.0)
            .with("user", json!({"role": "admin", "tags": ["a", "b"]}))
            .with("cart.size", 3);

        assert_eq!(ctx.get("order_total"), Some(&json!(150.0)));
        assert_eq!(ctx.get("user.role"), Some(&json!("admin")));
        assert_eq!(ctx.get("user.tags.1"), Some(&json!("b")));
        assert_eq!(ctx.get("cart.size"), Some(&json!(3)));
        assert_eq!(ctx.get("missing"), None);
        assert!(!ctx.contains_key("user.email"));
    }

    #[test]
    fn test_overlay_leaves_original_untouched() {
        let ctx = ArgumentContext::default().with("weight", 2);
        let mut injected = Map::new();
        injected.insert(INJECTED_UNIT.into(), json!("kg"));

        let layered = ctx.overlay(injected);
        assert_eq!(layered.get(INJECTED_UNIT), Some(&json!("kg")));
        assert_eq!(layered.get("weight"), Some(&json!(2)));
        assert_eq!(ctx.get(INJECTED_UNIT), None);
    }

    #[test]
    fn test_context_from_json_rejects_non_object() {
        assert!(ArgumentContext::from_json(r#"{"a": 1}"#).is_ok());
        assert!(ArgumentContext::from_json("[1, 2]").is_err());
    }
}
