//! 规则集检查
//!
//! 对照条件目录检查规则集的结构问题。检查结果只是提示，不改变评估语义：
//! 有问题的规则在评估时仍然按不匹配处理。

use crate::catalogue::{Catalogue, FactSource};
use crate::models::Ruleset;
use crate::operators::Operator;
use crate::resolver::ValueResolver;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// 检查发现的问题类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LintKind {
    UnknownCondition { condition: String },
    UnknownOperator { operator: String },
    OperatorNotAllowed { condition: String, operator: Operator },
    InvalidThreshold { condition: String, operator: Operator },
    EmptyGroup,
}

/// 单条检查结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintFinding {
    /// 位置，如 `g0.r1`
    pub path: String,
    #[serde(flatten)]
    pub kind: LintKind,
}

impl fmt::Display for LintFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LintKind::UnknownCondition { condition } => {
                write!(f, "{}: 未知条件 '{}'", self.path, condition)
            }
            LintKind::UnknownOperator { operator } => {
                write!(f, "{}: 未知操作符 '{}'", self.path, operator)
            }
            LintKind::OperatorNotAllowed {
                condition,
                operator,
            } => write!(
                f,
                "{}: 条件 '{}' 不支持操作符 {}",
                self.path, condition, operator
            ),
            LintKind::InvalidThreshold {
                condition,
                operator,
            } => write!(
                f,
                "{}: 条件 '{}' 的 {} 阈值无效",
                self.path, condition, operator
            ),
            LintKind::EmptyGroup => write!(f, "{}: 规则组不能为空", self.path),
        }
    }
}

pub struct RulesetLinter;

impl RulesetLinter {
    /// 检查规则集，按出现位置返回问题列表
    pub fn lint(catalogue: &Catalogue, ruleset: &Ruleset) -> Vec<LintFinding> {
        let mut findings = Vec::new();

        for (g, group) in ruleset.groups.iter().enumerate() {
            if group.is_empty() {
                findings.push(LintFinding {
                    path: format!("g{}", g),
                    kind: LintKind::EmptyGroup,
                });
                continue;
            }

            for (r, rule) in group.rules.iter().enumerate() {
                let path = format!("g{}.r{}", g, r);

                let Some(definition) = catalogue.get(&rule.condition) else {
                    findings.push(LintFinding {
                        path,
                        kind: LintKind::UnknownCondition {
                            condition: rule.condition.clone(),
                        },
                    });
                    continue;
                };

                let Some(operator) = rule.parsed_operator() else {
                    findings.push(LintFinding {
                        path,
                        kind: LintKind::UnknownOperator {
                            operator: rule.operator.clone(),
                        },
                    });
                    continue;
                };

                if !definition.allows(operator) {
                    findings.push(LintFinding {
                        path,
                        kind: LintKind::OperatorNotAllowed {
                            condition: rule.condition.clone(),
                            operator,
                        },
                    });
                    continue;
                }

                let threshold = ValueResolver::threshold(definition.value_type, &rule.value);
                if !definition
                    .value_type
                    .is_valid_threshold(operator, &threshold)
                {
                    findings.push(LintFinding {
                        path,
                        kind: LintKind::InvalidThreshold {
                            condition: rule.condition.clone(),
                            operator,
                        },
                    });
                }
            }
        }

        findings
    }

    /// 规则集可能读取的上下文键：参数键与必需参数
    ///
    /// 回调型条件读取哪些键无法静态得知，只计入其必需参数。
    pub fn required_context_keys(catalogue: &Catalogue, ruleset: &Ruleset) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();

        for rule in ruleset.groups.iter().flat_map(|g| g.rules.iter()) {
            let Some(definition) = catalogue.get(&rule.condition) else {
                continue;
            };
            match &definition.source {
                Some(FactSource::Argument(key)) => {
                    keys.insert(key.clone());
                }
                None => {
                    keys.insert(definition.name.clone());
                }
                Some(FactSource::Resolver { .. }) => {}
            }
            keys.extend(definition.required_arguments.iter().cloned());
        }

        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::ConditionDefinition;
    use crate::models::{Group, Rule};
    use crate::types::ValueType;
    use serde_json::json;

    fn catalogue() -> Catalogue {
        Catalogue::new()
            .with(
                ConditionDefinition::argument("order_total", ValueType::Number, "cart.total")
                    .operators([Operator::Gt, Operator::Lt]),
            )
            .unwrap()
            .with(ConditionDefinition::argument("client_ip", ValueType::IpPattern, "ip"))
            .unwrap()
            .with(ConditionDefinition::flag("is_vip"))
            .unwrap()
            .with(
                ConditionDefinition::resolved("weather", ValueType::Text, |_, _| Ok(json!("sun")))
                    .require(["city"]),
            )
            .unwrap()
    }

    #[test]
    fn test_clean_ruleset_has_no_findings() {
        let ruleset = Ruleset::new(
            "clean",
            vec![Group::new(vec![
                Rule::new("order_total", Operator::Gt, 100),
                Rule::new("client_ip", Operator::IpMatch, "10.0.0.0/24"),
                Rule::new("is_vip", Operator::Yes, json!(null)),
            ])],
        );
        assert!(RulesetLinter::lint(&catalogue(), &ruleset).is_empty());
    }

    #[test]
    fn test_findings_by_position() {
        let mut bad_operator = Rule::new("order_total", Operator::Gt, 1);
        bad_operator.operator = "between".into();

        let ruleset = Ruleset::new(
            "dirty",
            vec![
                Group::new(vec![
                    Rule::new("nope", Operator::Eq, 1),
                    bad_operator,
                    Rule::new("order_total", Operator::Gte, 100),
                ]),
                Group::default(),
                Group::new(vec![
                    Rule::new("order_total", Operator::Gt, "lots"),
                    Rule::new("client_ip", Operator::IpMatch, "not-an-ip"),
                ]),
            ],
        );

        let findings = RulesetLinter::lint(&catalogue(), &ruleset);
        let paths: Vec<_> = findings.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["g0.r0", "g0.r1", "g0.r2", "g1", "g2.r0", "g2.r1"]);

        assert!(matches!(findings[0].kind, LintKind::UnknownCondition { .. }));
        assert!(matches!(findings[1].kind, LintKind::UnknownOperator { .. }));
        assert!(matches!(
            findings[2].kind,
            LintKind::OperatorNotAllowed { operator: Operator::Gte, .. }
        ));
        assert_eq!(findings[3].kind, LintKind::EmptyGroup);
        assert!(matches!(findings[4].kind, LintKind::InvalidThreshold { .. }));
        assert!(matches!(findings[5].kind, LintKind::InvalidThreshold { .. }));
        assert_eq!(findings[3].to_string(), "g1: 规则组不能为空");
    }

    #[test]
    fn test_required_context_keys() {
        let ruleset = Ruleset::new(
            "keys",
            vec![
                Group::new(vec![
                    Rule::new("order_total", Operator::Gt, 100),
                    Rule::new("weather", Operator::Eq, "sun"),
                ]),
                Group::new(vec![
                    Rule::new("is_vip", Operator::Yes, json!(null)),
                    Rule::new("unknown", Operator::Eq, 1),
                ]),
            ],
        );

        let keys = RulesetLinter::required_context_keys(&catalogue(), &ruleset);
        let keys: Vec<_> = keys.iter().map(String::as_str).collect();
        assert_eq!(keys, vec!["cart.total", "city", "is_vip"]);
    }
}
