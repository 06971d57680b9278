//! 规则集执行器
//!
//! 组内规则按 AND 组合，组之间按 OR 组合：
//! - 缺少必需参数的规则被跳过，不参与 AND
//! - 组内没有未跳过的规则时，组视为匹配（空集合的 AND 为真）
//! - 找到第一个匹配的组后，后续组不再评估
//!
//! 单条规则的任何错误（未知条件、操作符不在集合内、回调失败）都只让该规则不匹配。

use crate::catalogue::{Catalogue, ConditionDefinition};
use crate::models::{ArgumentContext, Group, Rule, Ruleset};
use crate::resolver::ValueResolver;
use std::fmt;
use tracing::{debug, warn};

/// 单条规则的评估结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    Skipped,
    True,
    False,
}

impl fmt::Display for RuleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => write!(f, "SKIPPED"),
            Self::True => write!(f, "TRUE"),
            Self::False => write!(f, "FALSE"),
        }
    }
}

/// 单个规则集的评估结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RulesetEvaluation {
    /// 第一个匹配的组下标
    pub matched_group: Option<usize>,
    pub evaluation_trace: Vec<String>,
}

impl RulesetEvaluation {
    pub fn matched(&self) -> bool {
        self.matched_group.is_some()
    }
}

/// 规则集执行器
#[derive(Debug, Clone, Copy, Default)]
pub struct RulesetExecutor {
    /// 是否记录详细评估追踪
    trace_enabled: bool,
}

impl RulesetExecutor {
    pub fn new() -> Self {
        Self {
            trace_enabled: false,
        }
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    pub fn trace_enabled(&self) -> bool {
        self.trace_enabled
    }

    /// 评估规则集：组之间短路 OR
    pub fn execute(
        &self,
        catalogue: &Catalogue,
        ruleset: &Ruleset,
        context: &ArgumentContext,
    ) -> RulesetEvaluation {
        let mut result = RulesetEvaluation::default();

        for (index, group) in ruleset.groups.iter().enumerate() {
            let path = format!("g{}", index);
            if self.evaluate_group(catalogue, group, context, &mut result, &path) {
                if self.trace_enabled && index + 1 < ruleset.groups.len() {
                    result
                        .evaluation_trace
                        .push(format!("{}: 匹配，短路跳过剩余 {} 个组", path, ruleset.groups.len() - index - 1));
                }
                result.matched_group = Some(index);
                return result;
            }
        }

        if self.trace_enabled {
            result
                .evaluation_trace
                .push(format!("{}: 无匹配组", ruleset.id));
        }
        result
    }

    /// 评估规则组：跳过的规则不参与 AND，遇到 FALSE 短路
    fn evaluate_group(
        &self,
        catalogue: &Catalogue,
        group: &Group,
        context: &ArgumentContext,
        result: &mut RulesetEvaluation,
        path: &str,
    ) -> bool {
        // 空组违反了组的非空约束，按无效组处理
        if group.is_empty() {
            if self.trace_enabled {
                result.evaluation_trace.push(format!("{}: 空组，不匹配", path));
            }
            return false;
        }

        for (index, rule) in group.rules.iter().enumerate() {
            let rule_path = format!("{}.r{}", path, index);
            let outcome = self.evaluate_rule(catalogue, rule, context);

            if self.trace_enabled {
                result.evaluation_trace.push(format!(
                    "{}: {} {} {} => {}",
                    rule_path, rule.condition, rule.operator, rule.value, outcome
                ));
            }

            if outcome == RuleOutcome::False {
                if self.trace_enabled && index + 1 < group.len() {
                    result
                        .evaluation_trace
                        .push(format!("{}: AND 短路", path));
                }
                return false;
            }
        }

        true
    }

    /// 评估单条规则
    pub fn evaluate_rule(
        &self,
        catalogue: &Catalogue,
        rule: &Rule,
        context: &ArgumentContext,
    ) -> RuleOutcome {
        let Some(definition) = catalogue.get(&rule.condition) else {
            debug!(rule_id = %rule.id, condition = %rule.condition, "未知条件，规则不匹配");
            return RuleOutcome::False;
        };

        if Self::missing_argument(definition, context).is_some() {
            return RuleOutcome::Skipped;
        }

        let Some(operator) = rule
            .parsed_operator()
            .filter(|op| definition.allows(*op))
        else {
            debug!(
                rule_id = %rule.id,
                condition = %rule.condition,
                operator = %rule.operator,
                "操作符不在条件的操作符集合内，规则不匹配"
            );
            return RuleOutcome::False;
        };

        let operands = match ValueResolver::resolve(definition, &rule.value, context) {
            Ok(operands) => operands,
            Err(e) => {
                warn!(rule_id = %rule.id, error = %e, "取值失败，规则按不匹配处理");
                metrics::counter!("rule_engine_rule_errors_total").increment(1);
                return RuleOutcome::False;
            }
        };

        if definition
            .value_type
            .compare(operator, &operands.live, &operands.threshold)
        {
            RuleOutcome::True
        } else {
            RuleOutcome::False
        }
    }

    /// 返回第一个缺失的必需参数
    fn missing_argument<'a>(
        definition: &'a ConditionDefinition,
        context: &ArgumentContext,
    ) -> Option<&'a str> {
        definition
            .required_arguments
            .iter()
            .find(|key| !context.contains_key(key))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolutionError;
    use crate::operators::Operator;
    use crate::types::ValueType;

    fn create_test_catalogue() -> Catalogue {
        Catalogue::new()
            .with(
                ConditionDefinition::argument("order_total", ValueType::Number, "order_total")
                    .operators([Operator::Gt, Operator::Lt]),
            )
            .unwrap()
            .with(ConditionDefinition::argument("country", ValueType::SingleSelect, "country"))
            .unwrap()
            .with(
                ConditionDefinition::argument("coupon", ValueType::Text, "coupon")
                    .require(["coupon"]),
            )
            .unwrap()
            .with(ConditionDefinition::resolved("broken", ValueType::Number, |_, _| {
                Err(ResolutionError::new("broken", "backend unavailable"))
            }))
            .unwrap()
    }

    fn create_test_context() -> ArgumentContext {
        ArgumentContext::default()
            .with("order_total", 150.0)
            .with("country", "DE")
    }

    fn ruleset(groups: Vec<Vec<Rule>>) -> Ruleset {
        Ruleset::new("test", groups.into_iter().map(Group::new).collect()).with_id("rs-1")
    }

    #[test]
    fn test_rule_outcomes() {
        let catalogue = create_test_catalogue();
        let context = create_test_context();
        let executor = RulesetExecutor::new();

        let hit = Rule::new("order_total", Operator::Gt, 100);
        let miss = Rule::new("order_total", Operator::Lt, 100);
        let skipped = Rule::new("coupon", Operator::Eq, "SAVE10");

        assert_eq!(executor.evaluate_rule(&catalogue, &hit, &context), RuleOutcome::True);
        assert_eq!(executor.evaluate_rule(&catalogue, &miss, &context), RuleOutcome::False);
        assert_eq!(executor.evaluate_rule(&catalogue, &skipped, &context), RuleOutcome::Skipped);
    }

    #[test]
    fn test_malformed_rules_are_false() {
        let catalogue = create_test_catalogue();
        let context = create_test_context();
        let executor = RulesetExecutor::new();

        let unknown_condition = Rule::new("nope", Operator::Eq, 1);
        let operator_not_allowed = Rule::new("order_total", Operator::Gte, 100);
        let unknown_operator = Rule {
            operator: "between".into(),
            ..Rule::new("order_total", Operator::Gt, 100)
        };
        let failing_resolver = Rule::new("broken", Operator::Eq, 1);

        for rule in [
            unknown_condition,
            operator_not_allowed,
            unknown_operator,
            failing_resolver,
        ] {
            assert_eq!(
                executor.evaluate_rule(&catalogue, &rule, &context),
                RuleOutcome::False,
                "rule {:?}",
                rule
            );
        }
    }

    #[test]
    fn test_and_within_group() {
        let catalogue = create_test_catalogue();
        let context = create_test_context();
        let executor = RulesetExecutor::new();

        let both = ruleset(vec![vec![
            Rule::new("order_total", Operator::Gt, 100),
            Rule::new("country", Operator::Eq, "DE"),
        ]]);
        assert_eq!(executor.execute(&catalogue, &both, &context).matched_group, Some(0));

        let one_fails = ruleset(vec![vec![
            Rule::new("order_total", Operator::Gt, 100),
            Rule::new("country", Operator::Eq, "FR"),
        ]]);
        assert!(!executor.execute(&catalogue, &one_fails, &context).matched());
    }

    #[test]
    fn test_skipped_rule_excluded_from_and() {
        let catalogue = create_test_catalogue();
        let context = create_test_context();
        let executor = RulesetExecutor::new();

        let rs = ruleset(vec![vec![
            Rule::new("coupon", Operator::Eq, "SAVE10"),
            Rule::new("country", Operator::Eq, "DE"),
        ]]);
        assert!(executor.execute(&catalogue, &rs, &context).matched());
    }

    #[test]
    fn test_all_skipped_group_matches() {
        let catalogue = create_test_catalogue();
        let executor = RulesetExecutor::new();

        let rs = ruleset(vec![vec![
            Rule::new("coupon", Operator::Eq, "SAVE10"),
            Rule::new("coupon", Operator::Contains, "SAVE"),
        ]]);
        let result = executor.execute(&catalogue, &rs, &ArgumentContext::default());
        assert_eq!(result.matched_group, Some(0));
    }

    #[test]
    fn test_empty_group_never_matches() {
        let catalogue = create_test_catalogue();
        let executor = RulesetExecutor::new();

        let rs = ruleset(vec![vec![]]);
        assert!(!executor.execute(&catalogue, &rs, &create_test_context()).matched());
    }

    #[test]
    fn test_or_across_groups_reports_first_match() {
        let catalogue = create_test_catalogue();
        let context = create_test_context();
        let executor = RulesetExecutor::new().with_trace();

        let rs = ruleset(vec![
            vec![Rule::new("country", Operator::Eq, "FR")],
            vec![Rule::new("order_total", Operator::Gt, 100)],
            vec![Rule::new("country", Operator::Eq, "DE")],
        ]);
        let result = executor.execute(&catalogue, &rs, &context);

        assert_eq!(result.matched_group, Some(1));
        // 第三组不会被评估
        assert!(!result.evaluation_trace.iter().any(|t| t.starts_with("g2.")));
        assert!(result.evaluation_trace.iter().any(|t| t.contains("短路")));
    }

    #[test]
    fn test_broken_rule_does_not_break_ruleset() {
        let catalogue = create_test_catalogue();
        let context = create_test_context();
        let executor = RulesetExecutor::new();

        let rs = ruleset(vec![
            vec![Rule::new("broken", Operator::Gt, 1)],
            vec![Rule::new("country", Operator::Eq, "DE")],
        ]);
        assert_eq!(executor.execute(&catalogue, &rs, &context).matched_group, Some(1));
    }

    #[test]
    fn test_trace_output() {
        let catalogue = create_test_catalogue();
        let context = create_test_context();
        let executor = RulesetExecutor::new().with_trace();

        let rs = ruleset(vec![vec![
            Rule::new("coupon", Operator::Eq, "SAVE10"),
            Rule::new("order_total", Operator::Gt, 100),
        ]]);
        let result = executor.execute(&catalogue, &rs, &context);

        assert_eq!(result.evaluation_trace.len(), 2);
        assert!(result.evaluation_trace[0].ends_with("SKIPPED"));
        assert!(result.evaluation_trace[1].starts_with("g0.r1: order_total > 100"));
        assert!(result.evaluation_trace[1].ends_with("TRUE"));
    }
}
