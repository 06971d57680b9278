//! 指标描述
//!
//! 规则引擎通过 metrics 门面记录指标，这里只登记描述；
//! 未安装 recorder 时所有记录都是空操作。

/// 登记规则引擎使用的指标
pub fn describe() {
    metrics::describe_counter!(
        "rule_engine_evaluations_total",
        "Total number of ruleset source evaluations"
    );
    metrics::describe_counter!(
        "rule_engine_matches_total",
        "Total number of matched rulesets"
    );
    metrics::describe_counter!(
        "rule_engine_rule_errors_total",
        "Rules treated as unmatched because value resolution failed"
    );
    metrics::describe_histogram!(
        "rule_engine_evaluation_seconds",
        "Evaluation duration in seconds"
    );
}
