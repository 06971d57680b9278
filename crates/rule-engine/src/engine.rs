//! 规则引擎公共接口
//!
//! 按来源 ID 从存储读取有序的规则集，用该来源注册的条件目录逐个评估。
//! 条件目录注册后只读，评估调用之间不共享任何可变状态。

use crate::catalogue::Catalogue;
use crate::error::{Result, RuleError};
use crate::executor::RulesetExecutor;
use crate::lint::{LintFinding, RulesetLinter};
use crate::models::{ArgumentContext, Ruleset};
use crate::result::{MatchEntry, MatchResult, MatchResultCollection};
use crate::store::{RulesetQuery, RulesetSource};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

const MODE_FIRST: &str = "first";
const MODE_ALL: &str = "all";

/// 规则引擎
pub struct RuleEngine {
    source: Arc<dyn RulesetSource>,
    catalogues: RwLock<HashMap<String, Arc<Catalogue>>>,
    executor: RulesetExecutor,
}

impl RuleEngine {
    pub fn new(source: Arc<dyn RulesetSource>) -> Self {
        Self {
            source,
            catalogues: RwLock::new(HashMap::new()),
            executor: RulesetExecutor::new(),
        }
    }

    /// 启用评估追踪，结果中附带逐条规则的评估记录
    pub fn with_trace(mut self) -> Self {
        self.executor = self.executor.with_trace();
        self
    }

    /// 为来源注册条件目录，已有目录会被替换
    pub fn register_catalogue(&self, source_id: impl Into<String>, catalogue: Catalogue) {
        let source_id = source_id.into();
        info!(source_id = %source_id, conditions = catalogue.len(), "条件目录已注册");
        self.catalogues
            .write()
            .insert(source_id, Arc::new(catalogue));
    }

    pub fn catalogue(&self, source_id: &str) -> Option<Arc<Catalogue>> {
        self.catalogues.read().get(source_id).cloned()
    }

    /// 单匹配模式：返回存储顺序中第一个匹配的规则集
    pub fn evaluate_first(&self, source_id: &str, context: &ArgumentContext) -> Result<MatchResult> {
        self.evaluate_first_matching(source_id, &RulesetQuery::default(), context)
    }

    #[instrument(skip(self, query, context))]
    pub fn evaluate_first_matching(
        &self,
        source_id: &str,
        query: &RulesetQuery,
        context: &ArgumentContext,
    ) -> Result<MatchResult> {
        let start = Instant::now();
        let (catalogue, rulesets) = self.prepare(source_id, query)?;

        let mut trace = Vec::new();
        let mut result = None;
        let mut evaluated = 0;

        for ruleset in rulesets {
            evaluated += 1;
            let evaluation = self.executor.execute(&catalogue, &ruleset, context);
            trace.extend(evaluation.evaluation_trace);

            if let Some(group) = evaluation.matched_group {
                debug!(ruleset_id = %ruleset.id, group, "规则集匹配");
                result = Some((ruleset, group));
                break;
            }
        }

        let result = match result {
            Some((ruleset, group)) => MatchResult::hit(ruleset, group, evaluated, trace),
            None => MatchResult::no_match(evaluated, trace),
        };

        record_evaluation(MODE_FIRST, usize::from(result.matched), start);
        Ok(result)
    }

    /// 多匹配模式：按存储顺序收集所有匹配的规则集
    pub fn evaluate_all(
        &self,
        source_id: &str,
        context: &ArgumentContext,
    ) -> Result<MatchResultCollection> {
        self.evaluate_all_matching(source_id, &RulesetQuery::default(), context)
    }

    #[instrument(skip(self, query, context))]
    pub fn evaluate_all_matching(
        &self,
        source_id: &str,
        query: &RulesetQuery,
        context: &ArgumentContext,
    ) -> Result<MatchResultCollection> {
        let start = Instant::now();
        let (catalogue, rulesets) = self.prepare(source_id, query)?;

        let matches: MatchResultCollection = rulesets
            .into_iter()
            .filter_map(|ruleset| {
                let evaluation = self.executor.execute(&catalogue, &ruleset, context);
                evaluation.matched_group.map(|group| MatchEntry {
                    ruleset,
                    matched_group_index: group,
                    trace: evaluation.evaluation_trace,
                })
            })
            .collect();

        debug!(matches = matches.count(), "多匹配评估完成");
        record_evaluation(MODE_ALL, matches.count(), start);
        Ok(matches)
    }

    /// 检查来源下所有规则集（包括未启用的）
    #[instrument(skip(self))]
    pub fn lint(&self, source_id: &str) -> Result<Vec<(String, Vec<LintFinding>)>> {
        let (catalogue, rulesets) =
            self.prepare(source_id, &RulesetQuery::default().include_disabled())?;

        let report: Vec<(String, Vec<LintFinding>)> = rulesets
            .iter()
            .map(|ruleset| (ruleset.id.clone(), RulesetLinter::lint(&catalogue, ruleset)))
            .filter(|(_, findings)| !findings.is_empty())
            .collect();

        for (ruleset_id, findings) in &report {
            for finding in findings {
                warn!(ruleset_id = %ruleset_id, "{}", finding);
            }
        }
        Ok(report)
    }

    fn prepare(
        &self,
        source_id: &str,
        query: &RulesetQuery,
    ) -> Result<(Arc<Catalogue>, Vec<Ruleset>)> {
        let catalogue = self
            .catalogue(source_id)
            .ok_or_else(|| RuleError::CatalogueNotFound(source_id.to_string()))?;
        let rulesets = self.source.fetch(source_id, query)?;
        debug!(rulesets = rulesets.len(), "已读取规则集");
        Ok((catalogue, rulesets))
    }
}

/// 记录一次评估
#[inline]
fn record_evaluation(mode: &'static str, matches: usize, start: Instant) {
    metrics::counter!("rule_engine_evaluations_total", "mode" => mode).increment(1);
    metrics::counter!("rule_engine_matches_total", "mode" => mode).increment(matches as u64);
    metrics::histogram!("rule_engine_evaluation_seconds", "mode" => mode)
        .record(start.elapsed().as_secs_f64());
}
