//! 规则集存储
//!
//! 引擎只通过 `RulesetSource` 读取规则集，从不写回存储。
//! `InMemoryRulesetSource` 使用 DashMap 提供线程安全的内存实现，按来源 ID 保存有序的规则集列表。

use crate::error::{Result, RuleError};
use crate::models::Ruleset;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 规则集查询过滤条件
#[derive(Debug, Clone, PartialEq)]
pub struct RulesetQuery {
    /// 元数据键值必须全部相等
    pub meta: BTreeMap<String, Value>,
    /// 只返回启用的规则集
    pub enabled_only: bool,
}

impl Default for RulesetQuery {
    fn default() -> Self {
        Self {
            meta: BTreeMap::new(),
            enabled_only: true,
        }
    }
}

impl RulesetQuery {
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn include_disabled(mut self) -> Self {
        self.enabled_only = false;
        self
    }

    pub fn matches(&self, ruleset: &Ruleset) -> bool {
        if self.enabled_only && !ruleset.enabled {
            return false;
        }
        self.meta
            .iter()
            .all(|(key, expected)| ruleset.meta.get(key) == Some(expected))
    }
}

/// 规则集来源
///
/// 对给定来源 ID 与查询条件，按存储顺序返回规则集。
#[cfg_attr(test, mockall::automock)]
pub trait RulesetSource: Send + Sync {
    fn fetch(&self, source_id: &str, query: &RulesetQuery) -> Result<Vec<Ruleset>>;
}

/// 内存规则集存储
#[derive(Clone, Default)]
pub struct InMemoryRulesetSource {
    rulesets: Arc<DashMap<String, Vec<Ruleset>>>,
}

impl InMemoryRulesetSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 来源数量
    pub fn len(&self) -> usize {
        self.rulesets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rulesets.is_empty()
    }

    /// 追加规则集，同一来源中 ID 已存在时原位替换
    #[instrument(skip(self, ruleset), fields(ruleset_id = %ruleset.id))]
    pub fn load(&self, source_id: &str, ruleset: Ruleset) {
        let mut entry = self.rulesets.entry(source_id.to_string()).or_default();
        if let Some(existing) = entry.iter_mut().find(|r| r.id == ruleset.id) {
            *existing = ruleset;
            info!("规则集已更新");
        } else {
            entry.push(ruleset);
            info!("规则集已加载");
        }
    }

    /// 从 JSON 加载单个规则集
    #[instrument(skip(self, json))]
    pub fn load_from_json(&self, source_id: &str, json: &str) -> Result<String> {
        let ruleset: Ruleset = serde_json::from_str(json)?;
        Self::validate(source_id, &ruleset)?;
        let ruleset_id = ruleset.id.clone();
        self.load(source_id, ruleset);
        Ok(ruleset_id)
    }

    /// 批量加载，返回加载的规则集 ID
    #[instrument(skip(self, rulesets))]
    pub fn load_batch(&self, source_id: &str, rulesets: Vec<Ruleset>) -> Vec<String> {
        let ids: Vec<String> = rulesets.iter().map(|r| r.id.clone()).collect();
        for ruleset in rulesets {
            self.load(source_id, ruleset);
        }
        info!("批量加载完成: {} 个规则集", ids.len());
        ids
    }

    /// 加载 `{ "<来源 ID>": [Ruleset, ...] }` 格式的文档
    ///
    /// 任一规则集无效时整个文档都不加载。
    #[instrument(skip(self, json))]
    pub fn load_sources_from_json(&self, json: &str) -> Result<usize> {
        let sources: BTreeMap<String, Vec<Ruleset>> = serde_json::from_str(json)?;
        for (source_id, rulesets) in &sources {
            for ruleset in rulesets {
                Self::validate(source_id, ruleset)?;
            }
        }

        let mut total = 0;
        for (source_id, rulesets) in sources {
            total += self.load_batch(&source_id, rulesets).len();
        }
        Ok(total)
    }

    /// 从文件加载多来源文档
    pub fn load_sources_from_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let json = std::fs::read_to_string(path)?;
        self.load_sources_from_json(&json)
    }

    fn validate(source_id: &str, ruleset: &Ruleset) -> Result<()> {
        if source_id.is_empty() {
            return Err(RuleError::Parse("来源 ID 不能为空".to_string()));
        }
        if ruleset.id.is_empty() {
            return Err(RuleError::Parse(format!(
                "来源 '{}' 中的规则集 ID 不能为空",
                source_id
            )));
        }
        Ok(())
    }

    /// 整体替换某个来源的规则集
    #[instrument(skip(self, rulesets))]
    pub fn replace(&self, source_id: &str, rulesets: Vec<Ruleset>) {
        let count = rulesets.len();
        self.rulesets.insert(source_id.to_string(), rulesets);
        info!("来源 {} 已替换为 {} 个规则集", source_id, count);
    }

    /// 删除来源中的单个规则集
    #[instrument(skip(self))]
    pub fn remove(&self, source_id: &str, ruleset_id: &str) -> Result<()> {
        let not_found = || RuleError::RulesetNotFound {
            source_id: source_id.to_string(),
            ruleset_id: ruleset_id.to_string(),
        };

        let mut entry = self.rulesets.get_mut(source_id).ok_or_else(not_found)?;
        let before = entry.len();
        entry.retain(|r| r.id != ruleset_id);

        if entry.len() == before {
            warn!("删除不存在的规则集: {}", ruleset_id);
            return Err(not_found());
        }
        info!("规则集已删除: {}", ruleset_id);
        Ok(())
    }

    pub fn get(&self, source_id: &str, ruleset_id: &str) -> Option<Ruleset> {
        self.rulesets
            .get(source_id)
            .and_then(|rs| rs.iter().find(|r| r.id == ruleset_id).cloned())
    }

    pub fn source_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.rulesets.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// 清空所有来源
    #[instrument(skip(self))]
    pub fn clear(&self) {
        let count = self.rulesets.len();
        self.rulesets.clear();
        info!("已清空 {} 个来源", count);
    }

    /// 存储统计信息
    pub fn stats(&self) -> RulesetStoreStats {
        let mut stats = RulesetStoreStats {
            sources_count: self.rulesets.len(),
            ..Default::default()
        };
        for entry in self.rulesets.iter() {
            stats.rulesets_count += entry.len();
            stats.disabled_count += entry.iter().filter(|r| !r.enabled).count();
            stats.rules_count += entry.iter().map(Ruleset::rule_count).sum::<usize>();
        }
        stats
    }
}

impl RulesetSource for InMemoryRulesetSource {
    fn fetch(&self, source_id: &str, query: &RulesetQuery) -> Result<Vec<Ruleset>> {
        Ok(self
            .rulesets
            .get(source_id)
            .map(|rs| rs.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default())
    }
}

/// 存储统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RulesetStoreStats {
    pub sources_count: usize,
    pub rulesets_count: usize,
    pub disabled_count: usize,
    pub rules_count: usize,
}
