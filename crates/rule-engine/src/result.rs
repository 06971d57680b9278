//! 匹配结果模型

use crate::models::Ruleset;
use serde::Serialize;

/// 单匹配模式的结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchResult {
    pub matched: bool,
    pub ruleset: Option<Ruleset>,
    pub matched_group_index: Option<usize>,
    /// 实际评估过的规则集数量（找到匹配后停止）
    pub evaluated_rulesets: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
}

impl MatchResult {
    pub fn no_match(evaluated_rulesets: usize, trace: Vec<String>) -> Self {
        Self {
            matched: false,
            ruleset: None,
            matched_group_index: None,
            evaluated_rulesets,
            trace,
        }
    }

    pub fn hit(
        ruleset: Ruleset,
        matched_group_index: usize,
        evaluated_rulesets: usize,
        trace: Vec<String>,
    ) -> Self {
        Self {
            matched: true,
            ruleset: Some(ruleset),
            matched_group_index: Some(matched_group_index),
            evaluated_rulesets,
            trace,
        }
    }

    pub fn ruleset_id(&self) -> Option<&str> {
        self.ruleset.as_ref().map(|r| r.id.as_str())
    }
}

/// 多匹配模式中的一个匹配项
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchEntry {
    pub ruleset: Ruleset,
    pub matched_group_index: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
}

/// 按存储顺序排列的匹配集合
///
/// 结果在评估时一次性物化，重复迭代得到相同的列表。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MatchResultCollection {
    entries: Vec<MatchEntry>,
}

impl MatchResultCollection {
    pub fn new(entries: Vec<MatchEntry>) -> Self {
        Self { entries }
    }

    pub fn has_matches(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn first(&self) -> Option<&MatchEntry> {
        self.entries.first()
    }

    pub fn last(&self) -> Option<&MatchEntry> {
        self.entries.last()
    }

    /// 过滤出新的集合，原集合不变
    pub fn filter<P>(&self, mut predicate: P) -> Self
    where
        P: FnMut(&MatchEntry) -> bool,
    {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|entry| predicate(entry))
                .cloned()
                .collect(),
        }
    }

    pub fn map<T, F>(&self, f: F) -> Vec<T>
    where
        F: FnMut(&MatchEntry) -> T,
    {
        self.entries.iter().map(f).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MatchEntry> {
        self.entries.iter()
    }

    pub fn ruleset_ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.ruleset.id.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a MatchResultCollection {
    type Item = &'a MatchEntry;
    type IntoIter = std::slice::Iter<'a, MatchEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl IntoIterator for MatchResultCollection {
    type Item = MatchEntry;
    type IntoIter = std::vec::IntoIter<MatchEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<MatchEntry> for MatchResultCollection {
    fn from_iter<I: IntoIterator<Item = MatchEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
