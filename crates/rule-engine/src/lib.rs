//! 条件规则引擎
//!
//! 对调用方提供的参数上下文评估持久化的规则集：
//! - 类型注册表：每种值类型的操作符集合、比较与阈值校验
//! - 条件目录：命名的、带类型的事实及其来源
//! - 取值器：从上下文或回调求出实时值
//! - 执行器：组内 AND、组间 OR，缺少必需参数的规则被跳过
//! - 单匹配 / 多匹配两种评估模式

pub mod catalogue;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod lint;
pub mod models;
pub mod operators;
pub mod patterns;
pub mod resolver;
pub mod result;
pub mod store;
pub mod types;

pub use catalogue::{Catalogue, ConditionDefinition, ConditionSpec, FactSource};
pub use engine::RuleEngine;
pub use error::{RegistrationError, ResolutionError, Result, RuleError};
pub use executor::{RuleOutcome, RulesetEvaluation, RulesetExecutor};
pub use lint::{LintFinding, LintKind, RulesetLinter};
pub use models::{ArgumentContext, Group, Rule, Ruleset};
pub use operators::Operator;
pub use result::{MatchEntry, MatchResult, MatchResultCollection};
pub use store::{InMemoryRulesetSource, RulesetQuery, RulesetSource};
pub use types::ValueType;
