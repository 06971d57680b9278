//! 规则引擎错误类型
//!
//! 结构性错误（目录注册失败、规则源不可用）立即向调用方返回；
//! 单条规则的运行时错误（取值回调失败）在执行器内部吸收，规则按不匹配处理。

use thiserror::Error;

/// 条件注册错误
///
/// 在构建条件目录时产生，对该次注册调用是致命的。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("条件重复注册: {name}")]
    DuplicateCondition { name: String },

    #[error("条件 {name} 使用了未知的值类型: {value_type}")]
    UnknownType { name: String, value_type: String },

    #[error("条件定义无效: {name} - {reason}")]
    MalformedDefinition { name: String, reason: String },
}

/// 取值回调执行失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("条件 {condition} 取值失败: {message}")]
pub struct ResolutionError {
    pub condition: String,
    pub message: String,
}

impl ResolutionError {
    pub fn new(condition: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            message: message.into(),
        }
    }
}

/// 未知的值类型名称
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("未知的值类型: {0}")]
pub struct UnknownValueType(pub String);

/// 未知的操作符名称
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("未知的操作符: {0}")]
pub struct UnknownOperator(pub String);

#[derive(Debug, Error)]
pub enum RuleError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("条件目录未注册: {0}")]
    CatalogueNotFound(String),

    #[error("规则集未找到: source={source_id} id={ruleset_id}")]
    RulesetNotFound {
        source_id: String,
        ruleset_id: String,
    },

    #[error("规则源读取失败: {source_id} - {message}")]
    Source { source_id: String, message: String },

    #[error("规则解析失败: {0}")]
    Parse(String),

    #[error("JSON 序列化错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;
