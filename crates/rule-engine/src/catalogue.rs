//! 条件目录
//!
//! 按名称登记某个规则源可用的条件定义。目录在注册完成后只读，
//! 通过 `Arc` 在多个评估调用之间共享。

use crate::error::{RegistrationError, ResolutionError, Result};
use crate::models::ArgumentContext;
use crate::operators::Operator;
use crate::types::ValueType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// 计算型事实的取值回调
///
/// 第二个参数仅在条件声明需要时传入规则的原始作者字符串。
pub type ResolverFn =
    dyn Fn(&ArgumentContext, Option<&str>) -> std::result::Result<Value, ResolutionError>
        + Send
        + Sync;

/// 事实来源
#[derive(Clone)]
pub enum FactSource {
    /// 直接读取上下文中的键
    Argument(String),
    /// 调用回调计算
    Resolver {
        resolver: Arc<ResolverFn>,
        /// 是否把规则的原始作者字符串作为第二个参数传入
        pass_authored: bool,
    },
}

impl fmt::Debug for FactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Argument(key) => f.debug_tuple("Argument").field(key).finish(),
            Self::Resolver { pass_authored, .. } => f
                .debug_struct("Resolver")
                .field("pass_authored", pass_authored)
                .finish_non_exhaustive(),
        }
    }
}

/// 条件定义
#[derive(Debug, Clone)]
pub struct ConditionDefinition {
    pub name: String,
    pub label: String,
    /// 展示分类，不参与评估
    pub group: String,
    pub value_type: ValueType,
    /// 显式指定的操作符集合，为空时使用类型默认集合
    pub operator_override: Option<Vec<Operator>>,
    /// 布尔类型可以不指定来源，此时读取与条件同名的上下文键
    pub source: Option<FactSource>,
    pub required_arguments: BTreeSet<String>,
}

impl ConditionDefinition {
    fn base(name: impl Into<String>, value_type: ValueType, source: Option<FactSource>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            group: String::new(),
            value_type,
            operator_override: None,
            source,
            required_arguments: BTreeSet::new(),
        }
    }

    /// 直接读取上下文键的条件
    pub fn argument(
        name: impl Into<String>,
        value_type: ValueType,
        argument_key: impl Into<String>,
    ) -> Self {
        Self::base(
            name,
            value_type,
            Some(FactSource::Argument(argument_key.into())),
        )
    }

    /// 由回调计算事实的条件
    pub fn resolved<F>(name: impl Into<String>, value_type: ValueType, resolver: F) -> Self
    where
        F: Fn(&ArgumentContext, Option<&str>) -> std::result::Result<Value, ResolutionError>
            + Send
            + Sync
            + 'static,
    {
        Self::base(
            name,
            value_type,
            Some(FactSource::Resolver {
                resolver: Arc::new(resolver),
                pass_authored: false,
            }),
        )
    }

    /// 布尔开关条件，不需要取值回调
    pub fn flag(name: impl Into<String>) -> Self {
        Self::base(name, ValueType::Boolean, None)
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn operators(mut self, operators: impl IntoIterator<Item = Operator>) -> Self {
        self.operator_override = Some(operators.into_iter().collect());
        self
    }

    pub fn require<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_arguments
            .extend(keys.into_iter().map(Into::into));
        self
    }

    /// 让回调额外收到规则的原始作者字符串
    pub fn with_authored_value(mut self) -> Self {
        if let Some(FactSource::Resolver { pass_authored, .. }) = &mut self.source {
            *pass_authored = true;
        }
        self
    }

    /// 生效的操作符集合：显式覆盖优先，否则取类型默认
    pub fn operators_in_effect(&self) -> &[Operator] {
        match &self.operator_override {
            Some(ops) => ops.as_slice(),
            None => self.value_type.default_operators(),
        }
    }

    pub fn allows(&self, operator: Operator) -> bool {
        self.operators_in_effect().contains(&operator)
    }

    fn validate(&self) -> std::result::Result<(), RegistrationError> {
        let malformed = |reason: &str| RegistrationError::MalformedDefinition {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(malformed("条件名不能为空"));
        }

        match &self.source {
            None if self.value_type != ValueType::Boolean => {
                return Err(malformed("非布尔条件必须指定参数键或取值回调"));
            }
            Some(FactSource::Argument(key)) if key.trim().is_empty() => {
                return Err(malformed("参数键不能为空"));
            }
            _ => {}
        }

        if let Some(ops) = &self.operator_override {
            if ops.is_empty() {
                return Err(malformed("显式操作符集合不能为空"));
            }
            if let Some(op) = ops.iter().find(|op| !self.value_type.supports(**op)) {
                return Err(malformed(&format!(
                    "操作符 {} 不适用于类型 {}",
                    op, self.value_type
                )));
            }
        }

        Ok(())
    }
}

/// 声明式条件定义，用于从配置文件加载仅读取上下文键的条件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionSpec {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(rename = "type")]
    pub value_type: String,
    #[serde(default)]
    pub operators: Option<Vec<String>>,
    /// 参数键，缺省时与条件名相同
    #[serde(default)]
    pub argument: Option<String>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl TryFrom<ConditionSpec> for ConditionDefinition {
    type Error = RegistrationError;

    fn try_from(spec: ConditionSpec) -> std::result::Result<Self, Self::Error> {
        let value_type: ValueType =
            spec.value_type
                .parse()
                .map_err(|_| RegistrationError::UnknownType {
                    name: spec.name.clone(),
                    value_type: spec.value_type.clone(),
                })?;

        let argument = spec.argument.unwrap_or_else(|| spec.name.clone());
        let mut definition = Self::argument(spec.name.clone(), value_type, argument)
            .require(spec.required);

        if let Some(label) = spec.label {
            definition = definition.label(label);
        }
        if let Some(group) = spec.group {
            definition = definition.group(group);
        }
        if let Some(operators) = spec.operators {
            let parsed = operators
                .iter()
                .map(|op| op.parse::<Operator>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| RegistrationError::MalformedDefinition {
                    name: spec.name.clone(),
                    reason: e.to_string(),
                })?;
            definition = definition.operators(parsed);
        }

        Ok(definition)
    }
}

/// 条件目录
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    definitions: Vec<Arc<ConditionDefinition>>,
    index: HashMap<String, usize>,
}

impl Catalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册条件定义
    ///
    /// 重名或定义无效时返回错误，目录保持不变。
    pub fn register(
        &mut self,
        definition: ConditionDefinition,
    ) -> std::result::Result<(), RegistrationError> {
        definition.validate()?;

        if self.index.contains_key(&definition.name) {
            return Err(RegistrationError::DuplicateCondition {
                name: definition.name,
            });
        }

        debug!(
            condition = %definition.name,
            value_type = %definition.value_type,
            "条件已注册"
        );
        self.index
            .insert(definition.name.clone(), self.definitions.len());
        self.definitions.push(Arc::new(definition));
        Ok(())
    }

    /// 链式注册，便于一次性构建目录
    pub fn with(
        mut self,
        definition: ConditionDefinition,
    ) -> std::result::Result<Self, RegistrationError> {
        self.register(definition)?;
        Ok(self)
    }

    pub fn register_spec(&mut self, spec: ConditionSpec) -> std::result::Result<(), RegistrationError> {
        self.register(spec.try_into()?)
    }

    /// 从声明式 JSON 数组构建目录
    pub fn from_json(json: &str) -> Result<Self> {
        let specs: Vec<ConditionSpec> = serde_json::from_str(json)?;
        let mut catalogue = Self::new();
        for spec in specs {
            catalogue.register_spec(spec)?;
        }

        info!("条件目录已加载: {} 个条件", catalogue.len());
        Ok(catalogue)
    }

    /// 从文件加载声明式目录
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn get(&self, name: &str) -> Option<&ConditionDefinition> {
        self.index
            .get(name)
            .map(|&i| self.definitions[i].as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// 条件的生效操作符集合
    pub fn operators(&self, name: &str) -> Option<&[Operator]> {
        self.get(name).map(ConditionDefinition::operators_in_effect)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// 按注册顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &ConditionDefinition> {
        self.definitions.iter().map(|d| d.as_ref())
    }

    /// 按展示分类归组，供编辑界面列出可选条件
    pub fn grouped(&self) -> Vec<(String, Vec<&ConditionDefinition>)> {
        let mut groups: Vec<(String, Vec<&ConditionDefinition>)> = Vec::new();
        for definition in self.iter() {
            match groups.iter_mut().find(|(g, _)| *g == definition.group) {
                Some((_, members)) => members.push(definition),
                None => groups.push((definition.group.clone(), vec![definition])),
            }
        }
        groups
    }
}
