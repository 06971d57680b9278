//! 取值器
//!
//! 为一条规则求出比较的两个操作数：实时值（来自上下文或回调）与阈值（来自规则）。
//! 求值不修改任何输入，同样的输入总是得到同样的结果（回调自身的副作用除外）。

use crate::catalogue::{ConditionDefinition, FactSource};
use crate::error::ResolutionError;
use crate::models::{ArgumentContext, INJECTED_NUMBER, INJECTED_TEXT, INJECTED_UNIT};
use crate::types::ValueType;
use serde_json::{Map, Value};
use std::panic::{self, AssertUnwindSafe};

/// 比较的两个操作数
#[derive(Debug, Clone, PartialEq)]
pub struct Operands {
    pub live: Value,
    pub threshold: Value,
}

pub struct ValueResolver;

impl ValueResolver {
    pub fn resolve(
        definition: &ConditionDefinition,
        authored: &Value,
        context: &ArgumentContext,
    ) -> Result<Operands, ResolutionError> {
        let live = Self::live(definition, authored, context)?;
        let threshold = Self::threshold(definition.value_type, authored);
        Ok(Operands { live, threshold })
    }

    /// 比较用的阈值：带单位类型取出 `number` / `text` 部分，其余类型原样使用
    pub fn threshold(value_type: ValueType, authored: &Value) -> Value {
        let field = match value_type {
            ValueType::NumberWithUnit => "number",
            ValueType::TextWithUnit => "text",
            _ => return authored.clone(),
        };

        match authored {
            Value::Object(obj) => obj.get(field).cloned().unwrap_or(Value::Null),
            other => other.clone(),
        }
    }

    /// 求实时值
    ///
    /// 上下文缺少参数键时使用类型零值，不视为错误。
    pub fn live(
        definition: &ConditionDefinition,
        authored: &Value,
        context: &ArgumentContext,
    ) -> Result<Value, ResolutionError> {
        let key = match &definition.source {
            Some(FactSource::Argument(key)) => key.as_str(),
            None => definition.name.as_str(),
            Some(FactSource::Resolver {
                resolver,
                pass_authored,
            }) => {
                let injected = Self::injected(definition.value_type, authored);
                let layered;
                let context = if injected.is_empty() {
                    context
                } else {
                    layered = context.overlay(injected);
                    &layered
                };

                let raw = if *pass_authored {
                    Self::authored_string(authored)
                } else {
                    None
                };

                return match panic::catch_unwind(AssertUnwindSafe(|| {
                    (**resolver)(context, raw.as_deref())
                })) {
                    Ok(outcome) => outcome,
                    Err(payload) => Err(ResolutionError::new(
                        &definition.name,
                        panic_message(payload.as_ref()),
                    )),
                };
            }
        };

        Ok(context
            .get(key)
            .cloned()
            .unwrap_or_else(|| definition.value_type.zero_value()))
    }

    /// 带单位类型注入 `_unit` 以及 `_number` 或 `_text`
    fn injected(value_type: ValueType, authored: &Value) -> Map<String, Value> {
        let mut injected = Map::new();
        let Some(obj) = authored.as_object() else {
            return injected;
        };

        let (field, key) = match value_type {
            ValueType::NumberWithUnit => ("number", INJECTED_NUMBER),
            ValueType::TextWithUnit => ("text", INJECTED_TEXT),
            _ => return injected,
        };

        if let Some(unit) = obj.get("unit") {
            injected.insert(INJECTED_UNIT.to_string(), unit.clone());
        }
        if let Some(value) = obj.get(field) {
            injected.insert(key.to_string(), value.clone());
        }
        injected
    }

    /// 规则的原始作者字符串
    pub fn authored_string(authored: &Value) -> Option<String> {
        match authored {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Object(obj) => obj
                .get("text")
                .or_else(|| obj.get("number"))
                .and_then(Self::authored_string),
            Value::Null | Value::Array(_) => None,
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("回调 panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("回调 panic: {}", s)
    } else {
        "回调 panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 按单位把上下文中的克数换算为作者使用的单位
    fn cart_weight() -> ConditionDefinition {
        ConditionDefinition::resolved("cart_weight", ValueType::NumberWithUnit, |ctx, _| {
            let grams = ctx.get("cart_grams").and_then(Value::as_f64).unwrap_or(0.0);
            match ctx.get(INJECTED_UNIT).and_then(Value::as_str) {
                Some("kg") => Ok(json!(grams / 1000.0)),
                Some("g") | None => Ok(json!(grams)),
                Some(other) => Err(ResolutionError::new("cart_weight", format!("unknown unit {other}"))),
            }
        })
    }

    #[test]
    fn test_argument_lookup() {
        let def = ConditionDefinition::argument("role", ValueType::Text, "user.role");
        let ctx = ArgumentContext::default().with("user", json!({"role": "admin"}));

        let operands = ValueResolver::resolve(&def, &json!("admin"), &ctx).unwrap();
        assert_eq!(operands.live, json!("admin"));
        assert_eq!(operands.threshold, json!("admin"));
    }

    #[test]
    fn test_missing_argument_uses_zero_value() {
        let def = ConditionDefinition::argument("total", ValueType::Number, "total");
        let live = ValueResolver::live(&def, &json!(10), &ArgumentContext::default()).unwrap();
        assert_eq!(live, json!(0));

        let tags = ConditionDefinition::argument("tags", ValueType::MultiSelect, "tags");
        let live = ValueResolver::live(&tags, &json!(["a"]), &ArgumentContext::default()).unwrap();
        assert_eq!(live, json!([]));
    }

    #[test]
    fn test_flag_reads_own_name() {
        let def = ConditionDefinition::flag("is_logged_in");
        let ctx = ArgumentContext::default().with("is_logged_in", true);
        assert_eq!(ValueResolver::live(&def, &Value::Null, &ctx).unwrap(), json!(true));
        assert_eq!(
            ValueResolver::live(&def, &Value::Null, &ArgumentContext::default()).unwrap(),
            json!(false)
        );
    }

    #[test]
    fn test_unit_is_injected() {
        let def = cart_weight();
        let ctx = ArgumentContext::default().with("cart_grams", 2500);

        let kg = ValueResolver::resolve(&def, &json!({"number": 2, "unit": "kg"}), &ctx).unwrap();
        assert_eq!(kg.live, json!(2.5));
        assert_eq!(kg.threshold, json!(2));

        let g = ValueResolver::resolve(&def, &json!({"number": 2, "unit": "g"}), &ctx).unwrap();
        assert_eq!(g.live, json!(2500.0));
        assert_eq!(g.threshold, json!(2));

        // 调用方的上下文不被修改
        assert!(!ctx.contains_key(INJECTED_UNIT));
    }

    #[test]
    fn test_injected_number_and_text() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let def = ConditionDefinition::resolved("label", ValueType::TextWithUnit, move |ctx, _| {
            sink.lock().push((
                ctx.get(INJECTED_TEXT).cloned(),
                ctx.get(INJECTED_UNIT).cloned(),
                ctx.get(INJECTED_NUMBER).cloned(),
            ));
            Ok(json!("x"))
        });

        let operands =
            ValueResolver::resolve(&def, &json!({"text": "red", "unit": "colour"}), &ArgumentContext::default())
                .unwrap();
        assert_eq!(operands.threshold, json!("red"));
        assert_eq!(
            seen.lock()[0],
            (Some(json!("red")), Some(json!("colour")), None)
        );
    }

    #[test]
    fn test_authored_string_passed_when_requested() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let def = ConditionDefinition::resolved("has_shortcode", ValueType::Boolean, move |ctx, raw| {
            counter.fetch_add(1, Ordering::SeqCst);
            let body = ctx.get("post_body").and_then(Value::as_str).unwrap_or("");
            let code = raw.unwrap_or_default();
            Ok(json!(!code.is_empty() && body.contains(&format!("[{code}"))))
        })
        .with_authored_value();

        let ctx = ArgumentContext::default().with("post_body", "intro [gallery id=1] outro");
        assert_eq!(ValueResolver::live(&def, &json!("gallery"), &ctx).unwrap(), json!(true));
        assert_eq!(ValueResolver::live(&def, &json!("video"), &ctx).unwrap(), json!(false));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_resolver_errors_are_returned() {
        let def = cart_weight();
        let err = ValueResolver::resolve(
            &def,
            &json!({"number": 1, "unit": "stone"}),
            &ArgumentContext::default(),
        )
        .unwrap_err();
        assert_eq!(err.condition, "cart_weight");
    }

    #[test]
    fn test_resolver_panic_is_caught() {
        let def = ConditionDefinition::resolved("boom", ValueType::Number, |_, _| {
            panic!("lookup service down")
        });
        let err = ValueResolver::live(&def, &json!(1), &ArgumentContext::default()).unwrap_err();
        assert!(err.message.contains("lookup service down"));
    }

    #[test]
    fn test_authored_string() {
        assert_eq!(ValueResolver::authored_string(&json!("abc")), Some("abc".into()));
        assert_eq!(ValueResolver::authored_string(&json!(12)), Some("12".into()));
        assert_eq!(
            ValueResolver::authored_string(&json!({"text": "t", "unit": "u"})),
            Some("t".into())
        );
        assert_eq!(ValueResolver::authored_string(&json!([1])), None);
    }
}
