//! 输出形状约束：用 schemars 从 Rust 类型生成 JSON Schema
//!
//! 路由决策与 ReAct 决策都以此约束补全服务，减少格式错误；但约束只是提示，解析仍按宽松策略进行。

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// 一个命名的 JSON Schema
#[derive(Debug, Clone)]
pub struct OutputSchema {
    pub name: String,
    pub schema: Value,
}

impl OutputSchema {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    /// 从实现 JsonSchema 的类型生成
    pub fn of<T: JsonSchema>(name: impl Into<String>) -> Self {
        let schema = serde_json::to_value(schema_for!(T)).unwrap_or(Value::Null);
        Self::new(name, schema)
    }

    /// 供不支持原生结构化输出的后端拼入 prompt 的说明文本
    pub fn instruction(&self) -> String {
        let pretty = serde_json::to_string_pretty(&self.schema).unwrap_or_default();
        format!(
            "Respond ONLY with a single JSON object (`{}`) that conforms to this JSON Schema. \
             Do not add prose or markdown around it.\n{}",
            self.name, pretty
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    #[derive(JsonSchema)]
    struct Sample {
        action: String,
        count: u32,
    }

    #[test]
    fn test_schema_of_lists_fields() {
        let schema = OutputSchema::of::<Sample>("sample");
        let text = schema.schema.to_string();
        assert!(text.contains("action"));
        assert!(text.contains("count"));
        assert!(schema.instruction().contains("`sample`"));
    }
}
