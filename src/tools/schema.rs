//! 工具参数：schemars 生成 JSON Schema，serde 反序列化 LLM 给出的参数
//!
//! 生成的 schema 去掉 $schema / title，Option 字段不加 null 类型，子结构内联，
//! 以兼容各家 OpenAI 兼容接口对函数参数 schema 的限制。

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::core::ToolError;
use crate::tools::ToolKind;

/// 参数结构体 T 的 JSON Schema
pub fn schema_of<T: JsonSchema>() -> Value {
    let gen = SchemaSettings::draft07()
        .with(|s| {
            s.option_nullable = false;
            s.option_add_null_type = false;
            s.inline_subschemas = true;
        })
        .into_generator();
    let root = gen.into_root_schema_for::<T>();
    let mut value = serde_json::to_value(root).unwrap_or_else(|_| json!({ "type": "object" }));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.remove("definitions");
    }
    strip_formats(&mut value);
    value
}

/// schemars 给整数加的 "format": "uint" 之类不是所有后端都接受
fn strip_formats(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("format");
            map.values_mut().for_each(strip_formats);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_formats),
        _ => {}
    }
}

/// 反序列化工具参数；缺省参数（null）按空对象处理
pub fn parse_args<T: DeserializeOwned>(kind: ToolKind, args: Value) -> Result<T, ToolError> {
    let args = match args {
        Value::Null => json!({}),
        other => other,
    };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        tool: kind.name().to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Args {
        /// What to look for
        query: String,
        #[serde(default)]
        limit: Option<u32>,
    }

    #[test]
    fn test_schema_shape() {
        let schema = schema_of::<Args>();
        assert_eq!(schema["type"], "object");
        assert!(schema.get("$schema").is_none());
        assert!(schema.get("title").is_none());
        assert_eq!(schema["properties"]["query"]["description"], "What to look for");
        assert_eq!(schema["properties"]["limit"]["type"], "integer");
        assert!(schema["properties"]["limit"].get("format").is_none());
        assert_eq!(schema["required"], json!(["query"]));
    }

    #[test]
    fn test_parse_args() {
        let args: Args = parse_args(ToolKind::MailSearch, json!({"query": "pepper"})).unwrap();
        assert_eq!(args, Args { query: "pepper".into(), limit: None });

        let err = parse_args::<Args>(ToolKind::MailSearch, Value::Null).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { ref tool, .. } if tool == "mail.search"));

        let err = parse_args::<Args>(ToolKind::MailSearch, Value::String("{oops".into()));
        assert!(err.is_err());
    }
}
