use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Primitive argument types a tool may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
        }
    }

    /// Whether a JSON value is acceptable for this type. Integers are
    /// counts and limits, so they must fit in a `u32`.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.as_u64().map_or(false, |n| u32::try_from(n).is_ok()),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
        }
    }
}

/// One named parameter in a tool's schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(name: &str, kind: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: true,
            default: None,
        }
    }

    pub fn optional(name: &str, kind: ParamType, description: &str, default: Value) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: false,
            default: if default.is_null() { None } else { Some(default) },
        }
    }
}

/// Model-facing description of a tool. Prompts reference tools by `name`,
/// so these must stay stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
}

impl ToolSpec {
    /// JSON Schema object for the parameter list
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            let mut prop = json!({
                "type": param.kind.as_str(),
                "description": param.description,
            });
            if let Some(default) = &param.default {
                prop["default"] = default.clone();
            }
            properties.insert(param.name.clone(), prop);
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Check required fields and primitive types, then fill in defaults.
    pub fn validate(&self, args: &Value) -> Result<ToolArgs, ToolError> {
        let invalid = |message: String| ToolError::Validation {
            tool: self.name.clone(),
            message,
        };

        let obj = match args {
            Value::Object(obj) => obj,
            // models sometimes send no arguments at all for parameterless tools
            Value::Null => return self.validate(&Value::Object(Map::new())),
            _ => return Err(invalid("Arguments must be an object".to_string())),
        };

        let mut normalized = obj.clone();
        for param in &self.parameters {
            match obj.get(&param.name) {
                Some(Value::Null) | None => {
                    if param.required {
                        return Err(invalid(format!("Missing required field: {}", param.name)));
                    }
                    match &param.default {
                        Some(default) => {
                            normalized.insert(param.name.clone(), default.clone());
                        }
                        None => {
                            normalized.remove(&param.name);
                        }
                    }
                }
                Some(value) => {
                    let whole = value.is_i64() || value.is_u64();
                    if param.kind == ParamType::Integer && whole && !param.kind.accepts(value) {
                        return Err(invalid(format!(
                            "Field '{}' must be between 0 and {}, got {}",
                            param.name,
                            u32::MAX,
                            value
                        )));
                    }
                    if !param.kind.accepts(value) {
                        return Err(invalid(format!(
                            "Field '{}' must be of type {}, got {}",
                            param.name,
                            param.kind.as_str(),
                            value
                        )));
                    }
                }
            }
        }

        Ok(ToolArgs(normalized))
    }
}

/// Validated tool arguments with defaults applied
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.str(key).unwrap_or(default)
    }

    /// Integer argument, or `default` when absent or out of range
    pub fn u32_or(&self, key: &str, default: u32) -> u32 {
        self.0
            .get(key)
            .and_then(|v| v.as_u64())
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(default)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    /// Fetch a required string, failing as a validation error of `tool`
    pub fn require_str(&self, tool: &str, key: &str) -> Result<&str, ToolError> {
        self.str(key).ok_or_else(|| ToolError::Validation {
            tool: tool.to_string(),
            message: format!("Missing required field: {}", key),
        })
    }
}

impl From<Map<String, Value>> for ToolArgs {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Uniform failure of a single tool call. Always recoverable inside a session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Validation error in {tool}: {message}")]
    Validation { tool: String, message: String },

    #[error("Tool {tool} failed: {message}")]
    Execution { tool: String, message: String },

    #[error("Tool {tool} timed out after {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },
}

impl ToolError {
    pub fn execution(tool: &str, message: impl Into<String>) -> Self {
        ToolError::Execution {
            tool: tool.to_string(),
            message: message.into(),
        }
    }

    pub fn tool(&self) -> &str {
        match self {
            ToolError::UnknownTool(tool) => tool,
            ToolError::Validation { tool, .. }
            | ToolError::Execution { tool, .. }
            | ToolError::Timeout { tool, .. } => tool,
        }
    }

    /// Whether the tool was never invoked because the call itself was malformed
    pub fn is_validation(&self) -> bool {
        matches!(self, ToolError::Validation { .. } | ToolError::UnknownTool(_))
    }

    /// Detail without the tool name prefix, as shown in log events
    pub fn detail(&self) -> String {
        match self {
            ToolError::UnknownTool(tool) => format!("unknown tool '{}'", tool),
            ToolError::Validation { message, .. } | ToolError::Execution { message, .. } => message.clone(),
            ToolError::Timeout { timeout_ms, .. } => format!("timed out after {}ms", timeout_ms),
        }
    }
}

/// Errors raised while building a registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool already registered: {0}")]
    DuplicateTool(String),
}

/// A named, schema-described capability the model may invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> Vec<ParamSpec>;

    /// Run the tool with already validated arguments
    async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}
