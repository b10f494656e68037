use crate::tools::types::{RegistryError, Tool, ToolArgs, ToolError, ToolSpec};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, warn};

/// Registry of the tools available to one session.
///
/// Names are unique. The registry performs no I/O of its own; tools do.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with no tools, used by stages that only reformat text
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a registry from an explicit list of tools
    pub fn from_tools<I>(tools: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = Arc<dyn Tool>>,
    {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        debug!(tool = %name, "registered tool");
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.index
            .get(name)
            .map(|&i| self.tools[i].clone())
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Get all tool specifications, in registration order
    pub fn get_all_specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    /// Validate arguments against tool schema
    pub fn validate_args(&self, name: &str, args: &Value) -> Result<ToolArgs, ToolError> {
        let tool = self.resolve(name)?;
        tool.spec().validate(args)
    }

    /// Resolve, validate and run a tool.
    ///
    /// Adapter failures and panics both come back as [`ToolError`].
    pub async fn invoke(&self, name: &str, args: &Value) -> Result<String, ToolError> {
        let handle = self.spawn(name, args)?;
        Self::join(name, handle.await)
    }

    /// Resolve and validate, then start the tool on its own task.
    ///
    /// Dropping the handle detaches the task; call `abort` to stop it.
    pub fn spawn(&self, name: &str, args: &Value) -> Result<JoinHandle<Result<String, ToolError>>, ToolError> {
        let tool = self.resolve(name)?;
        let validated = tool.spec().validate(args)?;
        Ok(tokio::spawn(async move { tool.invoke(validated).await }))
    }

    /// Map a finished tool task to its result
    pub fn join(name: &str, joined: Result<Result<String, ToolError>, JoinError>) -> Result<String, ToolError> {
        match joined {
            Ok(result) => result,
            Err(join_err) => {
                warn!(tool = %name, "tool task aborted: {}", join_err);
                let message = if join_err.is_panic() {
                    "tool panicked".to_string()
                } else {
                    format!("tool task aborted: {}", join_err)
                };
                Err(ToolError::execution(name, message))
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.names()).finish()
    }
}
