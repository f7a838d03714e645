//! Explicit tool registration.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value, json};

use super::{Tool, ToolArgs, ToolError, ToolMetadata, ToolReturn};

type HandlerFuture = Pin<Box<dyn Future<Output = Result<ToolReturn, ToolError>> + Send>>;
type BoxedHandler = Arc<dyn Fn(ToolArgs) -> HandlerFuture + Send + Sync>;

#[derive(Debug, Clone)]
struct ParamSpec {
    name: String,
    schema: Value,
    optional: bool,
}

/// Declares a tool's name, description and ordered parameters, then wraps
/// a closure into a [`FnTool`].
#[derive(Debug, Clone)]
pub struct ToolBuilder {
    name: String,
    description: String,
    params: Vec<ParamSpec>,
}

impl ToolBuilder {
    /// Starts a tool with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            params: Vec::new(),
        }
    }

    /// Sets the description shown to the model.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends a required parameter.
    #[must_use]
    pub fn param(self, name: impl Into<String>, schema: Value) -> Self {
        self.push_param(name.into(), schema, false)
    }

    /// Appends an optional parameter. When the model omits it the handler
    /// sees `Null` in its slot.
    #[must_use]
    pub fn optional_param(self, name: impl Into<String>, schema: Value) -> Self {
        self.push_param(name.into(), schema, true)
    }

    fn push_param(mut self, name: String, schema: Value, optional: bool) -> Self {
        // Redeclaring a name replaces it in place.
        if let Some(existing) = self.params.iter_mut().find(|p| p.name == name) {
            existing.schema = schema;
            existing.optional = optional;
        } else {
            self.params.push(ParamSpec {
                name,
                schema,
                optional,
            });
        }
        self
    }

    /// Builds the metadata for the declared parameters.
    pub fn metadata(&self) -> ToolMetadata {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.params {
            properties.insert(param.name.clone(), param.schema.clone());
            if !param.optional {
                required.push(Value::String(param.name.clone()));
            }
        }
        ToolMetadata {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }

    /// Finishes the tool with an async handler.
    pub fn handler<F, Fut, R>(self, handler: F) -> FnTool
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ToolError>> + Send + 'static,
        R: Into<ToolReturn> + Send + 'static,
    {
        let metadata = self.metadata();
        FnTool {
            metadata,
            handler: Arc::new(move |args: ToolArgs| -> HandlerFuture {
                let fut = handler(args);
                Box::pin(async move { fut.await.map(Into::into) })
            }),
        }
    }

    /// Finishes the tool with a synchronous handler.
    pub fn sync_handler<F, R>(self, handler: F) -> FnTool
    where
        F: Fn(ToolArgs) -> Result<R, ToolError> + Send + Sync + 'static,
        R: Into<ToolReturn> + Send + 'static,
    {
        let metadata = self.metadata();
        FnTool {
            metadata,
            handler: Arc::new(move |args: ToolArgs| -> HandlerFuture {
                let result = handler(args).map(Into::into);
                Box::pin(std::future::ready(result))
            }),
        }
    }
}

/// A tool backed by a closure, created by [`ToolBuilder`].
#[derive(Clone)]
pub struct FnTool {
    metadata: ToolMetadata,
    handler: BoxedHandler,
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.metadata.name)
            .finish_non_exhaustive()
    }
}

impl Tool for FnTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn call(
        &self,
        args: ToolArgs,
    ) -> Pin<Box<dyn Future<Output = Result<ToolReturn, ToolError>> + Send + '_>> {
        (self.handler)(args)
    }
}
