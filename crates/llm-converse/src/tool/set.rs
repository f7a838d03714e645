//! Tool set: tools by name.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{Tool, ToolMetadata};

/// The tools available to one conversation.
///
/// Registering a name that already exists replaces the earlier tool but
/// keeps its position, so definitions are sent to the model in first
/// registration order.
#[derive(Default, Clone)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool. The last registration of a name wins.
    pub fn register(&mut self, tool: impl Tool + 'static) -> &mut Self {
        self.register_shared(Arc::new(tool))
    }

    /// Registers a shared tool.
    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        let name = tool.metadata().name.clone();
        if let Some(&slot) = self.index.get(&name) {
            tracing::debug!(tool = %name, "replacing registered tool");
            self.tools[slot] = tool;
        } else {
            self.index.insert(name, self.tools.len());
            self.tools.push(tool);
        }
        self
    }

    /// Registers every tool from `other`, with the same replacement rule.
    pub fn extend(&mut self, other: &ToolSet) -> &mut Self {
        for tool in &other.tools {
            self.register_shared(Arc::clone(tool));
        }
        self
    }

    /// Looks up a tool by exact name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&slot| &self.tools[slot])
    }

    /// Returns `true` if a tool named `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Metadata for every tool, in registration order.
    pub fn definitions(&self) -> Vec<ToolMetadata> {
        self.tools.iter().map(|t| t.metadata().clone()).collect()
    }

    /// Tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools
            .iter()
            .map(|t| t.metadata().name.as_str())
            .collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
