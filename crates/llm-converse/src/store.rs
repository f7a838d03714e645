//! Structured-output capture through a tool call.
//!
//! A [`Store<T>`] is a tool named [`STORE_TOOL_NAME`] whose parameters are
//! the fields of a schema. When the model calls it, the arguments are
//! rebuilt into an object, validated, and written into a slot the loop
//! polls after every tool batch. A filled slot ends the conversation
//! immediately, even if the model asked for more tools in the same turn.
//!
//! Validation failures are returned as tool errors, so the model sees the
//! rejection and can retry with corrected arguments.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::LlmError;
use crate::schema::ResolvedSchema;
use crate::tool::{Tool, ToolArgs, ToolError, ToolMetadata, ToolReturn};

/// Name of the store tool as seen by the model.
pub const STORE_TOOL_NAME: &str = "store_output";

/// Acknowledgement returned to the model after a successful store.
pub const STORE_ACK: &str = "Output stored successfully.";

/// A tool that captures one validated value of type `T`.
///
/// Create one per conversation run; the slot is never cleared.
pub struct Store<T> {
    metadata: ToolMetadata,
    schema: ResolvedSchema<T>,
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> std::fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("schema", &self.schema)
            .field("filled", &self.is_filled())
            .finish()
    }
}

impl<T: DeserializeOwned + Clone + Send + 'static> Store<T> {
    /// Creates a store bound to `schema`.
    pub fn new(schema: ResolvedSchema<T>) -> Result<Self, LlmError> {
        let parameters = schema.json_schema().clone();
        if parameters.get("properties").and_then(Value::as_object).is_none() {
            return Err(LlmError::InvalidRequest(
                "store schema must be an object schema with properties".into(),
            ));
        }
        Ok(Self {
            metadata: ToolMetadata {
                name: STORE_TOOL_NAME.into(),
                description: "Store the final structured output. Call this exactly once with \
                              every field of the result."
                    .into(),
                parameters,
            },
            schema,
            slot: Arc::new(Mutex::new(None)),
        })
    }

    /// The captured value, if the model has stored one.
    pub fn get(&self) -> Option<T> {
        lock(&self.slot).clone()
    }

    /// Removes and returns the captured value.
    pub fn take(&self) -> Option<T> {
        lock(&self.slot).take()
    }

    /// Returns a handle that shares this store's slot.
    pub(crate) fn handle(&self) -> Self {
        Self {
            metadata: self.metadata.clone(),
            schema: self.schema.clone(),
            slot: Arc::clone(&self.slot),
        }
    }

    fn store(&self, args: ToolArgs) -> Result<(), ToolError> {
        let mut object = Map::new();
        for (name, value) in self.metadata.param_names().into_iter().zip(args.into_values()) {
            if !value.is_null() {
                object.insert(name.to_owned(), value);
            }
        }
        let value = self.schema.parse(&Value::Object(object))?;

        let mut slot = lock(&self.slot);
        if slot.is_none() {
            *slot = Some(value);
        } else {
            tracing::debug!("store already filled; keeping first value");
        }
        Ok(())
    }
}

impl<T> Store<T> {
    /// The schema stored values are validated against.
    pub fn schema(&self) -> &ResolvedSchema<T> {
        &self.schema
    }

    /// Returns `true` once a value has been captured.
    pub fn is_filled(&self) -> bool {
        lock(&self.slot).is_some()
    }
}

/// Ignores poisoning: the slot is a plain `Option` written in one step.
fn lock<T>(slot: &Mutex<Option<T>>) -> std::sync::MutexGuard<'_, Option<T>> {
    slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl<T: DeserializeOwned + Clone + Send + 'static> Tool for Store<T> {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn call(
        &self,
        args: ToolArgs,
    ) -> Pin<Box<dyn Future<Output = Result<ToolReturn, ToolError>> + Send + '_>> {
        let result = self.store(args).map(|()| ToolReturn::Text(STORE_ACK.into()));
        Box::pin(std::future::ready(result))
    }
}
