//! Tool dispatch for one round-trip.

use std::time::Instant;

use serde_json::{Map, Value, json};
use tracing::Instrument;

use crate::chat::{ToolCallInfo, ToolResultInfo};
use crate::event::{ConverseEvent, EventSink};

use super::{ToolArgs, ToolSet};

/// Prefix of the marker appended to truncated results.
pub const TRUNCATION_MARKER: &str = "\n... [truncated, original length: ";

/// Renders an error as the tool-result payload the model sees.
pub fn error_payload(message: &str) -> String {
    json!({ "error": message }).to_string()
}

/// Truncates `result` to `max_chars` characters, appending a marker that
/// records the original character count.
pub fn truncate_result(result: String, max_chars: usize) -> String {
    let total = result.chars().count();
    if total <= max_chars {
        return result;
    }
    let mut truncated: String = result.chars().take(max_chars).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated.push_str(&format!("{total} characters]"));
    truncated
}

/// Executes the calls of one round-trip, one after another.
///
/// Always returns exactly one result per call, in call order. Unknown
/// tools, unparsable arguments and tool errors become `{"error": ...}`
/// payloads; nothing here aborts the conversation.
pub async fn execute_calls(
    tools: &ToolSet,
    calls: &[ToolCallInfo],
    sink: &dyn EventSink,
    max_result_len: Option<usize>,
) -> Vec<ToolResultInfo> {
    let mut results = Vec::with_capacity(calls.len());
    for call in calls {
        sink.emit(&ConverseEvent::ToolCallStart {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        });

        let start = Instant::now();
        let span = tracing::debug_span!("tool_call", tool = %call.name, call_id = %call.id);
        let result = execute_one(tools, call, sink).instrument(span).await;
        let result = match max_result_len {
            Some(max) => truncate_result(result, max),
            None => result,
        };

        sink.emit(&ConverseEvent::ToolCallEnd {
            id: call.id.clone(),
            name: call.name.clone(),
            result: result.clone(),
            duration: start.elapsed(),
        });
        results.push(ToolResultInfo {
            id: call.id.clone(),
            name: call.name.clone(),
            result,
        });
    }
    results
}

async fn execute_one(tools: &ToolSet, call: &ToolCallInfo, sink: &dyn EventSink) -> String {
    let report = |message: String| {
        tracing::warn!(error = %message, "tool call failed");
        sink.emit(&ConverseEvent::ToolError {
            name: call.name.clone(),
            message: message.clone(),
        });
        error_payload(&message)
    };

    let Some(tool) = tools.get(&call.name) else {
        return report(format!("Unknown tool: {}", call.name));
    };

    let object = match parse_arguments(&call.arguments) {
        Ok(object) => object,
        Err(message) => return report(message),
    };

    let metadata = tool.metadata();
    let args = ToolArgs::from_object(&metadata.param_names(), object);
    match tool.call(args).await {
        Ok(output) => output.canonicalize().await,
        Err(e) => report(e.message),
    }
}

/// Parses a raw argument string into an object. Blank input is `{}`.
fn parse_arguments(raw: &str) -> Result<Map<String, Value>, String> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err("Invalid arguments: expected a JSON object".into()),
        Err(e) => Err(format!("Invalid JSON arguments: {e}")),
    }
}
