//! Conversion between the conversation model and Anthropic wire JSON.

use llm_converse::chat::{ChatResponse, ContentPart, ImageRef, ToolCallInfo, ToolResultInfo, Usage};
use llm_converse::error::LlmError;
use llm_converse::provider::RequestParts;
use llm_converse::store::STORE_TOOL_NAME;
use llm_converse::stream::ToolCallAccumulator;
use serde_json::{Map, Value, json};

use crate::config::AnthropicOptions;
use crate::types::{Request, Response, ResponseUsage, Thinking, Tool, ToolChoice};

// ── Request conversion ───────────────────────────────────────────────

/// Assembles the request body around already formatted `messages`.
///
/// When the store tool is offered, `tool_choice` forces it; Anthropic has
/// no response-format field. The API rejects extended thinking together
/// with a forced tool, so `thinking` is left out of those requests.
pub(crate) fn build_request<'a>(
    parts: &RequestParts<'a>,
    options: &AnthropicOptions,
    messages: Vec<Value>,
) -> Request<'a> {
    let tools: Vec<Tool<'a>> = parts
        .tools
        .iter()
        .map(|t| Tool {
            name: &t.name,
            description: &t.description,
            input_schema: &t.parameters,
        })
        .collect();

    let tool_choice = tools
        .iter()
        .any(|t| t.name == STORE_TOOL_NAME)
        .then_some(ToolChoice {
            choice_type: "tool",
            name: STORE_TOOL_NAME,
        });

    let thinking = match (options.thinking_budget, &tool_choice) {
        (Some(_), Some(_)) => {
            tracing::debug!("extended thinking disabled while the store tool is forced");
            None
        }
        (budget, _) => budget.map(|budget_tokens| Thinking {
            thinking_type: "enabled",
            budget_tokens,
        }),
    };

    Request {
        model: parts.model,
        max_tokens: parts.max_tokens.unwrap_or(options.default_max_tokens),
        messages,
        system: parts.system,
        temperature: parts.temperature,
        stream: parts.stream.then_some(true),
        tools,
        tool_choice,
        thinking,
    }
}

/// A user turn: a plain string for lone text, content blocks otherwise.
pub(crate) fn user_message(content: &[ContentPart], prepended: &[ImageRef]) -> Value {
    if prepended.is_empty() {
        if let [ContentPart::Text(text)] = content {
            return json!({ "role": "user", "content": text });
        }
    }

    let blocks: Vec<Value> = prepended
        .iter()
        .map(image_block)
        .chain(content.iter().map(|part| match part {
            ContentPart::Text(text) => json!({ "type": "text", "text": text }),
            ContentPart::Image(image) => image_block(image),
        }))
        .collect();
    json!({ "role": "user", "content": blocks })
}

fn image_block(image: &ImageRef) -> Value {
    let source = match image.as_base64() {
        Some((media_type, data)) => {
            json!({ "type": "base64", "media_type": media_type, "data": data })
        }
        None => json!({ "type": "url", "url": image.as_str() }),
    };
    json!({ "type": "image", "source": source })
}

/// An assistant turn as text plus `tool_use` blocks.
///
/// Arguments that are not a JSON object are sent as `{}`; the matching
/// tool result already told the model they were rejected.
pub(crate) fn assistant_message(text: &str, tool_calls: &[ToolCallInfo]) -> Value {
    if tool_calls.is_empty() {
        return json!({ "role": "assistant", "content": text });
    }

    let mut blocks = Vec::with_capacity(tool_calls.len() + 1);
    if !text.is_empty() {
        blocks.push(json!({ "type": "text", "text": text }));
    }
    for call in tool_calls {
        let input = serde_json::from_str::<Value>(&call.arguments)
            .ok()
            .filter(Value::is_object)
            .unwrap_or_else(|| Value::Object(Map::new()));
        blocks.push(json!({
            "type": "tool_use",
            "id": call.id,
            "name": call.name,
            "input": input,
        }));
    }
    json!({ "role": "assistant", "content": blocks })
}

/// All results of one round-trip in a single `user` message.
pub(crate) fn tool_results_message(results: &[ToolResultInfo]) -> Value {
    let blocks: Vec<Value> = results
        .iter()
        .map(|r| {
            let mut block = json!({
                "type": "tool_result",
                "tool_use_id": r.id,
                "content": r.result,
            });
            if is_error_payload(&r.result) {
                block["is_error"] = Value::Bool(true);
            }
            block
        })
        .collect();
    json!({ "role": "user", "content": blocks })
}

/// Matches the `{"error": "..."}` payload the tool executor writes.
fn is_error_payload(result: &str) -> bool {
    result.starts_with("{\"error\"")
        && serde_json::from_str::<Map<String, Value>>(result)
            .is_ok_and(|obj| obj.len() == 1 && obj.get("error").is_some_and(Value::is_string))
}

// ── Response conversion ──────────────────────────────────────────────

/// Converts a non-streaming response and returns the reasoning text
/// alongside it.
pub(crate) fn convert_response(
    resp: Response,
    raw: &str,
) -> Result<(ChatResponse, String), LlmError> {
    let Some(blocks) = resp.content else {
        return Err(LlmError::ResponseFormat {
            message: "response has no content array".into(),
            raw: raw.to_owned(),
        });
    };

    let mut content = String::new();
    let mut reasoning = String::new();
    let mut calls = ToolCallAccumulator::new();
    for (index, block) in (0u32..).zip(blocks) {
        match block.content_type.as_str() {
            "text" => content.push_str(block.text.as_deref().unwrap_or_default()),
            "thinking" => reasoning.push_str(block.thinking.as_deref().unwrap_or_default()),
            "tool_use" => {
                let arguments = block.input.map(|v| v.to_string());
                calls.apply(
                    index,
                    block.id.as_deref(),
                    block.name.as_deref(),
                    arguments.as_deref(),
                );
            }
            other => tracing::debug!(block_type = other, "skipping content block"),
        }
    }

    let response = ChatResponse {
        content,
        tool_calls: calls.finish(),
        usage: resp.usage.map(convert_usage).unwrap_or_default(),
    };
    Ok((response, reasoning))
}

pub(crate) fn convert_usage(usage: ResponseUsage) -> Usage {
    Usage {
        input_tokens: usage.input_tokens.unwrap_or_default(),
        output_tokens: usage.output_tokens.unwrap_or_default(),
    }
}
