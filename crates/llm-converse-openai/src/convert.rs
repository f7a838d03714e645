//! Conversion between the conversation model and `OpenAI` wire JSON.

use llm_converse::chat::{ChatResponse, ContentPart, ImageRef, ToolCallInfo, ToolResultInfo, Usage};
use llm_converse::error::LlmError;
use llm_converse::provider::RequestParts;
use llm_converse::stream::ToolCallAccumulator;
use serde_json::{Map, Value, json};

use crate::config::{OpenAiOptions, SCHEMA_NAME};
use crate::types::{
    FunctionDef, JsonSchemaFormat, Request, Response, ResponseFormat, ResponseUsage, StreamOptions,
    Tool,
};

// ── Request conversion ───────────────────────────────────────────────

/// Assembles the request body around already formatted `messages`.
///
/// The system prompt becomes a leading `system` message.
pub(crate) fn build_request<'a>(
    parts: &RequestParts<'a>,
    options: &OpenAiOptions,
    history: Vec<Value>,
) -> Request<'a> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if let Some(system) = parts.system {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.extend(history);

    let tools = parts
        .tools
        .iter()
        .map(|t| Tool {
            tool_type: "function",
            function: FunctionDef {
                name: &t.name,
                description: &t.description,
                parameters: &t.parameters,
            },
        })
        .collect();

    let response_format = parts.schema.map(|schema| ResponseFormat {
        format_type: "json_schema",
        json_schema: JsonSchemaFormat {
            name: SCHEMA_NAME,
            schema: if options.strict_schema {
                strict_schema(schema)
            } else {
                schema.clone()
            },
            strict: options.strict_schema,
        },
    });

    Request {
        model: parts.model,
        messages,
        temperature: parts.temperature,
        max_completion_tokens: parts.max_tokens,
        stream: parts.stream.then_some(true),
        stream_options: (parts.stream && options.stream_usage).then_some(StreamOptions {
            include_usage: true,
        }),
        tools,
        response_format,
    }
}

/// Copies `schema`, setting `additionalProperties: false` on every object
/// node, including those under `items`, combinators and definitions.
pub(crate) fn strict_schema(schema: &Value) -> Value {
    let mut schema = schema.clone();
    close_objects(&mut schema);
    schema
}

fn close_objects(node: &mut Value) {
    let Some(obj) = node.as_object_mut() else {
        return;
    };

    let is_object = obj.get("type").is_some_and(|t| {
        t == "object" || t.as_array().is_some_and(|types| types.iter().any(|t| t == "object"))
    }) || obj.contains_key("properties");
    if is_object {
        obj.insert("additionalProperties".into(), Value::Bool(false));
    }

    for key in ["properties", "$defs", "definitions", "patternProperties"] {
        if let Some(Value::Object(children)) = obj.get_mut(key) {
            children.values_mut().for_each(close_objects);
        }
    }
    for key in ["items", "not", "if", "then", "else"] {
        if let Some(child) = obj.get_mut(key) {
            match child {
                Value::Array(items) => items.iter_mut().for_each(close_objects),
                other => close_objects(other),
            }
        }
    }
    for key in ["anyOf", "oneOf", "allOf", "prefixItems"] {
        if let Some(Value::Array(branches)) = obj.get_mut(key) {
            branches.iter_mut().for_each(close_objects);
        }
    }
}

/// A user turn: a plain string for lone text, content parts otherwise.
pub(crate) fn user_message(content: &[ContentPart], prepended: &[ImageRef]) -> Value {
    if prepended.is_empty() {
        if let [ContentPart::Text(text)] = content {
            return json!({ "role": "user", "content": text });
        }
    }

    let parts: Vec<Value> = prepended
        .iter()
        .map(image_part)
        .chain(content.iter().map(|part| match part {
            ContentPart::Text(text) => json!({ "type": "text", "text": text }),
            ContentPart::Image(image) => image_part(image),
        }))
        .collect();
    json!({ "role": "user", "content": parts })
}

fn image_part(image: &ImageRef) -> Value {
    json!({ "type": "image_url", "image_url": { "url": image.as_str() } })
}

/// An assistant turn. Content is `null` when the turn only calls tools.
pub(crate) fn assistant_message(text: &str, tool_calls: &[ToolCallInfo]) -> Value {
    let mut message = Map::new();
    message.insert("role".into(), json!("assistant"));
    message.insert(
        "content".into(),
        if text.is_empty() && !tool_calls.is_empty() {
            Value::Null
        } else {
            json!(text)
        },
    );
    if !tool_calls.is_empty() {
        let calls: Vec<Value> = tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": { "name": call.name, "arguments": call.arguments },
                })
            })
            .collect();
        message.insert("tool_calls".into(), Value::Array(calls));
    }
    Value::Object(message)
}

/// One `tool` message per result.
pub(crate) fn tool_messages(results: &[ToolResultInfo]) -> Vec<Value> {
    results
        .iter()
        .map(|r| json!({ "role": "tool", "tool_call_id": r.id, "content": r.result }))
        .collect()
}

// ── Response conversion ──────────────────────────────────────────────

/// Converts a non-streaming response. `raw` is kept for error reporting.
pub(crate) fn convert_response(resp: Response, raw: &str) -> Result<ChatResponse, LlmError> {
    let usage = resp.usage.map(convert_usage).unwrap_or_default();
    let Some(choice) = resp.choices.into_iter().next() else {
        return Err(LlmError::ResponseFormat {
            message: "response contains no choices".into(),
            raw: raw.to_owned(),
        });
    };

    let mut calls = ToolCallAccumulator::new();
    for (index, call) in (0u32..).zip(choice.message.tool_calls.unwrap_or_default()) {
        calls.apply(
            index,
            call.id.as_deref(),
            call.function.name.as_deref(),
            Some(call.function.arguments.as_str()),
        );
    }

    Ok(ChatResponse {
        content: choice.message.content.unwrap_or_default(),
        tool_calls: calls.finish(),
        usage,
    })
}

pub(crate) fn convert_usage(usage: ResponseUsage) -> Usage {
    Usage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
    }
}
