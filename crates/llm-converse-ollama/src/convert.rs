//! Conversion between the conversation model and Ollama wire JSON.

use llm_converse::chat::{ChatResponse, ContentPart, ImageRef, ToolCallInfo, ToolResultInfo, Usage};
use llm_converse::error::LlmError;
use llm_converse::provider::RequestParts;
use llm_converse::stream::ToolCallAccumulator;
use serde_json::{Map, Value, json};

use crate::config::OllamaOptions;
use crate::types::{Chunk, FunctionDef, Options, Request, Tool, ToolCallResponse};

// ── Request conversion ───────────────────────────────────────────────

/// Assembles the request body, prepending the system prompt as a
/// `system` message.
pub(crate) fn build_request<'a>(
    parts: &RequestParts<'a>,
    options: &'a OllamaOptions,
    history: Vec<Value>,
) -> Request<'a> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if let Some(system) = parts.system {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.extend(history);

    let generation = (parts.temperature.is_some() || parts.max_tokens.is_some()).then_some(
        Options {
            temperature: parts.temperature,
            num_predict: parts.max_tokens,
        },
    );

    Request {
        model: parts.model,
        messages,
        stream: parts.stream,
        options: generation,
        tools: parts
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
            .collect(),
        format: parts.schema,
        think: options.think,
        keep_alive: options.keep_alive.as_deref(),
    }
}

/// A user turn. Text parts are joined; images go to the side `images`
/// array as bare base64.
///
/// Ollama cannot fetch URLs, so non-`data:` images are skipped.
pub(crate) fn user_message(content: &[ContentPart], prepended: &[ImageRef]) -> Value {
    let mut texts = Vec::new();
    let mut images = Vec::new();
    for image in prepended {
        push_image(&mut images, image);
    }
    for part in content {
        match part {
            ContentPart::Text(text) => texts.push(text.as_str()),
            ContentPart::Image(image) => push_image(&mut images, image),
        }
    }

    let mut message = json!({ "role": "user", "content": texts.join("\n") });
    if !images.is_empty() {
        message["images"] = Value::from(images);
    }
    message
}

fn push_image(images: &mut Vec<String>, image: &ImageRef) {
    match image.as_base64() {
        Some((_, data)) => images.push(data.to_owned()),
        None => tracing::warn!(url = image.as_str(), "skipping non-base64 image for Ollama"),
    }
}

/// An assistant turn with tool calls as `function` objects whose
/// arguments are JSON objects.
pub(crate) fn assistant_message(text: &str, tool_calls: &[ToolCallInfo]) -> Value {
    let mut message = json!({ "role": "assistant", "content": text });
    if !tool_calls.is_empty() {
        let calls: Vec<Value> = tool_calls
            .iter()
            .map(|call| {
                let arguments = serde_json::from_str::<Value>(&call.arguments)
                    .ok()
                    .filter(Value::is_object)
                    .unwrap_or_else(|| Value::Object(Map::new()));
                json!({ "function": { "name": call.name, "arguments": arguments } })
            })
            .collect();
        message["tool_calls"] = Value::Array(calls);
    }
    message
}

/// One `tool` message per result, in call order.
pub(crate) fn tool_messages(results: &[ToolResultInfo]) -> Vec<Value> {
    results
        .iter()
        .map(|r| json!({ "role": "tool", "tool_name": r.name, "content": r.result }))
        .collect()
}

// ── Response conversion ──────────────────────────────────────────────

/// Feeds whole tool calls into `acc`, numbering them from `next_index`.
///
/// Calls without an id get `call_<index>`. Returns the next free index.
pub(crate) fn accrete_tool_calls(
    acc: &mut ToolCallAccumulator,
    calls: Vec<ToolCallResponse>,
    mut next_index: u32,
) -> u32 {
    for call in calls {
        let id = call
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("call_{next_index}"));
        let arguments = match call.function.arguments {
            Value::Null => "{}".to_owned(),
            Value::String(raw) => raw,
            other => other.to_string(),
        };
        acc.apply(
            next_index,
            Some(id.as_str()),
            Some(call.function.name.as_str()),
            Some(arguments.as_str()),
        );
        next_index += 1;
    }
    next_index
}

/// Turns a mid-stream or body-level `error` field into an error.
pub(crate) fn check_error(chunk: &Chunk) -> Result<(), LlmError> {
    match &chunk.error {
        Some(message) => Err(LlmError::Http {
            status: None,
            message: message.clone(),
        }),
        None => Ok(()),
    }
}

/// Converts a non-streaming response and returns the reasoning text
/// alongside it.
pub(crate) fn convert_response(chunk: Chunk, raw: &str) -> Result<(ChatResponse, String), LlmError> {
    check_error(&chunk)?;
    let usage = convert_usage(&chunk);
    let Some(message) = chunk.message else {
        return Err(LlmError::ResponseFormat {
            message: "response has no message".into(),
            raw: raw.to_owned(),
        });
    };

    let mut calls = ToolCallAccumulator::new();
    accrete_tool_calls(&mut calls, message.tool_calls.unwrap_or_default(), 0);
    let response = ChatResponse {
        content: message.content.unwrap_or_default(),
        tool_calls: calls.finish(),
        usage,
    };
    Ok((response, message.thinking.unwrap_or_default()))
}

pub(crate) fn convert_usage(chunk: &Chunk) -> Usage {
    Usage {
        input_tokens: chunk.prompt_eval_count.unwrap_or_default(),
        output_tokens: chunk.eval_count.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use llm_converse::chat::ChatMessage;
    use llm_converse::tool::ToolMetadata;

    use super::*;

    #[test]
    fn test_build_request_system_and_options() {
        let messages = [ChatMessage::user("Hello")];
        let mut parts = RequestParts::new("http://localhost:11434", "llama3.2", &messages);
        let options = OllamaOptions::default();
        let json = serde_json::to_value(build_request(&parts, &options, Vec::new())).unwrap();
        assert!(json.get("options").is_none());
        assert_eq!(json["stream"], false);

        parts.system = Some("Be terse.");
        parts.max_tokens = Some(64);
        let history = vec![json!({"role": "user", "content": "Hello"})];
        let json = serde_json::to_value(build_request(&parts, &options, history)).unwrap();
        assert_eq!(json["messages"][0], json!({"role": "system", "content": "Be terse."}));
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["options"], json!({"num_predict": 64}));
    }

    #[test]
    fn test_build_request_format_and_tools() {
        let messages = [ChatMessage::user("Hello")];
        let schema = json!({"type": "object", "properties": {"city": {"type": "string"}}});
        let tools = [ToolMetadata {
            name: "add".into(),
            description: "Add".into(),
            parameters: json!({"type": "object", "properties": {}}),
        }];
        let mut parts = RequestParts::new("http://localhost:11434", "llama3.2", &messages);
        parts.schema = Some(&schema);
        parts.tools = &tools;
        let options = OllamaOptions {
            think: Some(true),
            keep_alive: Some("5m".into()),
        };
        let json = serde_json::to_value(build_request(&parts, &options, Vec::new())).unwrap();
        assert_eq!(json["format"], schema);
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["name"], "add");
        assert_eq!(json["think"], true);
        assert_eq!(json["keep_alive"], "5m");
    }

    #[test]
    fn test_user_images_side_array() {
        let msg = user_message(
            &[
                ContentPart::Text("What is".into()),
                ContentPart::Image(ImageRef::from_base64("image/png", "AAAA")),
                ContentPart::Image(ImageRef::new("https://example.com/x.png")),
                ContentPart::Text("this?".into()),
            ],
            &[ImageRef::from_base64("image/jpeg", "BBBB")],
        );
        assert_eq!(msg["content"], "What is\nthis?");
        assert_eq!(msg["images"], json!(["BBBB", "AAAA"]));

        let plain = user_message(&[ContentPart::Text("Hi".into())], &[]);
        assert_eq!(plain, json!({"role": "user", "content": "Hi"}));
    }

    #[test]
    fn test_assistant_arguments_are_objects() {
        let calls = [ToolCallInfo {
            id: "call_0".into(),
            name: "add".into(),
            arguments: r#"{"a":1}"#.into(),
        }];
        let msg = assistant_message("", &calls);
        assert_eq!(
            msg["tool_calls"],
            json!([{"function": {"name": "add", "arguments": {"a": 1}}}])
        );
        assert!(assistant_message("Done", &[]).get("tool_calls").is_none());
    }

    #[test]
    fn test_tool_messages_one_per_result() {
        let results = [
            ToolResultInfo { id: "call_0".into(), name: "add".into(), result: "3".into() },
            ToolResultInfo { id: "call_1".into(), name: "mul".into(), result: "6".into() },
        ];
        let msgs = tool_messages(&results);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[1], json!({"role": "tool", "tool_name": "mul", "content": "6"}));
    }

    #[test]
    fn test_convert_response_assigns_ids() {
        let chunk: Chunk = serde_json::from_value(json!({
            "message": {
                "role": "assistant",
                "content": "",
                "thinking": "adding",
                "tool_calls": [
                    {"function": {"name": "add", "arguments": {"a": 1}}},
                    {"id": "given", "function": {"name": "now"}}
                ]
            },
            "done": true,
            "prompt_eval_count": 20,
            "eval_count": 4
        }))
        .unwrap();
        let (chat, reasoning) = convert_response(chunk, "").unwrap();
        assert_eq!(reasoning, "adding");
        assert_eq!(chat.tool_calls[0].id, "call_0");
        assert_eq!(chat.tool_calls[0].arguments, r#"{"a":1}"#);
        assert_eq!(chat.tool_calls[1].id, "given");
        assert_eq!(chat.tool_calls[1].arguments, "{}");
        assert_eq!(chat.usage, Usage { input_tokens: 20, output_tokens: 4 });
    }

    #[test]
    fn test_convert_response_errors() {
        let missing: Chunk = serde_json::from_value(json!({"done": true})).unwrap();
        assert!(matches!(
            convert_response(missing, "{}"),
            Err(LlmError::ResponseFormat { .. })
        ));

        let failed: Chunk = serde_json::from_value(json!({"error": "out of memory"})).unwrap();
        assert!(matches!(
            convert_response(failed, ""),
            Err(LlmError::Http { status: None, ref message }) if message == "out of memory"
        ));
    }
}
