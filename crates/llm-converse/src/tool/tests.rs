use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use super::*;
use crate::chat::ToolCallInfo;
use crate::event::ConverseEvent;

fn call(id: &str, name: &str, arguments: &str) -> ToolCallInfo {
    ToolCallInfo {
        id: id.into(),
        name: name.into(),
        arguments: arguments.into(),
    }
}

fn recording_sink() -> (Arc<Mutex<Vec<ConverseEvent>>>, impl crate::event::EventSink) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let events = Arc::clone(&events);
        move |event: &ConverseEvent| events.lock().unwrap().push(event.clone())
    };
    (events, sink)
}

fn concat_tool(seen: Arc<Mutex<Vec<Vec<Value>>>>) -> FnTool {
    ToolBuilder::new("concat")
        .description("Concatenate")
        .param("first", json!({"type": "string"}))
        .param("second", json!({"type": "string"}))
        .param("third", json!({"type": "string"}))
        .sync_handler(move |args| {
            seen.lock().unwrap().push(args.clone().into_values());
            Ok(args.iter().filter_map(Value::as_str).collect::<String>())
        })
}

// ── Metadata ────────────────────────────────────────────────────────

#[test]
fn test_builder_metadata_keeps_declared_order() {
    let tool = ToolBuilder::new("search")
        .description("Search the web")
        .param("query", json!({"type": "string"}))
        .optional_param("limit", json!({"type": "integer"}))
        .param("lang", json!({"type": "string"}));
    let meta = tool.metadata();

    assert_eq!(meta.name, "search");
    assert_eq!(meta.param_names(), vec!["query", "limit", "lang"]);
    assert_eq!(meta.parameters["required"], json!(["query", "lang"]));
}

#[test]
fn test_param_names_empty_without_properties() {
    let meta = ToolMetadata {
        name: "noop".into(),
        description: String::new(),
        parameters: json!({"type": "object"}),
    };
    assert!(meta.param_names().is_empty());
}

// ── Positional mapping ──────────────────────────────────────────────

#[tokio::test]
async fn test_positional_mapping_ignores_json_key_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut tools = ToolSet::new();
    tools.register(concat_tool(Arc::clone(&seen)));

    let calls = [call(
        "c1",
        "concat",
        r#"{"third":"C","first":"A","second":"B"}"#,
    )];
    let results = execute_calls(&tools, &calls, &(), None).await;

    assert_eq!(results[0].result, "ABC");
    assert_eq!(
        seen.lock().unwrap()[0],
        vec![json!("A"), json!("B"), json!("C")]
    );
}

#[tokio::test]
async fn test_missing_optional_param_is_null() {
    let tool = ToolBuilder::new("greet")
        .param("name", json!({"type": "string"}))
        .optional_param("greeting", json!({"type": "string"}))
        .sync_handler(|args| {
            let greeting = args.str(1).unwrap_or("Hello");
            Ok(format!("{greeting}, {}", args.str(0).unwrap_or_default()))
        });
    let mut tools = ToolSet::new();
    tools.register(tool);

    let results = execute_calls(&tools, &[call("1", "greet", r#"{"name":"Ada"}"#)], &(), None).await;
    assert_eq!(results[0].result, "Hello, Ada");
}

#[tokio::test]
async fn test_blank_arguments_are_empty_object() {
    let tool = ToolBuilder::new("now").sync_handler(|args| {
        assert!(args.is_empty());
        Ok("12:00")
    });
    let mut tools = ToolSet::new();
    tools.register(tool);

    let results = execute_calls(&tools, &[call("1", "now", "")], &(), None).await;
    assert_eq!(results[0].result, "12:00");
}

// ── Canonicalization ────────────────────────────────────────────────

#[tokio::test]
async fn test_canonicalize_unit_is_ok() {
    assert_eq!(ToolReturn::Unit.canonicalize().await, "OK");
    assert_eq!(ToolReturn::Json(Value::Null).canonicalize().await, "OK");
}

#[tokio::test]
async fn test_canonicalize_string_passes_through() {
    assert_eq!(ToolReturn::from("hello").canonicalize().await, "hello");
    assert_eq!(ToolReturn::Json(json!("hello")).canonicalize().await, "hello");
}

#[tokio::test]
async fn test_canonicalize_object_is_json() {
    let out = ToolReturn::Json(json!({"key": "value"})).canonicalize().await;
    assert_eq!(out, r#"{"key":"value"}"#);
}

#[tokio::test]
async fn test_canonicalize_drains_iterators_and_streams() {
    let items = ToolReturn::items((1..=3).map(Value::from));
    assert_eq!(items.canonicalize().await, "[1,2,3]");

    let stream = ToolReturn::stream(futures::stream::iter((1..=3).map(Value::from)));
    assert_eq!(stream.canonicalize().await, "[1,2,3]");
}

#[tokio::test]
async fn test_async_handler_result_canonicalized() {
    let tool = ToolBuilder::new("lookup").handler(|_args| async {
        tokio::task::yield_now().await;
        Ok(json!({"found": true}))
    });
    let mut tools = ToolSet::new();
    tools.register(tool);

    let results = execute_calls(&tools, &[call("1", "lookup", "{}")], &(), None).await;
    assert_eq!(results[0].result, r#"{"found":true}"#);
}

// ── Recoverable failures ────────────────────────────────────────────

#[tokio::test]
async fn test_unknown_tool_yields_error_payload() {
    let tools = ToolSet::new();
    let (events, sink) = recording_sink();

    let results = execute_calls(&tools, &[call("1", "missing", "{}")], &sink, None).await;
    assert_eq!(results.len(), 1);
    let payload: Value = serde_json::from_str(&results[0].result).unwrap();
    assert_eq!(payload["error"], "Unknown tool: missing");

    let events = events.lock().unwrap();
    assert!(matches!(events[0], ConverseEvent::ToolCallStart { .. }));
    assert!(matches!(events[1], ConverseEvent::ToolError { .. }));
    assert!(matches!(events[2], ConverseEvent::ToolCallEnd { .. }));
}

#[tokio::test]
async fn test_invalid_json_arguments_skip_call() {
    let invoked = Arc::new(Mutex::new(false));
    let tool = {
        let invoked = Arc::clone(&invoked);
        ToolBuilder::new("echo")
            .param("text", json!({"type": "string"}))
            .sync_handler(move |_| {
                *invoked.lock().unwrap() = true;
                Ok(())
            })
    };
    let mut tools = ToolSet::new();
    tools.register(tool);
    let (events, sink) = recording_sink();

    let results = execute_calls(&tools, &[call("1", "echo", "{not json")], &sink, None).await;
    assert!(results[0].result.contains("Invalid JSON arguments"));
    assert!(!*invoked.lock().unwrap());
    assert!(
        events
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, ConverseEvent::ToolError { name, .. } if name == "echo"))
    );
}

#[tokio::test]
async fn test_non_object_arguments_rejected() {
    let mut tools = ToolSet::new();
    tools.register(ToolBuilder::new("echo").sync_handler(|_| Ok(())));

    let results = execute_calls(&tools, &[call("1", "echo", "[1,2]")], &(), None).await;
    assert!(results[0].result.contains("expected a JSON object"));
}

#[tokio::test]
async fn test_tool_error_is_caught_and_reported() {
    let mut tools = ToolSet::new();
    tools.register(
        ToolBuilder::new("fail")
            .sync_handler(|_| Err::<(), _>(ToolError::new("disk on fire"))),
    );
    let (events, sink) = recording_sink();

    let results = execute_calls(&tools, &[call("1", "fail", "{}")], &sink, None).await;
    assert_eq!(results[0].result, r#"{"error":"disk on fire"}"#);
    let events = events.lock().unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        ConverseEvent::ToolError { name, message } if name == "fail" && message == "disk on fire"
    )));
}

// ── Ordering ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_results_follow_call_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let make = |name: &'static str| {
        let order = Arc::clone(&order);
        ToolBuilder::new(name).handler(move |_| {
            let order = Arc::clone(&order);
            async move {
                order.lock().unwrap().push(name);
                Ok(name)
            }
        })
    };
    let mut tools = ToolSet::new();
    tools.register(make("a")).register(make("b"));

    let calls = [call("1", "b", "{}"), call("2", "a", "{}"), call("3", "b", "{}")];
    let results = execute_calls(&tools, &calls, &(), None).await;

    let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert_eq!(*order.lock().unwrap(), vec!["b", "a", "b"]);
}

// ── Truncation ──────────────────────────────────────────────────────

#[test]
fn test_truncate_appends_marker_with_original_length() {
    let out = truncate_result("abcdefghij".into(), 4);
    assert_eq!(out, "abcd\n... [truncated, original length: 10 characters]");
}

#[test]
fn test_truncate_counts_characters_not_bytes() {
    let out = truncate_result("\u{e9}\u{e9}\u{e9}".into(), 2);
    assert!(out.starts_with("\u{e9}\u{e9}\n..."));
    assert!(out.ends_with("original length: 3 characters]"));
}

#[test]
fn test_truncate_leaves_short_results() {
    assert_eq!(truncate_result("short".into(), 5), "short");
}

#[tokio::test]
async fn test_dispatch_applies_truncation() {
    let mut tools = ToolSet::new();
    tools.register(ToolBuilder::new("big").sync_handler(|_| Ok("x".repeat(50))));

    let results = execute_calls(&tools, &[call("1", "big", "{}")], &(), Some(10)).await;
    assert!(results[0].result.starts_with("xxxxxxxxxx\n... [truncated"));
    assert!(results[0].result.contains("50 characters"));
}

// ── ToolSet ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_toolset_last_registration_wins() {
    let mut tools = ToolSet::new();
    tools
        .register(ToolBuilder::new("v").sync_handler(|_| Ok("first")))
        .register(ToolBuilder::new("other").sync_handler(|_| Ok(())))
        .register(ToolBuilder::new("v").sync_handler(|_| Ok("second")));

    assert_eq!(tools.len(), 2);
    assert_eq!(tools.names(), vec!["v", "other"]);
    let results = execute_calls(&tools, &[call("1", "v", "{}")], &(), None).await;
    assert_eq!(results[0].result, "second");
}

#[test]
fn test_toolset_extend() {
    let mut a = ToolSet::new();
    a.register(ToolBuilder::new("x").sync_handler(|_| Ok(())));
    let mut b = ToolSet::new();
    b.register(ToolBuilder::new("y").sync_handler(|_| Ok(())));
    a.extend(&b);
    assert!(a.contains("x"));
    assert!(a.contains("y"));
    assert_eq!(a.definitions().len(), 2);
}
