//! Conversion between canonical Relay types and the Gemini wire format.
//!
//! Gemini speaks `contents`/`parts`: the assistant role is `model`, tool
//! calls are `functionCall` parts, and tool results travel back as
//! `functionResponse` parts correlated by function name.

use relay_types::{ApiError, ChatReply, ChatRequest, ContentBlock, Message, Role, ToolDefinition, Usage};
use serde_json::{Value, json};
use uuid::Uuid;

/// Build the JSON body for a `generateContent` call.
pub fn build_request(request: &ChatRequest) -> Value {
    let mut body = json!({
        "contents": convert_messages(&request.messages),
        "generationConfig": generation_config(request),
    });

    if let Some(system) = &request.system {
        body["systemInstruction"] = json!({"parts": [{"text": system}]});
    }

    if !request.tools.is_empty() {
        body["tools"] = json!([{
            "functionDeclarations": function_declarations(&request.tools),
        }]);
    }

    body
}

fn generation_config(request: &ChatRequest) -> Value {
    let mut config = json!({
        "temperature": request.temperature,
        "candidateCount": 1,
    });
    if let Some(max) = request.max_output_tokens {
        config["maxOutputTokens"] = max.into();
    }
    config
}

/// Tool definitions in declaration order must be stable across calls, so they
/// are sorted by name.
fn function_declarations(tools: &[ToolDefinition]) -> Vec<Value> {
    let mut sorted: Vec<&ToolDefinition> = tools.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    sorted
        .into_iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "parameters": sanitize_schema(tool.input_schema.clone()),
            })
        })
        .collect()
}

/// Strip JSON Schema keys outside the OpenAPI subset Gemini accepts.
fn sanitize_schema(mut schema: Value) -> Value {
    match &mut schema {
        Value::Object(map) => {
            map.remove("$schema");
            map.remove("additionalProperties");
            for value in map.values_mut() {
                *value = sanitize_schema(value.take());
            }
        }
        Value::Array(items) => {
            for value in items.iter_mut() {
                *value = sanitize_schema(value.take());
            }
        }
        _ => {}
    }
    schema
}

fn convert_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| {
            let role = match msg.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            let parts: Vec<Value> = msg
                .content
                .iter()
                .map(|block| match block {
                    ContentBlock::Text { text } => json!({"text": text}),
                    ContentBlock::ToolUse { name, input, .. } => json!({
                        "functionCall": {"name": name, "args": input}
                    }),
                    ContentBlock::ToolResult { name, content, .. } => json!({
                        "functionResponse": {
                            "name": name,
                            "response": {"content": content}
                        }
                    }),
                })
                .collect();
            json!({"role": role, "parts": parts})
        })
        .collect()
}

/// Parse a `generateContent` response body into a canonical reply.
pub fn parse_reply(body: &Value) -> Result<ChatReply, ApiError> {
    let candidates = body
        .get("candidates")
        .and_then(Value::as_array)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| no_candidates_error(body))?;

    let mut content = Vec::new();
    if let Some(parts) = candidates[0]
        .pointer("/content/parts")
        .and_then(Value::as_array)
    {
        for part in parts {
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                content.push(ContentBlock::Text {
                    text: text.to_string(),
                });
            } else if let Some(call) = part.get("functionCall") {
                let name = call.get("name").and_then(Value::as_str).ok_or_else(|| {
                    ApiError::InvalidResponse("functionCall part without a name".into())
                })?;
                // Gemini assigns no call ids; mint one so results stay
                // addressable in the canonical history.
                content.push(ContentBlock::ToolUse {
                    id: format!("call_{}", Uuid::new_v4().simple()),
                    name: name.to_string(),
                    input: call.get("args").cloned().unwrap_or_else(|| json!({})),
                });
            }
        }
    }

    Ok(ChatReply {
        message: Message {
            role: Role::Assistant,
            content,
        },
        usage: parse_usage(body),
    })
}

fn no_candidates_error(body: &Value) -> ApiError {
    match body
        .pointer("/promptFeedback/blockReason")
        .and_then(Value::as_str)
    {
        Some(reason) => ApiError::InvalidResponse(format!("Prompt blocked: {reason}")),
        None => ApiError::InvalidResponse("Response has no candidates".into()),
    }
}

fn parse_usage(body: &Value) -> Usage {
    let count = |key: &str| {
        body.pointer(&format!("/usageMetadata/{key}"))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    };
    let input_tokens = count("promptTokenCount");
    let output_tokens = count("candidatesTokenCount");
    let total = count("totalTokenCount");
    Usage {
        input_tokens,
        output_tokens,
        total_tokens: if total > 0 {
            total
        } else {
            input_tokens + output_tokens
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(messages: Vec<Message>, tools: Vec<ToolDefinition>) -> ChatRequest {
        ChatRequest {
            model: "gemini-2.0-flash".into(),
            system: Some("You are a helpful assistant.".into()),
            messages,
            tools,
            temperature: 0.0,
            max_output_tokens: None,
        }
    }

    #[test]
    fn build_request_maps_roles_and_system() {
        let request = request_with(
            vec![
                Message::user_text("hello"),
                Message {
                    role: Role::Assistant,
                    content: vec![ContentBlock::Text { text: "hi".into() }],
                },
            ],
            vec![],
        );
        let body = build_request(&request);

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You are a helpful assistant."
        );
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn build_request_converts_tool_blocks() {
        let request = request_with(
            vec![
                Message {
                    role: Role::Assistant,
                    content: vec![ContentBlock::ToolUse {
                        id: "call_1".into(),
                        name: "get_forecast".into(),
                        input: json!({"city": "nyc"}),
                    }],
                },
                Message {
                    role: Role::User,
                    content: vec![ContentBlock::ToolResult {
                        tool_use_id: "call_1".into(),
                        name: "get_forecast".into(),
                        content: "Sunny, 72F".into(),
                        is_error: None,
                    }],
                },
            ],
            vec![],
        );
        let body = build_request(&request);

        let call = &body["contents"][0]["parts"][0]["functionCall"];
        assert_eq!(call["name"], "get_forecast");
        assert_eq!(call["args"]["city"], "nyc");

        let response = &body["contents"][1]["parts"][0]["functionResponse"];
        assert_eq!(response["name"], "get_forecast");
        assert_eq!(response["response"]["content"], "Sunny, 72F");
    }

    #[test]
    fn declarations_are_sorted_and_sanitized() {
        let request = request_with(
            vec![Message::user_text("hi")],
            vec![
                ToolDefinition {
                    name: "zeta".into(),
                    description: "".into(),
                    input_schema: json!({
                        "$schema": "http://json-schema.org/draft-07/schema#",
                        "type": "object",
                        "additionalProperties": false,
                        "properties": {"x": {"type": "string"}}
                    }),
                },
                ToolDefinition {
                    name: "alpha".into(),
                    description: "".into(),
                    input_schema: json!({"type": "object", "properties": {}}),
                },
            ],
        );
        let body = build_request(&request);
        let decls = body["tools"][0]["functionDeclarations"].as_array().unwrap();

        assert_eq!(decls[0]["name"], "alpha");
        assert_eq!(decls[1]["name"], "zeta");
        assert!(decls[1]["parameters"].get("$schema").is_none());
        assert!(decls[1]["parameters"].get("additionalProperties").is_none());
        assert_eq!(decls[1]["parameters"]["properties"]["x"]["type"], "string");
    }

    #[test]
    fn parse_reply_text_only() {
        let body = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hello there."}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {
                "promptTokenCount": 12,
                "candidatesTokenCount": 4,
                "totalTokenCount": 16
            }
        });
        let reply = parse_reply(&body).unwrap();
        assert_eq!(reply.message.role, Role::Assistant);
        assert_eq!(reply.message.text(), "Hello there.");
        assert!(reply.message.tool_calls().is_empty());
        assert_eq!(reply.usage.input_tokens, 12);
        assert_eq!(reply.usage.total_tokens, 16);
    }

    #[test]
    fn parse_reply_with_function_call() {
        let body = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "Checking the weather."},
                    {"functionCall": {"name": "get_forecast", "args": {"city": "nyc"}}}
                ]}
            }]
        });
        let reply = parse_reply(&body).unwrap();
        let calls = reply.message.tool_calls();
        assert_eq!(calls.len(), 1);
        match calls[0] {
            ContentBlock::ToolUse { id, name, input } => {
                assert!(id.starts_with("call_"));
                assert_eq!(name, "get_forecast");
                assert_eq!(input["city"], "nyc");
            }
            _ => panic!("Expected ToolUse"),
        }
    }

    #[test]
    fn parse_reply_function_call_without_args() {
        let body = json!({
            "candidates": [{
                "content": {"parts": [{"functionCall": {"name": "list_tasks"}}]}
            }]
        });
        let reply = parse_reply(&body).unwrap();
        match reply.message.tool_calls()[0] {
            ContentBlock::ToolUse { input, .. } => assert_eq!(*input, json!({})),
            _ => panic!("Expected ToolUse"),
        }
    }

    #[test]
    fn parse_reply_no_candidates() {
        let err = parse_reply(&json!({"candidates": []})).unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn parse_reply_blocked_prompt() {
        let body = json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        });
        let err = parse_reply(&body).unwrap_err();
        match err {
            ApiError::InvalidResponse(msg) => assert!(msg.contains("SAFETY")),
            other => panic!("Expected InvalidResponse, got {other:?}"),
        }
    }

    #[test]
    fn usage_falls_back_to_sum() {
        let body = json!({
            "candidates": [{"content": {"parts": [{"text": "ok"}]}}],
            "usageMetadata": {"promptTokenCount": 3, "candidatesTokenCount": 2}
        });
        let reply = parse_reply(&body).unwrap();
        assert_eq!(reply.usage.total_tokens, 5);
    }
}
