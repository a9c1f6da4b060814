use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{SeeShotError, SeeShotResult};
use crate::llm::provider::LlmProvider;
use crate::llm::types::{CallConfig, ChatMessage, FunctionCall, LlmResponse, ToolCall, ToolDef};

pub struct OpenAiCompatibleProvider {
    id: String,
    api_base: String,
    api_key: String,
    client: reqwest::Client,
}

/// Upper bound on a whole chat request, so a stalled connection cannot hang arbitration.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

impl OpenAiCompatibleProvider {
    pub fn new(id: String, api_base: String, api_key: String) -> SeeShotResult<Self> {
        Self::with_timeouts(id, api_base, api_key, DEFAULT_REQUEST_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_timeouts(
        id: String,
        api_base: String,
        api_key: String,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> SeeShotResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            id,
            api_base,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDef>,
        cfg: &CallConfig,
    ) -> SeeShotResult<LlmResponse> {
        let body = build_request_body(&messages, &tools, cfg)?;

        tracing::debug!(
            provider = %self.id,
            model = %cfg.model,
            fallbacks = cfg.fallback_models.len(),
            tools = tools.len(),
            "sending LLM request"
        );
        tracing::debug!(
            body = %sanitize_for_log(&body),
            "request body (sanitized, base64 omitted)"
        );

        let response = self
            .client
            .post(&self.api_base)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(SeeShotError::LlmProvider(format!("{}: {}", status, err_body)));
        }

        let json: Value = response.json().await?;
        let parsed = parse_response(&json);

        if parsed.id.is_none() {
            tracing::warn!(provider = %self.id, response = %json, "response blocked");
        } else {
            tracing::info!(
                provider = %self.id,
                model = parsed.model.as_deref().unwrap_or("?"),
                content_len = parsed.content.as_deref().map_or(0, str::len),
                tool_calls = parsed.tool_calls.len(),
                "LLM JSON response received"
            );
        }
        Ok(parsed)
    }
}

/// Chat-completions request body, including OpenRouter routing extras when configured.
pub fn build_request_body(
    messages: &[ChatMessage],
    tools: &[ToolDef],
    cfg: &CallConfig,
) -> SeeShotResult<Value> {
    let mut body = serde_json::json!({
        "model": cfg.model,
        "messages": messages,
        "stream": false,
        "temperature": cfg.temperature,
    });

    if !tools.is_empty() {
        body["tools"] = serde_json::to_value(tools)?;
        body["tool_choice"] = serde_json::json!("auto");
    }
    if !cfg.fallback_models.is_empty() {
        body["models"] = serde_json::to_value(&cfg.fallback_models)?;
    }
    if !cfg.ignore_providers.is_empty() {
        body["provider"] = serde_json::json!({ "ignore": cfg.ignore_providers });
    }
    Ok(body)
}

/// Copy of `body` with every image payload replaced, for logging only.
fn sanitize_for_log(body: &Value) -> String {
    let mut log_body = body.clone();
    if let Some(msgs) = log_body.get_mut("messages").and_then(|m| m.as_array_mut()) {
        for msg in msgs {
            let Some(parts) = msg.get_mut("content").and_then(|c| c.as_array_mut()) else {
                continue;
            };
            for part in parts {
                if part.get("type").and_then(|t| t.as_str()) != Some("image_url") {
                    continue;
                }
                if let Some(url) = part.get_mut("image_url").and_then(|u| u.get_mut("url")) {
                    *url = Value::String("<omitted_base64_image>".to_string());
                }
            }
        }
    }
    serde_json::to_string(&log_body).unwrap_or_default()
}

/// Decode a non-streaming completion. A missing or empty `id` marks a blocked response.
pub fn parse_response(json: &Value) -> LlmResponse {
    let id = json["id"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    if id.is_none() {
        return LlmResponse::default();
    }

    let message = &json["choices"][0]["message"];
    let content = message["content"].as_str().map(str::to_string);

    let tool_calls: Vec<ToolCall> = message["tool_calls"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .map(|tc| ToolCall {
                    id: tc["id"].as_str().unwrap_or("").to_string(),
                    call_type: tc["type"].as_str().unwrap_or("function").to_string(),
                    function: FunctionCall {
                        name: tc["function"]["name"].as_str().unwrap_or("").to_string(),
                        arguments: tc["function"]["arguments"]
                            .as_str()
                            .unwrap_or("{}")
                            .to_string(),
                    },
                })
                .filter(|tc| !tc.function.name.is_empty())
                .collect()
        })
        .unwrap_or_default();

    LlmResponse {
        id,
        model: json["model"].as_str().map(str::to_string),
        content,
        tool_calls,
    }
}
