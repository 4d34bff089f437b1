//! Gemini `generateContent` backend for [`Model`].

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::core::types::{ActionRequest, ModelReply, Transcript, Turn, Usage};
use crate::io::actions::ActionSpec;
use crate::io::config::ModelConfig;
use crate::io::model::{Model, ModelRequest};

/// Blocking Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiModel {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GeminiModel {
    pub fn new(config: &ModelConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("build http client")?;
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.name
        );
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

impl Model for GeminiModel {
    #[instrument(skip_all, fields(turns = request.transcript.len()))]
    fn respond(&self, request: &ModelRequest<'_>) -> Result<ModelReply> {
        let body = GenerateRequest::from_model_request(request);
        debug!(endpoint = %self.endpoint, "sending generateContent request");
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .context("send gemini request")?;

        let status = response.status();
        let text = response.text().context("read gemini response body")?;
        if !status.is_success() {
            warn!(%status, "gemini request failed");
            return Err(anyhow!("gemini returned {status}: {}", error_message(&text)));
        }
        let parsed: GenerateResponse =
            serde_json::from_str(&text).context("parse gemini response")?;
        parsed.into_reply()
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    tools: Vec<ToolDeclarations>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDeclarations {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

impl GenerateRequest {
    fn from_model_request(request: &ModelRequest<'_>) -> Self {
        Self {
            system_instruction: Content {
                role: None,
                parts: vec![text_part(request.system_instruction)],
            },
            contents: to_contents(request.transcript),
            tools: vec![ToolDeclarations {
                function_declarations: request.actions.iter().map(declaration).collect(),
            }],
        }
    }
}

fn declaration(spec: &ActionSpec) -> FunctionDeclaration {
    FunctionDeclaration {
        name: spec.name.to_string(),
        description: spec.description.to_string(),
        parameters: to_gemini_schema(&spec.parameters),
    }
}

/// Gemini's schema dialect spells types in upper case (`OBJECT`, `STRING`, ...).
fn to_gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| {
                    let converted = match (key.as_str(), value) {
                        ("type", Value::String(kind)) => Value::String(kind.to_uppercase()),
                        _ => to_gemini_schema(value),
                    };
                    (key.clone(), converted)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(to_gemini_schema).collect()),
        other => other.clone(),
    }
}

fn text_part(text: &str) -> Part {
    Part {
        text: Some(text.to_string()),
        ..Part::default()
    }
}

fn to_contents(transcript: &Transcript) -> Vec<Content> {
    transcript
        .turns()
        .iter()
        .map(|turn| match turn {
            Turn::User { text } => Content {
                role: Some("user".to_string()),
                parts: vec![text_part(text)],
            },
            Turn::Agent { text, actions } => {
                let mut parts = Vec::new();
                if let Some(text) = text {
                    parts.push(text_part(text));
                }
                // Only the first call is ever dispatched and answered; Gemini
                // rejects histories whose calls and responses do not pair up.
                parts.extend(actions.iter().take(1).map(|action| Part {
                    function_call: Some(FunctionCall {
                        name: action.name.clone(),
                        args: action.arguments.clone(),
                    }),
                    ..Part::default()
                }));
                Content {
                    role: Some("model".to_string()),
                    parts,
                }
            }
            Turn::Tool { result } => {
                let key = if result.is_error { "error" } else { "result" };
                let mut response = Map::new();
                response.insert(key.to_string(), Value::String(result.payload.clone()));
                Content {
                    role: Some("user".to_string()),
                    parts: vec![Part {
                        function_response: Some(FunctionResponse {
                            name: result.name.clone(),
                            response: Value::Object(response),
                        }),
                        ..Part::default()
                    }],
                }
            }
        })
        .collect()
}

impl GenerateResponse {
    fn into_reply(self) -> Result<ModelReply> {
        let usage = self
            .usage_metadata
            .map(|meta| Usage {
                prompt_tokens: meta.prompt_token_count,
                response_tokens: meta.candidates_token_count,
            })
            .unwrap_or_default();
        let Some(candidate) = self.candidates.into_iter().next() else {
            bail!("gemini response contained no candidates");
        };
        let content = candidate
            .content
            .ok_or_else(|| anyhow!("gemini candidate has no content"))?;

        let mut texts = Vec::new();
        let mut actions = Vec::new();
        for part in content.parts {
            if let Some(text) = part.text {
                texts.push(text);
            }
            if let Some(call) = part.function_call {
                actions.push(ActionRequest {
                    name: call.name,
                    arguments: call.args,
                });
            }
        }
        let text = (!texts.is_empty()).then(|| texts.concat());
        Ok(ModelReply {
            text,
            actions,
            usage,
        })
    }
}
