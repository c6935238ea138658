use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{GenerationFuture, GenerationRequest, SynthesisError, TextGenerator};

const USER_AGENT: &str = "synapsed-content/0.1";

fn build_http(timeout: Duration) -> Result<reqwest::Client, SynthesisError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(4))
        .timeout(timeout)
        .build()
        .map_err(|e| SynthesisError::Client(e.to_string()))
}

async fn error_for_status(resp: reqwest::Response) -> Result<reqwest::Response, SynthesisError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SynthesisError::Status {
        status: status.as_u16(),
        body: body.chars().take(500).collect(),
    })
}

// ------------------------------------------------------------
// Anthropic Messages API
// ------------------------------------------------------------

/// Requires `ANTHROPIC_API_KEY` (resolved by config).
pub struct AnthropicGenerator {
    http: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl AnthropicGenerator {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, SynthesisError> {
        Ok(Self {
            http: build_http(timeout)?,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
        })
    }
}

impl TextGenerator for AnthropicGenerator {
    fn complete<'a>(&'a self, req: GenerationRequest<'a>) -> GenerationFuture<'a> {
        Box::pin(async move {
            let api_key = self
                .api_key
                .as_deref()
                .ok_or(SynthesisError::MissingApiKey {
                    provider: "anthropic",
                })?;

            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                max_tokens: u32,
                temperature: f32,
                messages: Vec<Msg<'a>>,
            }
            #[derive(Deserialize)]
            struct Resp {
                #[serde(default)]
                content: Vec<Block>,
                stop_reason: Option<String>,
            }
            #[derive(Deserialize)]
            struct Block {
                #[serde(rename = "type")]
                kind: String,
                #[serde(default)]
                text: String,
            }

            let body = Req {
                model: req.model,
                max_tokens: req.max_tokens,
                temperature: req.temperature,
                messages: vec![Msg {
                    role: "user",
                    content: req.prompt,
                }],
            };

            let resp = self
                .http
                .post(&self.endpoint)
                .header("x-api-key", api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&body)
                .send()
                .await?;
            let resp = error_for_status(resp).await?;
            let parsed: Resp = resp
                .json()
                .await
                .map_err(|e| SynthesisError::Decode(e.to_string()))?;

            if parsed.stop_reason.as_deref() == Some("max_tokens") {
                warn!(target: "synth", max_tokens = req.max_tokens, "completion hit max_tokens; response may be truncated");
            }
            Ok(parsed
                .content
                .into_iter()
                .filter(|b| b.kind == "text")
                .map(|b| b.text)
                .collect::<Vec<_>>()
                .join(""))
        })
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}

// ------------------------------------------------------------
// OpenAI Chat Completions
// ------------------------------------------------------------

/// Requires `OPENAI_API_KEY` (resolved by config).
pub struct OpenAiGenerator {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, SynthesisError> {
        Ok(Self {
            http: build_http(timeout)?,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }
}

impl TextGenerator for OpenAiGenerator {
    fn complete<'a>(&'a self, req: GenerationRequest<'a>) -> GenerationFuture<'a> {
        Box::pin(async move {
            let api_key = self
                .api_key
                .as_deref()
                .ok_or(SynthesisError::MissingApiKey { provider: "openai" })?;

            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                max_tokens: u32,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: Option<String>,
            }

            let body = Req {
                model: req.model,
                messages: vec![Msg {
                    role: "user",
                    content: req.prompt,
                }],
                temperature: req.temperature,
                max_tokens: req.max_tokens,
            };

            let resp = self
                .http
                .post("https://api.openai.com/v1/chat/completions")
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await?;
            let resp = error_for_status(resp).await?;
            let parsed: Resp = resp
                .json()
                .await
                .map_err(|e| SynthesisError::Decode(e.to_string()))?;
            Ok(parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_default())
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

// ------------------------------------------------------------
// Mock
// ------------------------------------------------------------

enum MockReply {
    Text(String),
    Status(u16),
}

/// Deterministic generator for tests and `AI_TEST_MODE=mock` runs. Counts calls.
pub struct MockGenerator {
    reply: MockReply,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockGenerator {
    pub fn fixed(text: impl Into<String>) -> Self {
        Self {
            reply: MockReply::Text(text.into()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails every call with the given HTTP status.
    pub fn failing(status: u16) -> Self {
        Self {
            reply: MockReply::Status(status),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Response containing every dynamic label in order with placeholder copy.
    pub fn well_formed() -> Self {
        let text = crate::schema::DYNAMIC_FIELDS
            .iter()
            .map(|f| format!("{}: Mock copy for {}.", f.label, f.key))
            .collect::<Vec<_>>()
            .join("\n\n");
        Self::fixed(text)
    }

    /// Answer only after `delay`, like a slow upstream.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextGenerator for MockGenerator {
    fn complete<'a>(&'a self, _req: GenerationRequest<'a>) -> GenerationFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let out = match &self.reply {
            MockReply::Text(t) => Ok(t.clone()),
            MockReply::Status(s) => Err(SynthesisError::Status {
                status: *s,
                body: "mock failure".to_string(),
            }),
        };
        let delay = self.delay;
        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            out
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
