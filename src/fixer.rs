//! Migration fix suggestions for impacted lines
//!
//! The fixer is optional. Any failure (network, bad JSON, missing key) is
//! logged and yields no suggestion; it never fails a run.

use crate::domain::AiFix;
use crate::registry::HttpClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Default OpenAI-compatible chat completions endpoint
pub const DEFAULT_FIXER_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Default model name
pub const DEFAULT_FIXER_MODEL: &str = "gpt-4";

/// Environment variable holding the API key unless configured otherwise
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Suggestions requested per breaking package at most
pub const DEFAULT_MAX_FIXES_PER_PACKAGE: usize = 10;

const SYSTEM_PROMPT: &str = "You are a Python migration expert. Analyze breaking changes and \
provide accurate migration guidance. Never hallucinate fixes. Use official documentation when available.";

/// One impacted line to suggest a fix for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixRequest {
    pub package: String,
    pub current_version: String,
    pub latest_version: String,
    pub file: PathBuf,
    pub line: usize,
    pub symbol: String,
    pub context: String,
}

impl FixRequest {
    /// Renders the user prompt sent to the model
    pub fn prompt(&self) -> String {
        format!(
            "Analyze this breaking change and provide migration guidance:\n\n\
             Package: {}\n\
             Current Version: {}\n\
             Latest Version: {}\n\n\
             Affected Code:\n\
             File: {}\n\
             Line: {}\n\
             Code: {}\n\
             API Element: {}\n\n\
             Respond with JSON only:\n\
             {{\"explanation\": \"...\", \"fixed_code\": \"...\", \"migration_notes\": \"...\", \"confidence\": 0.0}}\n",
            self.package,
            self.current_version,
            self.latest_version,
            self.file.display(),
            self.line,
            self.context,
            self.symbol,
        )
    }
}

/// Produces migration suggestions
#[async_trait]
pub trait MigrationFixer: Send + Sync {
    /// Returns a suggestion, or `None` when none could be produced
    async fn suggest(&self, request: &FixRequest) -> Option<AiFix>;
}

/// Fixer backed by an OpenAI-compatible chat completions API
pub struct ChatCompletionsFixer {
    client: HttpClient,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsFixer {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            endpoint: DEFAULT_FIXER_ENDPOINT.to_string(),
            model: DEFAULT_FIXER_MODEL.to_string(),
            api_key: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Reads the API key from `var`, leaving it unset if the variable is empty
    pub fn with_api_key_from_env(mut self, var: &str) -> Self {
        self.api_key = std::env::var(var).ok().filter(|k| !k.trim().is_empty());
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl MigrationFixer for ChatCompletionsFixer {
    async fn suggest(&self, request: &FixRequest) -> Option<AiFix> {
        let prompt = request.prompt();
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.3,
            max_tokens: 1000,
        };

        let response: ChatResponse = match self
            .client
            .post_json(&self.endpoint, &body, self.api_key.as_deref(), &request.package)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Fix request for {} failed: {}", request.package, e);
                return None;
            }
        };

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)?;
        let fix = parse_fix_response(&content);
        if fix.is_none() {
            debug!("Unparseable fix response for {}:{}", request.file.display(), request.line);
        }
        fix
    }
}

/// Extracts the body of the first fenced code block, if any
fn strip_code_fence(content: &str) -> &str {
    let (start, skip) = match content.find("```json") {
        Some(start) => (start, 7),
        None => match content.find("```") {
            Some(start) => (start, 3),
            None => return content.trim(),
        },
    };
    let body = &content[start + skip..];
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Parses a model reply into a fix, clamping confidence into `[0, 1]`
pub fn parse_fix_response(content: &str) -> Option<AiFix> {
    let mut fix: AiFix = serde_json::from_str(strip_code_fence(content)).ok()?;
    if fix.explanation.trim().is_empty() {
        return None;
    }
    fix.confidence = if fix.confidence.is_finite() {
        fix.confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    fix.fixed_code = fix.fixed_code.filter(|c| !c.trim().is_empty());
    fix.migration_notes = fix.migration_notes.filter(|n| !n.trim().is_empty());
    Some(fix)
}
