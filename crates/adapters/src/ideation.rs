//! Idea generation adapter.
//!
//! Wraps an OpenAI-compatible chat-completions service: a free-text prompt
//! plus optional constraints come in, an ordered list of idea strings comes
//! out. Empty prompts are rejected locally — a validation error must never
//! cost an upstream call.
//!
//! Generative upstreams like to wrap JSON in Markdown code fences, so the
//! completion is de-fenced before parsing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use agora_core::adapter::Adapter;
use agora_core::error::InvokeError;

use crate::{classify_transport_error, retry_after_hint};

const DEFAULT_BASE_URL: &str = "https://api.together.xyz";
const DEFAULT_MODEL: &str = "mistralai/Mixtral-8x7B-Instruct-v0.1";
const DEFAULT_MAX_IDEAS: u32 = 5;
const MAX_IDEAS_LIMIT: u32 = 10;
const MAX_TOKENS: u32 = 1024;

/// Safety net on the HTTP client; the dispatcher enforces the real
/// per-attempt budget.
const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

/// Prompt vocabulary offered to clients building constraint pickers.
pub const INDUSTRIES: &[&str] = &[
    "Healthcare",
    "Education",
    "Finance",
    "E-commerce",
    "Real Estate",
    "Legal",
    "Food & Beverage",
    "Travel",
    "Entertainment",
    "Fitness",
    "Marketing",
    "HR & Recruitment",
    "Logistics",
    "Manufacturing",
    "Freelancing",
    "Non-profit",
];

pub const TECH_STACKS: &[&str] = &[
    "Web App",
    "Mobile App",
    "Chrome Extension",
    "WordPress Plugin",
    "Slack App",
    "Desktop Application",
    "API Service",
    "AI-powered Tool",
    "Shopify App",
    "Automation Tool",
    "Data Analytics Dashboard",
];

/// Input contract for the ideation agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdeationInput {
    /// What to ideate about, e.g. a pain point or market niche.
    pub prompt: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<IdeaConstraints>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdeaConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tech_stack: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ideas: Option<u32>,
}

/// Normalized output of the ideation agent: ideas in ranked order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdeaList {
    pub ideas: Vec<String>,
}

// Chat-completions wire types (request is built with json!; only the
// response slice we read gets a struct).
#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Adapter for the ideation agent.
pub struct IdeationAdapter {
    base_url: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl IdeationAdapter {
    pub fn new(api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key,
            model: DEFAULT_MODEL.into(),
            client,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn from_config(upstream: &agora_config::UpstreamConfig) -> Self {
        let mut adapter = Self::new(upstream.api_key.clone());
        if let Some(url) = &upstream.api_url {
            adapter = adapter.with_base_url(url);
        }
        if let Some(model) = &upstream.model {
            adapter = adapter.with_model(model);
        }
        adapter
    }

    fn parse_input(payload: &serde_json::Value) -> Result<IdeationInput, InvokeError> {
        let input: IdeationInput = serde_json::from_value(payload.clone())
            .map_err(|e| InvokeError::InvalidInput(e.to_string()))?;

        if input.prompt.trim().is_empty() {
            return Err(InvokeError::InvalidInput("'prompt' must not be empty".into()));
        }
        if let Some(max_ideas) = input.constraints.as_ref().and_then(|c| c.max_ideas) {
            if max_ideas == 0 || max_ideas > MAX_IDEAS_LIMIT {
                return Err(InvokeError::InvalidInput(format!(
                    "'max_ideas' must be in 1..={MAX_IDEAS_LIMIT}"
                )));
            }
        }
        Ok(input)
    }

    fn build_prompt(input: &IdeationInput) -> String {
        let constraints = input.constraints.clone().unwrap_or_default();
        let max_ideas = constraints.max_ideas.unwrap_or(DEFAULT_MAX_IDEAS);
        let industry = constraints
            .industry
            .map(|i| format!("in the {i} industry"))
            .unwrap_or_else(|| "in any promising industry".into());
        let tech = constraints
            .tech_stack
            .map(|t| format!("built as a {t}"))
            .unwrap_or_else(|| "using any suitable technology".into());

        format!(
            "Generate {max_ideas} concise product ideas {industry}, {tech}, \
             addressing the following brief:\n{}\n\n\
             Respond with ONLY a JSON array of idea strings, best idea first, \
             no additional text.",
            input.prompt.trim()
        )
    }

    /// Strip Markdown code fences the model may wrap its JSON in.
    fn strip_json_fences(text: &str) -> &str {
        let trimmed = text.trim();
        let trimmed = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .unwrap_or(trimmed);
        trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
    }

    /// Parse the completion into an ordered idea list. Accepts either a
    /// bare array or an `{"ideas": [...]}` object — models alternate
    /// between the two regardless of instructions.
    fn parse_ideas(content: &str, max_ideas: u32) -> Result<Vec<String>, InvokeError> {
        let cleaned = Self::strip_json_fences(content);
        let value: serde_json::Value = serde_json::from_str(cleaned).map_err(|e| {
            InvokeError::Internal(format!("failed to parse completion as JSON: {e}"))
        })?;

        let items = match &value {
            serde_json::Value::Array(items) => items.clone(),
            serde_json::Value::Object(map) => match map.get("ideas") {
                Some(serde_json::Value::Array(items)) => items.clone(),
                _ => {
                    return Err(InvokeError::Internal(
                        "completion object has no 'ideas' array".into(),
                    ));
                }
            },
            _ => {
                return Err(InvokeError::Internal(
                    "completion is neither an array nor an object".into(),
                ));
            }
        };

        let mut ideas: Vec<String> = items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        ideas.truncate(max_ideas as usize);

        if ideas.is_empty() {
            return Err(InvokeError::Internal("completion contained no ideas".into()));
        }
        Ok(ideas)
    }

    fn classify_status(status: u16, body: &str, retry_after: Option<u64>) -> InvokeError {
        match status {
            429 => InvokeError::UpstreamRateLimited {
                retry_after: retry_after.map(std::time::Duration::from_secs),
            },
            401 | 403 => InvokeError::Internal("text generation authentication failed".into()),
            400..=499 => InvokeError::UpstreamRejected(format!("completion rejected: {body}")),
            _ => InvokeError::Internal(format!("text generation service returned {status}: {body}")),
        }
    }
}

#[async_trait]
impl Adapter for IdeationAdapter {
    fn agent_id(&self) -> &str {
        "ideation"
    }

    fn description(&self) -> &str {
        "Idea generation: ordered product ideas for a prompt, with optional industry/tech constraints"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "Pain point or market niche to ideate on"
                },
                "constraints": {
                    "type": "object",
                    "properties": {
                        "industry": { "type": "string", "examples": INDUSTRIES },
                        "tech_stack": { "type": "string", "examples": TECH_STACKS },
                        "max_ideas": { "type": "integer", "minimum": 1, "maximum": MAX_IDEAS_LIMIT }
                    },
                    "additionalProperties": false
                }
            },
            "required": ["prompt"],
            "additionalProperties": false
        })
    }

    fn output_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "ideas": {
                    "type": "array",
                    "items": { "type": "string" },
                    "minItems": 1
                }
            },
            "required": ["ideas"]
        })
    }

    fn validate(&self, payload: &serde_json::Value) -> Result<(), InvokeError> {
        Self::parse_input(payload).map(|_| ())
    }

    async fn invoke(
        &self,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, InvokeError> {
        let input = Self::parse_input(&payload)?;
        let max_ideas = input
            .constraints
            .as_ref()
            .and_then(|c| c.max_ideas)
            .unwrap_or(DEFAULT_MAX_IDEAS);

        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a product ideation assistant. You respond with JSON only."
                },
                { "role": "user", "content": Self::build_prompt(&input) }
            ],
            "max_tokens": MAX_TOKENS,
            "temperature": 0.7,
        });

        debug!(model = %self.model, max_ideas, "requesting idea completion");

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport_error(e, HTTP_TIMEOUT))?;

        let status = response.status().as_u16();
        if status != 200 {
            let retry_after = retry_after_hint(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body, retry_after));
        }

        let completion: ChatCompletion = response.json().await.map_err(|e| {
            InvokeError::Internal(format!("failed to parse completion response: {e}"))
        })?;

        let content = completion
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| InvokeError::Internal("completion had no choices".into()))?;

        let ideas = Self::parse_ideas(content, max_ideas)?;
        serde_json::to_value(IdeaList { ideas })
            .map_err(|e| InvokeError::Internal(format!("failed to serialize ideas: {e}")))
    }
}
