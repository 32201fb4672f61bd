//! Generated incident summaries.
//!
//! A [`ContentGenerator`] turns a structured incident summary into a short
//! email paragraph or a spoken script. Generation is optional: failures,
//! empty output, and the `No answer.` sentinel all mean "no content", in
//! which case the email goes out without a summary and the voice call uses
//! a fixed sentence.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use vigil_state::{Incident, MonitoredService};

use crate::BoxFuture;
use crate::error::{NotifyError, NotifyResult};
use crate::redact::redact_reason;
use crate::templates::NotificationKind;

/// Sentinel returned by generators that produced nothing useful.
pub const NO_ANSWER: &str = "No answer.";

/// Maximum characters kept from a generated email paragraph.
pub const MAX_PARAGRAPH_CHARS: usize = 600;

/// Maximum characters kept from a generated voice script.
pub const MAX_VOICE_CHARS: usize = 650;

const EMAIL_SYSTEM_PROMPT: &str = "You are an on-call SRE assistant. Write one short actionable \
paragraph (3-5 sentences, <= 600 chars) for the specified audience. Avoid stack traces or secrets.";

const VOICE_SYSTEM_PROMPT: &str = "You are a voice alert generator. Produce a clear spoken message \
under 30 seconds (~60-80 words). No URLs, no secrets. End with one concrete action.";

/// Turns prompts into prose.
pub trait ContentGenerator: Send + Sync {
    /// Whether generation is configured at all.
    fn is_available(&self) -> bool;

    fn generate<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> BoxFuture<'a, NotifyResult<String>>;
}

/// Generator used when no model is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContent;

impl ContentGenerator for NoContent {
    fn is_available(&self) -> bool {
        false
    }

    fn generate<'a>(&'a self, _: &'a str, _: &'a str) -> BoxFuture<'a, NotifyResult<String>> {
        Box::pin(async { Err(NotifyError::NotConfigured("content generator".to_string())) })
    }
}

// ── OpenAI-compatible chat completions ─────────────────────────────

/// Settings for a `/chat/completions` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
        }
    }
}

/// Client for an OpenAI-compatible chat completions API.
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    http: reqwest::Client,
    config: ChatConfig,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl ChatCompletionClient {
    pub fn new(http: reqwest::Client, config: ChatConfig) -> Self {
        Self { http, config }
    }

    async fn chat(&self, system_prompt: &str, user_prompt: &str) -> NotifyResult<String> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.config.model,
            "temperature": 0.2,
            "max_completion_tokens": 512,
            "stream": false,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt },
            ],
        });

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_else(|| NO_ANSWER.to_string());
        Ok(content)
    }
}

impl ContentGenerator for ChatCompletionClient {
    fn is_available(&self) -> bool {
        !self.config.api_key.trim().is_empty()
    }

    fn generate<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
    ) -> BoxFuture<'a, NotifyResult<String>> {
        Box::pin(self.chat(system_prompt, user_prompt))
    }
}

// ── Prompts and post-processing ────────────────────────────────────

/// Structured facts handed to the generator. The reason is already redacted.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentBrief {
    pub kind: NotificationKind,
    pub project: String,
    pub url: String,
    pub status: String,
    pub elapsed_minutes: u64,
    pub reason: String,
}

impl IncidentBrief {
    pub fn new(
        kind: NotificationKind,
        service: &MonitoredService,
        incident: &Incident,
        now: u64,
    ) -> Self {
        Self {
            kind,
            project: service.name.clone(),
            url: service.health_url.clone(),
            status: service.last_status.to_string(),
            elapsed_minutes: incident.elapsed_minutes(now),
            reason: redact_reason(incident.reason.as_deref()),
        }
    }

    fn email_prompt(&self) -> String {
        format!(
            "Audience: {}\nProject: {}\nHealth URL: {}\nCurrent status: {}\n\
             Minutes since incident: {}\nReason: {}\n\n\
             Write next steps and likely causes, concise and pragmatic.\n",
            self.kind.audience(),
            self.project,
            self.url,
            self.status,
            self.elapsed_minutes,
            self.reason,
        )
    }

    fn voice_prompt(&self) -> String {
        format!(
            "Audience: {}\nTone: {}\nProject: {}\nStatus: {}\n\
             Elapsed minutes: {}\nReason: {}\n\n\
             Return only the speech text.\n",
            self.kind.audience(),
            self.kind.tone(),
            self.project,
            self.status,
            self.elapsed_minutes,
            self.reason,
        )
    }

    /// Spoken line used when no script could be generated.
    pub fn fallback_voice(&self) -> String {
        format!(
            "Alert. {} status {}. Please investigate the health checks and recent changes.",
            self.project, self.status
        )
    }
}

/// Request a summary paragraph. `None` when nothing usable came back.
pub async fn email_paragraph(
    generator: &dyn ContentGenerator,
    brief: &IncidentBrief,
) -> Option<String> {
    if !generator.is_available() {
        return None;
    }
    let prompt = brief.email_prompt();
    let text = usable(generator.generate(EMAIL_SYSTEM_PROMPT, &prompt).await, brief)?;
    Some(truncate(&text, MAX_PARAGRAPH_CHARS))
}

/// Request a spoken script, falling back to a fixed sentence.
pub async fn voice_script(generator: &dyn ContentGenerator, brief: &IncidentBrief) -> String {
    if !generator.is_available() {
        return brief.fallback_voice();
    }
    let prompt = brief.voice_prompt();
    match usable(generator.generate(VOICE_SYSTEM_PROMPT, &prompt).await, brief) {
        Some(text) => collapse_lines(&truncate(&text, MAX_VOICE_CHARS)),
        None => brief.fallback_voice(),
    }
}

fn usable(result: NotifyResult<String>, brief: &IncidentBrief) -> Option<String> {
    match result {
        Ok(text) => {
            let text = text.trim();
            if text.is_empty() || text.eq_ignore_ascii_case(NO_ANSWER) {
                debug!(kind = %brief.kind, project = %brief.project, "generator returned no content");
                None
            } else {
                Some(text.to_string())
            }
        }
        Err(e) => {
            warn!(kind = %brief.kind, project = %brief.project, error = %e, "content generation failed");
            None
        }
    }
}

/// Keep the first `max` characters, marking the cut with ` ...`.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{} ...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Collapse any run of line breaks into a single space.
pub fn collapse_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_break = false;
    for ch in text.chars() {
        if ch == '\r' || ch == '\n' {
            if !in_break {
                out.push(' ');
                in_break = true;
            }
        } else {
            out.push(ch);
            in_break = false;
        }
    }
    out
}
