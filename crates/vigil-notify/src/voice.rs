//! Voice call delivery.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::BoxFuture;
use crate::error::{NotifyError, NotifyResult};

/// Longest message handed to the call provider.
const MAX_CALL_CHARS: usize = 700;

/// Places spoken calls. Calls are best-effort.
pub trait VoiceChannel: Send + Sync {
    /// Whether voice calls can be placed at all.
    fn is_configured(&self) -> bool;

    fn call<'a>(&'a self, to_number: &'a str, message: &'a str) -> BoxFuture<'a, NotifyResult<()>>;
}

/// Voice channel used when no provider is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledVoice;

impl VoiceChannel for DisabledVoice {
    fn is_configured(&self) -> bool {
        false
    }

    fn call<'a>(&'a self, _: &'a str, _: &'a str) -> BoxFuture<'a, NotifyResult<()>> {
        Box::pin(async { Err(NotifyError::NotConfigured("voice".to_string())) })
    }
}

/// Twilio account settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TwilioConfig {
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub from_number: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    "https://api.twilio.com".to_string()
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            api_base: default_api_base(),
        }
    }
}

/// Places calls through the Twilio REST API, speaking the message via twimlets.
#[derive(Debug, Clone)]
pub struct TwilioVoice {
    http: reqwest::Client,
    config: TwilioConfig,
}

impl TwilioVoice {
    pub fn new(http: reqwest::Client, config: TwilioConfig) -> Self {
        Self { http, config }
    }

    async fn place_call(&self, to_number: &str, message: &str) -> NotifyResult<()> {
        if !self.is_configured() {
            return Err(NotifyError::NotConfigured("twilio".to_string()));
        }
        let to = normalize_phone(to_number);
        if to.is_empty() {
            return Err(NotifyError::Address {
                address: to_number.to_string(),
                reason: "empty phone number".to_string(),
            });
        }

        let spoken = speakable(message);
        let twiml_url = reqwest::Url::parse_with_params(
            "https://twimlets.com/message",
            &[("Message[0]", spoken.as_str())],
        )
        .map_err(|e| NotifyError::Address {
            address: "twimlets".to_string(),
            reason: e.to_string(),
        })?;

        let url = format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        );
        info!(%to, from = %self.config.from_number, msg_chars = spoken.len(), "placing voice call");

        let resp = self
            .http
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", to.as_str()),
                ("From", self.config.from_number.as_str()),
                ("Url", twiml_url.as_str()),
            ])
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
        Ok(())
    }
}

impl VoiceChannel for TwilioVoice {
    fn is_configured(&self) -> bool {
        !self.config.account_sid.trim().is_empty()
            && !self.config.auth_token.trim().is_empty()
            && !self.config.from_number.trim().is_empty()
    }

    fn call<'a>(&'a self, to_number: &'a str, message: &'a str) -> BoxFuture<'a, NotifyResult<()>> {
        Box::pin(self.place_call(to_number, message))
    }
}

/// Strip spaces, dashes and parentheses. Numbers without a leading `+`
/// are passed through as-is; the provider rejects them if invalid.
pub fn normalize_phone(number: &str) -> String {
    number
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
        .collect()
}

/// Trim, cap, and strip markup-sensitive characters for spoken delivery.
fn speakable(message: &str) -> String {
    let trimmed = message.trim();
    let capped = match trimmed.char_indices().nth(MAX_CALL_CHARS) {
        Some((cut, _)) => format!("{} ...", &trimmed[..cut]),
        None => trimmed.to_string(),
    };
    capped.replace('&', "and").replace(['<', '>'], "")
}
