//! vigild — assembles the vigil subsystems from a [`VigilConfig`].
//!
//! - State store (redb)
//! - HTTP prober
//! - Notification dispatcher (SMTP, Twilio voice, AI summaries)
//! - Escalation engine + scheduler
//! - REST API

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use vigil_escalation::Escalator;
use vigil_notify::{
    ChatCompletionClient, ContentGenerator, DisabledVoice, Dispatcher, LogMailer, Mailer,
    NoContent, SmtpMailer, TwilioVoice, VoiceChannel,
};
use vigil_probe::HttpProber;
use vigil_scheduler::Scheduler;
use vigil_state::StateStore;

pub use config::VigilConfig;

/// Timeout for calls to the voice and AI providers.
const PROVIDER_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Build the scheduler (and the engine beneath it) over `store`.
pub fn build_scheduler(config: &VigilConfig, store: Arc<StateStore>) -> anyhow::Result<Scheduler> {
    let prober = HttpProber::new(config.probe.to_probe_config()).context("building probe client")?;

    let http = reqwest::Client::builder()
        .timeout(PROVIDER_HTTP_TIMEOUT)
        .build()
        .context("building provider http client")?;

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => {
            info!(host = %smtp.host, port = smtp.port, "smtp delivery enabled");
            Arc::new(SmtpMailer::new(smtp).context("configuring smtp")?)
        }
        None => {
            warn!("no [smtp] section, emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let voice: Arc<dyn VoiceChannel> = match &config.voice {
        Some(twilio) => {
            let voice = TwilioVoice::new(http.clone(), twilio.clone());
            if voice.is_configured() {
                info!(from = %twilio.from_number, "voice calls enabled");
            } else {
                warn!("[voice] section incomplete, calls disabled");
            }
            Arc::new(voice)
        }
        None => Arc::new(DisabledVoice),
    };

    let content: Arc<dyn ContentGenerator> = match &config.ai {
        Some(ai) if !ai.api_key.trim().is_empty() => {
            info!(model = %ai.model, "ai summaries enabled");
            Arc::new(ChatCompletionClient::new(http, ai.clone()))
        }
        _ => Arc::new(NoContent),
    };

    let dispatcher = Dispatcher::new(mailer, voice, content)
        .with_send_timeout(Duration::from_secs(config.daemon.send_timeout_secs));
    let escalator = Escalator::new(store.clone(), Arc::new(prober), dispatcher);

    Ok(Scheduler::new(store, escalator).with_max_concurrency(config.daemon.max_concurrency))
}

/// Open the on-disk store under `daemon.data_dir` and seed it from config.
pub fn open_store(config: &VigilConfig) -> anyhow::Result<Arc<StateStore>> {
    let data_dir = &config.daemon.data_dir;
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;
    let db_path = data_dir.join("vigil.redb");

    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");
    config.seed(&store)?;
    Ok(Arc::new(store))
}
