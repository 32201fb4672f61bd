//! vigil-notify — incident notifications for vigil.
//!
//! Composes role-targeted messages for the four notification kinds (new
//! incident, escalate to lead, escalate to head, resolved) and sends them
//! over email and, where configured, voice calls.
//!
//! # Architecture
//!
//! ```text
//! Dispatcher
//!   ├── templates   deterministic subject/body per kind
//!   ├── redact      scrubs token/secret/password values from free text
//!   ├── ContentGenerator (optional AI paragraph / spoken script)
//!   ├── Mailer       (SMTP or log-only)
//!   └── VoiceChannel (Twilio or disabled)
//! ```
//!
//! Every collaborator is best-effort. A failure in content generation,
//! email, or voice is logged and recorded in the [`DispatchReport`]; it is
//! never returned to the caller.

use std::future::Future;
use std::pin::Pin;

pub mod content;
pub mod dispatcher;
pub mod email;
pub mod error;
pub mod redact;
pub mod templates;
pub mod voice;

pub use content::{ChatCompletionClient, ChatConfig, ContentGenerator, NoContent};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use email::{LogMailer, Mailer, OutboundEmail, SmtpConfig, SmtpMailer};
pub use error::{NotifyError, NotifyResult};
pub use redact::redact;
pub use templates::NotificationKind;
pub use voice::{DisabledVoice, TwilioConfig, TwilioVoice, VoiceChannel, normalize_phone};

/// Boxed future alias for the object-safe collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
