//! Secret scrubbing for free text that leaves the process.

use std::sync::LazyLock;

use regex::Regex;

static SECRET_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(token|secret|password)=\S+").expect("secret pattern is valid")
});

/// Replace the value of any `token=`, `secret=` or `password=` pair
/// (case-insensitive) with `[redacted]`, keeping the key as written.
pub fn redact(text: &str) -> String {
    SECRET_PAIR.replace_all(text, "${1}=[redacted]").into_owned()
}

/// Redact an optional reason, rendering a missing one as `N/A`.
pub fn redact_reason(reason: Option<&str>) -> String {
    reason.map_or_else(|| "N/A".to_string(), redact)
}
