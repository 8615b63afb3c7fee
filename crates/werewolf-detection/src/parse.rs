//! Parsing learned-scorer responses.
//!
//! Models wrap JSON in prose or code fences often enough that the first
//! `{` to the last `}` is taken as the payload. Anything that still fails
//! to deserialize is an [`CompletionError::InvalidResponse`], which the
//! retry wrapper and fallback treat like any other transient failure.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::CompletionError;

/// Slice from the first `{` to the last `}`, if both exist in that order.
pub fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    raw.get(start..=end)
}

/// Deserialize the JSON object embedded in `raw`.
pub fn parse_verdict<T: DeserializeOwned>(raw: &str) -> Result<T, CompletionError> {
    let payload = extract_json(raw).ok_or_else(|| CompletionError::InvalidResponse {
        reason: String::from("no JSON object in response"),
    })?;
    serde_json::from_str(payload).map_err(|e| CompletionError::InvalidResponse {
        reason: format!("malformed verdict: {e}"),
    })
}

/// Injection classification returned by the learned scorer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InjectionVerdict {
    /// `SYSTEM_FAKE`, `STATUS_FAKE`, `ROLE_FAKE`, `BENIGN` or `CLEAN`.
    pub injection_type: String,
    /// Model confidence in `[0, 1]`.
    #[serde(default)]
    pub confidence: f64,
}

impl InjectionVerdict {
    /// Returns `true` for the three forgery classes.
    pub fn is_injection(&self) -> bool {
        matches!(
            self.injection_type.trim().to_ascii_uppercase().as_str(),
            "SYSTEM_FAKE" | "STATUS_FAKE" | "ROLE_FAKE"
        )
    }
}

/// Quotation check returned by the learned scorer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuoteVerdict {
    /// Quotations found in the message.
    pub total_quotes: u32,
    /// Quotations that did not match the record.
    pub false_quotes: u32,
    /// Seat number of the (first) misquoted player.
    #[serde(default)]
    pub quoted: Option<u32>,
}

/// Speech quality returned by the learned scorer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpeechVerdict {
    /// Quality in `[0, 1]`.
    pub quality: f64,
}
