//! Scorer identities and per-scorer output.

use serde::Serialize;

use werewolf_types::{Evidence, Role};

/// The three independent message scorers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ScorerKind {
    /// Attempts to impersonate system instructions.
    Injection,
    /// Claims about other players' statements that do not match the record.
    FalseQuote,
    /// Logical consistency of the speech.
    SpeechQuality,
}

impl ScorerKind {
    /// Template used by the learned implementation.
    pub const fn template(self) -> &'static str {
        match self {
            Self::Injection => "injection",
            Self::FalseQuote => "false_quote",
            Self::SpeechQuality => "speech_quality",
        }
    }
}

impl core::fmt::Display for ScorerKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            Self::Injection => "injection",
            Self::FalseQuote => "false-quote",
            Self::SpeechQuality => "speech-quality",
        };
        f.write_str(label)
    }
}

/// Which implementation produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScorerSource {
    /// Built-in patterns and heuristics.
    Rules,
    /// The text-completion capability.
    Learned,
    /// Rules, after the learned implementation failed.
    Fallback,
}

/// What one scorer produced for one message.
#[derive(Debug, Clone, PartialEq)]
pub struct ScorerOutput {
    /// Which scorer ran.
    pub kind: ScorerKind,
    /// Which implementation produced the verdict.
    pub source: ScorerSource,
    /// Evidence to submit, if the verdict was strong enough.
    pub evidence: Option<Evidence>,
    /// Role the speaker claimed, reported by the speech scorer.
    pub claimed_role: Option<Role>,
}
