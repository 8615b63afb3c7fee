//! Detection pipeline configuration.
//!
//! Built once per match and passed into [`DetectionPipeline::new`]. There
//! are no process-wide toggles: turning a scorer off, or choosing learned
//! over rule-based scoring, is a field here.
//!
//! [`DetectionPipeline::new`]: crate::pipeline::DetectionPipeline::new

use std::time::Duration;

use serde::Deserialize;

/// Per-scorer switches, thresholds, and the completion call budget.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DetectionConfig {
    /// Run the injection-attempt scorer.
    #[serde(default = "default_true")]
    pub injection_enabled: bool,

    /// Run the false-quotation scorer.
    #[serde(default = "default_true")]
    pub false_quote_enabled: bool,

    /// Run the speech-quality scorer.
    #[serde(default = "default_true")]
    pub speech_quality_enabled: bool,

    /// Score with the text-completion capability when one is supplied.
    #[serde(default)]
    pub use_learned: bool,

    /// Fall back to the rule-based scorer when a learned scorer fails.
    #[serde(default = "default_true")]
    pub rule_fallback: bool,

    /// Per-attempt timeout for a completion call, in milliseconds.
    #[serde(default = "default_completion_timeout_ms")]
    pub completion_timeout_ms: u64,

    /// Extra attempts after the first failed completion call.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Minimum injection confidence that produces evidence.
    #[serde(default = "default_injection_threshold")]
    pub injection_threshold: f64,

    /// Character-set similarity at which a quotation counts as accurate.
    #[serde(default = "default_quote_similarity")]
    pub quote_similarity: f64,

    /// Speech quality within this distance of 0.5 produces no evidence.
    #[serde(default = "default_speech_neutral_band")]
    pub speech_neutral_band: f64,

    /// Directory holding `*.j2` overrides for the learned-scorer prompts.
    #[serde(default)]
    pub templates_dir: Option<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            injection_enabled: true,
            false_quote_enabled: true,
            speech_quality_enabled: true,
            use_learned: false,
            rule_fallback: true,
            completion_timeout_ms: default_completion_timeout_ms(),
            max_retries: default_max_retries(),
            injection_threshold: default_injection_threshold(),
            quote_similarity: default_quote_similarity(),
            speech_neutral_band: default_speech_neutral_band(),
            templates_dir: None,
        }
    }
}

impl DetectionConfig {
    /// Per-attempt completion timeout.
    pub const fn completion_timeout(&self) -> Duration {
        Duration::from_millis(self.completion_timeout_ms)
    }
}

const fn default_true() -> bool {
    true
}

const fn default_completion_timeout_ms() -> u64 {
    3_000
}

const fn default_max_retries() -> u32 {
    1
}

const fn default_injection_threshold() -> f64 {
    0.3
}

const fn default_quote_similarity() -> f64 {
    0.6
}

const fn default_speech_neutral_band() -> f64 {
    0.1
}
