//! The detection pipeline.
//!
//! Every incoming speech goes through three scorers concurrently. Each
//! scorer either uses the rule set or, when configured and a completion
//! capability is supplied, asks the model. A failed scorer never blocks the
//! other two: its error lands in [`DetectionReport::failures`] and it
//! contributes no evidence.

use std::path::Path;
use std::sync::Arc;

use minijinja::{Value, context};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use werewolf_ledger::TrustConfig;
use werewolf_types::{Evidence, PlayerId, Role, Speech};

use crate::completion::{CompletionOptions, TextCompletion, complete_with_retry};
use crate::config::DetectionConfig;
use crate::error::DetectionError;
use crate::parse::{InjectionVerdict, QuoteVerdict, SpeechVerdict, parse_verdict};
use crate::prompt::PromptEngine;
use crate::rules::RuleSet;
use crate::scorer::{ScorerKind, ScorerOutput, ScorerSource};

/// Everything the pipeline concluded about one speech.
#[derive(Debug, Default)]
pub struct DetectionReport {
    /// Evidence to submit, in scorer order.
    pub evidence: Vec<Evidence>,
    /// Role the speaker claimed in this speech.
    pub claimed_role: Option<Role>,
    /// Scorers that produced output, and how.
    pub scored: Vec<(ScorerKind, ScorerSource)>,
    /// Scorers that failed. Isolated and non-fatal.
    pub failures: Vec<DetectionError>,
}

/// Runs the injection, false-quote and speech-quality scorers.
pub struct DetectionPipeline {
    config: DetectionConfig,
    trust: TrustConfig,
    rules: RuleSet,
    prompts: PromptEngine,
    completion: Option<Arc<dyn TextCompletion>>,
}

impl core::fmt::Debug for DetectionPipeline {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DetectionPipeline")
            .field("config", &self.config)
            .field("learned", &self.completion.as_ref().map(|c| c.name().to_owned()))
            .finish_non_exhaustive()
    }
}

impl DetectionPipeline {
    /// Build a pipeline. `completion` is only used when
    /// `config.use_learned` is set.
    pub fn new(
        config: DetectionConfig,
        trust: TrustConfig,
        completion: Option<Arc<dyn TextCompletion>>,
    ) -> Result<Self, DetectionError> {
        let prompts = PromptEngine::new(config.templates_dir.as_deref().map(Path::new))?;
        Ok(Self {
            config,
            trust,
            rules: RuleSet::new()?,
            prompts,
            completion,
        })
    }

    /// A rule-only pipeline with default settings.
    pub fn rule_based(trust: TrustConfig) -> Result<Self, DetectionError> {
        Self::new(DetectionConfig::default(), trust, None)
    }

    /// Score `speech` against the `transcript` of earlier speeches.
    pub async fn inspect(&self, speech: &Speech, transcript: &[Speech]) -> DetectionReport {
        let (injection, quotes, quality) = tokio::join!(
            self.score_injection(speech),
            self.score_quotes(speech, transcript),
            self.score_speech(speech),
        );

        let mut report = DetectionReport::default();
        for outcome in [injection, quotes, quality] {
            match outcome {
                Ok(None) => {}
                Ok(Some(output)) => {
                    report.scored.push((output.kind, output.source));
                    if output.claimed_role.is_some() {
                        report.claimed_role = output.claimed_role;
                    }
                    if let Some(evidence) = output.evidence {
                        debug!(
                            player = %speech.speaker,
                            kind = ?evidence.kind,
                            strength = %evidence.strength,
                            source = ?output.source,
                            "detection evidence emitted"
                        );
                        report.evidence.push(evidence);
                    }
                }
                Err(err) => {
                    warn!(player = %speech.speaker, round = speech.round, error = %err, "scorer failed");
                    report.failures.push(err);
                }
            }
        }
        report
    }

    // -----------------------------------------------------------------------
    // Scorers
    // -----------------------------------------------------------------------

    async fn score_injection(&self, speech: &Speech) -> Result<Option<ScorerOutput>, DetectionError> {
        if !self.config.injection_enabled {
            return Ok(None);
        }
        let kind = ScorerKind::Injection;
        let learned = self
            .ask::<InjectionVerdict>(kind, speech_context(speech, &[]))
            .await;
        let (source, confidence) = match learned {
            Some(Ok(verdict)) => {
                let confidence = if verdict.is_injection() {
                    verdict.confidence.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                (ScorerSource::Learned, confidence)
            }
            Some(Err(err)) => self.fallback(err, || self.rule_injection(speech))?,
            None => (ScorerSource::Rules, self.rule_injection(speech)),
        };

        let evidence = (confidence >= self.config.injection_threshold)
            .then(|| self.trust.injection(speech.speaker, confidence, speech.round));
        Ok(Some(ScorerOutput {
            kind,
            source,
            evidence,
            claimed_role: None,
        }))
    }

    async fn score_quotes(
        &self,
        speech: &Speech,
        transcript: &[Speech],
    ) -> Result<Option<ScorerOutput>, DetectionError> {
        if !self.config.false_quote_enabled {
            return Ok(None);
        }
        let kind = ScorerKind::FalseQuote;
        let learned = self
            .ask::<QuoteVerdict>(kind, speech_context(speech, transcript))
            .await;
        let (source, (ratio, quoted)) = match learned {
            Some(Ok(verdict)) => {
                let ratio = if verdict.total_quotes == 0 {
                    0.0
                } else {
                    (f64::from(verdict.false_quotes) / f64::from(verdict.total_quotes)).clamp(0.0, 1.0)
                };
                (ScorerSource::Learned, (ratio, verdict.quoted.map(PlayerId::new)))
            }
            Some(Err(err)) => self.fallback(err, || self.rule_quotes(speech, transcript))?,
            None => (ScorerSource::Rules, self.rule_quotes(speech, transcript)),
        };

        let evidence = (ratio > 0.0)
            .then(|| self.trust.false_quote(speech.speaker, quoted, ratio, speech.round));
        Ok(Some(ScorerOutput {
            kind,
            source,
            evidence,
            claimed_role: None,
        }))
    }

    async fn score_speech(&self, speech: &Speech) -> Result<Option<ScorerOutput>, DetectionError> {
        if !self.config.speech_quality_enabled {
            return Ok(None);
        }
        let kind = ScorerKind::SpeechQuality;
        let assessment = self.rules.assess_speech(&speech.text);
        let learned = self
            .ask::<SpeechVerdict>(kind, speech_context(speech, &[]))
            .await;
        let (source, quality) = match learned {
            Some(Ok(verdict)) => (ScorerSource::Learned, verdict.quality.clamp(0.0, 1.0)),
            Some(Err(err)) => self.fallback(err, || assessment.quality)?,
            None => (ScorerSource::Rules, assessment.quality),
        };

        let evidence = ((quality - 0.5).abs() >= self.config.speech_neutral_band)
            .then(|| self.trust.speech_quality(speech.speaker, quality, speech.round));
        Ok(Some(ScorerOutput {
            kind,
            source,
            evidence,
            claimed_role: assessment.claimed_role,
        }))
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Ask the model for a verdict. `None` when learned scoring is off.
    async fn ask<T: DeserializeOwned>(
        &self,
        kind: ScorerKind,
        ctx: Value,
    ) -> Option<Result<T, DetectionError>> {
        if !self.config.use_learned {
            return None;
        }
        let client = self.completion.as_deref()?;
        let prompt = match self.prompts.render(kind.template(), &ctx) {
            Ok(prompt) => prompt,
            Err(err) => return Some(Err(err)),
        };
        let verdict = complete_with_retry(
            client,
            &prompt,
            CompletionOptions::default(),
            self.config.completion_timeout(),
            self.config.max_retries,
            parse_verdict::<T>,
        )
        .await
        .map_err(|source| DetectionError::ScorerUnavailable {
            scorer: kind,
            source,
        });
        Some(verdict)
    }

    /// Degrade to the rule-based verdict, or give up if fallback is off.
    fn fallback<R>(
        &self,
        err: DetectionError,
        rules: impl FnOnce() -> R,
    ) -> Result<(ScorerSource, R), DetectionError> {
        if self.config.rule_fallback {
            warn!(error = %err, "learned scorer failed, using rules");
            Ok((ScorerSource::Fallback, rules()))
        } else {
            Err(err)
        }
    }

    fn rule_injection(&self, speech: &Speech) -> f64 {
        self.rules
            .scan_injection(&speech.text)
            .map_or(0.0, |finding| finding.confidence)
    }

    fn rule_quotes(&self, speech: &Speech, transcript: &[Speech]) -> (f64, Option<PlayerId>) {
        self.rules
            .check_quotes(speech.speaker, &speech.text, transcript, self.config.quote_similarity)
            .map_or((0.0, None), |finding| (finding.false_ratio(), finding.first_false))
    }
}

fn speech_context(speech: &Speech, transcript: &[Speech]) -> Value {
    let lines: Vec<Value> = transcript
        .iter()
        .filter(|s| s.speaker != speech.speaker)
        .map(|s| {
            context! {
                speaker => s.speaker.to_string(),
                round => s.round,
                text => s.text.as_str(),
            }
        })
        .collect();
    context! {
        speaker => speech.speaker.to_string(),
        round => speech.round,
        text => speech.text.as_str(),
        transcript => lines,
    }
}
