//! Message scoring for the werewolf decision engine.
//!
//! Every player speech is checked by three independent scorers: injection
//! attempts, false quotations of other players, and speech quality. Each
//! verdict becomes signed [`Evidence`](werewolf_types::Evidence) for the
//! trust ledger and the suspicion engine.
//!
//! Rule-based scoring is the default. A learned implementation backed by
//! an external [`TextCompletion`] can be switched on per scorer set; when
//! it fails the pipeline degrades to the rules for that message.
//!
//! # Modules
//!
//! - [`completion`] -- The text-completion seam and its retry budget
//! - [`config`] -- Switches and thresholds
//! - [`parse`] -- Learned verdict parsing
//! - [`pipeline`] -- The [`DetectionPipeline`]
//! - [`prompt`] -- Prompt templates
//! - [`rules`] -- Pattern and heuristic scorers
//! - [`scorer`] -- Scorer identities and outputs
//! - [`error`] -- Error types

pub mod completion;
pub mod config;
pub mod error;
pub mod parse;
pub mod pipeline;
pub mod prompt;
pub mod rules;
pub mod scorer;

pub use completion::{CompletionOptions, TextCompletion, complete_with_retry};
pub use config::DetectionConfig;
pub use error::{CompletionError, DetectionError};
pub use pipeline::{DetectionPipeline, DetectionReport};
pub use prompt::{PromptEngine, RenderedPrompt};
pub use rules::{InjectionClass, InjectionFinding, QuoteFinding, RuleSet, SpeechAssessment};
pub use scorer::{ScorerKind, ScorerOutput, ScorerSource};
