//! Action source trait and the built-in rule-based implementation.
//!
//! During every phase the orchestrator presents each eligible player with
//! an [`ActionRequest`] and awaits a [`Decision`]. The [`ActionSource`]
//! trait abstracts who answers: the rule-based decision makers, a remote
//! model, a human, or a test script. The orchestrator enforces the phase
//! deadline and the candidate set; a source never has to.

use async_trait::async_trait;

use werewolf_agents::{DecisionContext, DecisionMakers};
use werewolf_types::{ActionRequest, Decision, PlayerId};

use crate::error::SourceError;

/// Whatever drives the players of a match.
#[async_trait]
pub trait ActionSource: Send + Sync {
    /// Answer one action request.
    ///
    /// `ctx` is the engine's current view for the acting player. Sources
    /// are free to ignore it.
    async fn request_action(
        &self,
        request: &ActionRequest,
        ctx: &DecisionContext,
    ) -> Result<Decision, SourceError>;

    /// Day speech for `speaker`, if the source produces speech at all.
    async fn speak(&self, _speaker: PlayerId, _ctx: &DecisionContext) -> Option<String> {
        None
    }

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Answers every request with the rule-based decision makers.
#[derive(Debug, Clone)]
pub struct EngineActionSource {
    makers: DecisionMakers,
}

impl EngineActionSource {
    /// Wrap `makers`.
    pub const fn new(makers: DecisionMakers) -> Self {
        Self { makers }
    }
}

#[async_trait]
impl ActionSource for EngineActionSource {
    async fn request_action(
        &self,
        request: &ActionRequest,
        ctx: &DecisionContext,
    ) -> Result<Decision, SourceError> {
        Ok(self.makers.decide(request.kind, &request.candidates, ctx).decision)
    }

    fn name(&self) -> &str {
        "rules"
    }
}
