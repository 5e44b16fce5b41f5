//! Pre-call briefings: driver waterfalls, knowledge base excerpts, and plan synthesis.

pub mod knowledge;
mod prompt;
pub mod synthesizer;
mod waterfall;

use serde::Serialize;

use crate::workflows::accounts::domain::CustomerRecord;
use crate::workflows::prioritization::{ActionPlan, ValidationError};

pub use knowledge::{
    DocumentError, KnowledgeBase, KnowledgeDocument, KnowledgeError, EXCERPT_CHARS,
};
pub use prompt::{render_prompt, PreCallContext};
pub use synthesizer::{
    AnthropicSettings, AnthropicSynthesizer, EchoSynthesizer, PlanSynthesizer, SynthesisError,
};
pub use waterfall::{AttributionWaterfall, Driver, ImpactDirection, DEFAULT_DRIVER_COUNT};

#[derive(Debug, thiserror::Error)]
pub enum BriefingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}

/// Context, rendered prompt and (when synthesized) the plan text for one customer.
#[derive(Debug, Clone, Serialize)]
pub struct PreCallBriefing {
    pub context: PreCallContext,
    pub prompt: String,
    pub plan: Option<String>,
}

impl PreCallBriefing {
    /// Renders the prompt without contacting a synthesizer.
    pub fn draft(
        record: &CustomerRecord,
        plan: &ActionPlan,
        knowledge: &KnowledgeBase,
    ) -> Result<Self, BriefingError> {
        let context = PreCallContext::from_plan(record, plan)?;
        let prompt = render_prompt(&context, knowledge);
        Ok(Self {
            context,
            prompt,
            plan: None,
        })
    }

    pub fn synthesize(mut self, synthesizer: &dyn PlanSynthesizer) -> Result<Self, BriefingError> {
        self.plan = Some(synthesizer.synthesize(&self.prompt)?);
        Ok(self)
    }
}
