//! The four standard pipeline stages.

use async_trait::async_trait;
use cbtsim_core::retrieval::Retriever;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{NONE_AVAILABLE, PipelineContext, PipelineError, PipelineStage, Stage};
use crate::generator::Generator;
use crate::prompts::{ASSESSMENT, PromptTemplate, RESPONSE, TECHNIQUE_SELECTION};
use crate::techniques::CbtTechnique;

async fn generate(
    generator: &Generator,
    stage: PipelineStage,
    template: PromptTemplate,
    vars: &[(&str, &str)],
) -> Result<String, PipelineError> {
    let prompt = template
        .render(vars)
        .map_err(|source| PipelineError::Prompt { stage, source })?;
    let text = generator
        .generate(&prompt)
        .await
        .map_err(|source| PipelineError::Generation { stage, source })?;
    debug!(%stage, output_chars = text.len(), "Stage generated");
    Ok(text)
}

fn require<'a>(
    value: Option<&'a str>,
    stage: PipelineStage,
    input: &'static str,
) -> Result<&'a str, PipelineError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(PipelineError::MissingInput { stage, input })
}

fn context_or_none(ctx: &PipelineContext) -> &str {
    if ctx.conversation_context.trim().is_empty() {
        NONE_AVAILABLE
    } else {
        &ctx.conversation_context
    }
}

/// Fetches reference snippets for the message. Never fails: a retriever
/// error leaves the context empty and marks the run degraded.
pub struct RetrievalStage {
    retriever: Arc<dyn Retriever>,
    top_k: usize,
}

impl RetrievalStage {
    pub fn new(retriever: Arc<dyn Retriever>, top_k: usize) -> Self {
        Self { retriever, top_k }
    }
}

#[async_trait]
impl Stage for RetrievalStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::Retrieval
    }

    async fn run(&self, mut ctx: PipelineContext) -> Result<PipelineContext, PipelineError> {
        match self.retriever.retrieve(&ctx.message, self.top_k).await {
            Ok(mut snippets) => {
                snippets.truncate(self.top_k);
                debug!(
                    retriever = self.retriever.name(),
                    snippets = snippets.len(),
                    "Retrieved context"
                );
                ctx.retrieved = snippets;
            }
            Err(e) => {
                warn!(
                    session_id = %ctx.session_id,
                    retriever = self.retriever.name(),
                    error = %e,
                    "Retrieval failed; continuing without context"
                );
                ctx.retrieved.clear();
                ctx.retrieval_degraded = true;
            }
        }
        Ok(ctx)
    }
}

pub struct AssessmentStage {
    generator: Generator,
}

impl AssessmentStage {
    pub fn new(generator: Generator) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Stage for AssessmentStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::Assessment
    }

    async fn run(&self, mut ctx: PipelineContext) -> Result<PipelineContext, PipelineError> {
        let stage = self.stage();
        let message = require(Some(ctx.message.as_str()), stage, "message")?;
        let knowledge = ctx.all_retrieved_text();

        let assessment = generate(
            &self.generator,
            stage,
            ASSESSMENT,
            &[
                ("message", message),
                ("context", context_or_none(&ctx)),
                ("knowledge", &knowledge),
            ],
        )
        .await?;

        ctx.assessment = Some(assessment);
        Ok(ctx)
    }
}

pub struct TechniqueSelectionStage {
    generator: Generator,
}

impl TechniqueSelectionStage {
    pub fn new(generator: Generator) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Stage for TechniqueSelectionStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::TechniqueSelection
    }

    async fn run(&self, mut ctx: PipelineContext) -> Result<PipelineContext, PipelineError> {
        let stage = self.stage();
        let assessment = require(ctx.assessment.as_deref(), stage, "assessment")?;
        let knowledge = ctx.knowledge_text();
        let techniques = CbtTechnique::reference_list();

        let plan = generate(
            &self.generator,
            stage,
            TECHNIQUE_SELECTION,
            &[
                ("assessment", assessment),
                ("knowledge", &knowledge),
                ("techniques", &techniques),
            ],
        )
        .await?;

        ctx.technique_plan = Some(plan);
        Ok(ctx)
    }
}

pub struct ResponseStage {
    generator: Generator,
}

impl ResponseStage {
    pub fn new(generator: Generator) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Stage for ResponseStage {
    fn stage(&self) -> PipelineStage {
        PipelineStage::Response
    }

    async fn run(&self, mut ctx: PipelineContext) -> Result<PipelineContext, PipelineError> {
        let stage = self.stage();
        let message = require(Some(ctx.message.as_str()), stage, "message")?;
        let assessment = require(ctx.assessment.as_deref(), stage, "assessment")?;
        let plan = require(ctx.technique_plan.as_deref(), stage, "technique_plan")?;
        let exemplars = ctx.exemplar_text();

        let response = generate(
            &self.generator,
            stage,
            RESPONSE,
            &[
                ("message", message),
                ("context", context_or_none(&ctx)),
                ("assessment", assessment),
                ("technique_plan", plan),
                ("exemplars", &exemplars),
            ],
        )
        .await?;

        ctx.response = Some(response);
        Ok(ctx)
    }
}
