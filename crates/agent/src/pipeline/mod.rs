//! The staged CBT response pipeline.
//!
//! A turn flows through an ordered list of stages, each a function
//! `PipelineContext -> Result<PipelineContext, PipelineError>`:
//!
//! 1. **Retrieval**: fetch reference snippets (failure degrades to none)
//! 2. **Assessment**: message + conversation + knowledge → assessment
//! 3. **Technique selection**: assessment + knowledge → technique plan
//! 4. **Response**: everything above + exemplars → the client-facing reply
//!
//! Stages run strictly in sequence. A generation failure in any stage
//! aborts the turn; there is no partial response.

pub mod stages;

use async_trait::async_trait;
use cbtsim_core::error::ProviderError;
use cbtsim_core::event::{DomainEvent, EventBus};
use cbtsim_core::retrieval::{RetrievedSnippet, Retriever};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::generator::Generator;
use crate::prompts::PromptError;
use crate::techniques::CbtTechnique;

pub use stages::{AssessmentStage, ResponseStage, RetrievalStage, TechniqueSelectionStage};

/// Placeholder text for an empty optional input.
pub const NONE_AVAILABLE: &str = "None available.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Retrieval,
    Assessment,
    TechniqueSelection,
    Response,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Retrieval => "retrieval",
            PipelineStage::Assessment => "assessment",
            PipelineStage::TechniqueSelection => "technique_selection",
            PipelineStage::Response => "response",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("{stage} stage failed: {source}")]
    Generation {
        stage: PipelineStage,
        #[source]
        source: ProviderError,
    },

    #[error("{stage} stage could not build its prompt: {source}")]
    Prompt {
        stage: PipelineStage,
        #[source]
        source: PromptError,
    },

    #[error("{stage} stage ran without its {input} input")]
    MissingInput {
        stage: PipelineStage,
        input: &'static str,
    },
}

impl PipelineError {
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::Generation { stage, .. }
            | PipelineError::Prompt { stage, .. }
            | PipelineError::MissingInput { stage, .. } => *stage,
        }
    }
}

/// State threaded through the stages of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineContext {
    pub session_id: String,
    /// The client's message for this turn
    pub message: String,
    /// Rendered conversation context (history or summary + tail)
    pub conversation_context: String,
    pub retrieved: Vec<RetrievedSnippet>,
    /// Set when retrieval failed and the run continued without context
    pub retrieval_degraded: bool,
    pub assessment: Option<String>,
    pub technique_plan: Option<String>,
    pub response: Option<String>,
}

impl PipelineContext {
    pub fn new(
        session_id: impl Into<String>,
        message: impl Into<String>,
        conversation_context: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            message: message.into(),
            conversation_context: conversation_context.into(),
            ..Default::default()
        }
    }

    /// Plain reference snippets as a bulleted block.
    pub fn knowledge_text(&self) -> String {
        let lines: Vec<String> = self
            .retrieved
            .iter()
            .filter(|s| !s.is_conversation_exemplar())
            .map(|s| format!("- {}", s.text.trim()))
            .collect();
        if lines.is_empty() {
            NONE_AVAILABLE.to_string()
        } else {
            lines.join("\n")
        }
    }

    /// Client/therapist exemplars as numbered examples.
    pub fn exemplar_text(&self) -> String {
        let blocks: Vec<String> = self
            .retrieved
            .iter()
            .filter(|s| s.is_conversation_exemplar())
            .enumerate()
            .map(|(i, s)| format!("Example {}:\n{}", i + 1, s.text.trim()))
            .collect();
        if blocks.is_empty() {
            NONE_AVAILABLE.to_string()
        } else {
            blocks.join("\n\n")
        }
    }

    /// Every retrieved snippet grouped by kind, for the assessment stage.
    pub fn all_retrieved_text(&self) -> String {
        if self.retrieved.is_empty() {
            return NONE_AVAILABLE.to_string();
        }
        let mut sections = Vec::new();
        let knowledge = self.knowledge_text();
        if knowledge != NONE_AVAILABLE {
            sections.push(format!("Relevant CBT knowledge:\n{knowledge}"));
        }
        let exemplars = self.exemplar_text();
        if exemplars != NONE_AVAILABLE {
            sections.push(format!("Similar therapy conversations:\n{exemplars}"));
        }
        sections.join("\n\n")
    }
}

/// One step of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    fn stage(&self) -> PipelineStage;

    async fn run(&self, ctx: PipelineContext) -> Result<PipelineContext, PipelineError>;
}

/// Runs stages in order and publishes progress on the event bus.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    events: Option<Arc<EventBus>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self {
            stages,
            events: None,
        }
    }

    /// The standard retrieval → assessment → technique → response pipeline.
    pub fn cbt(generator: Generator, retriever: Arc<dyn Retriever>, top_k: usize) -> Self {
        Self::new(vec![
            Box::new(RetrievalStage::new(retriever, top_k)),
            Box::new(AssessmentStage::new(generator.clone())),
            Box::new(TechniqueSelectionStage::new(generator.clone())),
            Box::new(ResponseStage::new(generator)),
        ])
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn stages(&self) -> Vec<PipelineStage> {
        self.stages.iter().map(|s| s.stage()).collect()
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    /// Run every stage and return the final context.
    pub async fn execute(&self, mut ctx: PipelineContext) -> Result<PipelineContext, PipelineError> {
        for stage in &self.stages {
            let kind = stage.stage();
            let session_id = ctx.session_id.clone();
            ctx = match stage.run(ctx).await {
                Ok(next) => next,
                Err(e) => {
                    warn!(%session_id, stage = %kind, error = %e, "Pipeline stage failed");
                    self.publish(DomainEvent::ErrorOccurred {
                        context: format!("pipeline:{kind}"),
                        error_message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    return Err(e);
                }
            };

            if kind == PipelineStage::Retrieval {
                self.publish(DomainEvent::RetrievalCompleted {
                    session_id: ctx.session_id.clone(),
                    snippets: ctx.retrieved.len(),
                    degraded: ctx.retrieval_degraded,
                    timestamp: Utc::now(),
                });
            }
            self.publish(DomainEvent::StageCompleted {
                session_id: ctx.session_id.clone(),
                stage: kind.as_str().to_string(),
                timestamp: Utc::now(),
            });
        }
        Ok(ctx)
    }

    /// Run the pipeline and return the client-facing reply.
    pub async fn run(&self, ctx: PipelineContext) -> Result<String, PipelineError> {
        let session_id = ctx.session_id.clone();
        let ctx = self.execute(ctx).await?;
        let response = ctx.response.ok_or(PipelineError::MissingInput {
            stage: PipelineStage::Response,
            input: "response",
        })?;

        let named = CbtTechnique::mentioned_in(&response);
        if !named.is_empty() {
            warn!(%session_id, techniques = ?named, "Response names CBT techniques explicitly");
        }
        if !response.trim_end().ends_with('?') {
            warn!(%session_id, "Response does not end with a question");
        }
        info!(%session_id, response_chars = response.len(), "Pipeline completed");
        Ok(response)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingRetriever, ScriptedProvider, StaticRetriever};

    const KNOWLEDGE: &str = "Behavioral activation schedules rewarding activities.";
    const EXEMPLAR: &str = "Client: I can't sleep.\nTherapist: What keeps your mind busy at night?";

    fn scripted(responses: &[&str]) -> Arc<ScriptedProvider> {
        Arc::new(ScriptedProvider::new(responses.iter().copied()))
    }

    fn context() -> PipelineContext {
        PipelineContext::new(
            "s1",
            "I've been feeling anxious about work and can't sleep",
            "Full conversation history:\nUser: Hi\nAssistant: Hello, welcome.\n",
        )
    }

    async fn drain_stage_events(rx: &mut tokio::sync::broadcast::Receiver<Arc<DomainEvent>>) -> Vec<String> {
        let mut stages = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let DomainEvent::StageCompleted { stage, .. } = event.as_ref() {
                stages.push(stage.clone());
            }
        }
        stages
    }

    #[tokio::test]
    async fn stages_thread_outputs_in_order() {
        let provider = scripted(&["ASSESSMENT-OUT", "PLAN-OUT", "That sounds exhausting. What thoughts come up at night?"]);
        let retriever = Arc::new(StaticRetriever::new([KNOWLEDGE, EXEMPLAR]));
        let bus = Arc::new(EventBus::new(32));
        let mut rx = bus.subscribe();

        let pipeline = Pipeline::cbt(Generator::new(provider.clone(), "m"), retriever.clone(), 4)
            .with_events(bus);
        let reply = pipeline.run(context()).await.unwrap();
        assert_eq!(reply, "That sounds exhausting. What thoughts come up at night?");

        let prompts = provider.prompts();
        assert_eq!(prompts.len(), 3);

        // Assessment sees message, conversation and every snippet.
        assert!(prompts[0].contains("anxious about work"));
        assert!(prompts[0].contains("User: Hi"));
        assert!(prompts[0].contains(KNOWLEDGE));
        assert!(prompts[0].contains("Therapist: What keeps"));

        // Technique selection sees the assessment, knowledge and the taxonomy.
        assert!(prompts[1].contains("ASSESSMENT-OUT"));
        assert!(prompts[1].contains(KNOWLEDGE));
        assert!(prompts[1].contains(&CbtTechnique::reference_list()));
        assert!(!prompts[1].contains("Therapist: What keeps"));

        // Response sees everything accumulated so far plus exemplars.
        assert!(prompts[2].contains("anxious about work"));
        assert!(prompts[2].contains("ASSESSMENT-OUT"));
        assert!(prompts[2].contains("PLAN-OUT"));
        assert!(prompts[2].contains("Example 1:\nClient: I can't sleep."));

        assert_eq!(retriever.queries(), vec![(context().message, 4)]);
        assert_eq!(
            drain_stage_events(&mut rx).await,
            vec!["retrieval", "assessment", "technique_selection", "response"]
        );
    }

    #[tokio::test]
    async fn retrieval_failure_degrades_but_completes() {
        let provider = scripted(&["a", "p", "How are you holding up?"]);
        let bus = Arc::new(EventBus::new(32));
        let mut rx = bus.subscribe();

        let pipeline = Pipeline::cbt(Generator::new(provider.clone(), "m"), Arc::new(FailingRetriever), 4)
            .with_events(bus);
        let ctx = pipeline.execute(context()).await.unwrap();

        assert!(ctx.retrieval_degraded);
        assert!(ctx.retrieved.is_empty());
        assert_eq!(ctx.response.as_deref(), Some("How are you holding up?"));
        assert!(provider.prompts()[0].contains(NONE_AVAILABLE));

        let first = rx.try_recv().unwrap();
        assert!(matches!(
            first.as_ref(),
            DomainEvent::RetrievalCompleted { degraded: true, snippets: 0, .. }
        ));
    }

    #[tokio::test]
    async fn generation_failure_aborts_the_turn() {
        let provider = Arc::new(ScriptedProvider::new(["ASSESSMENT-OUT", "never used"]).fail_on(2));
        let pipeline = Pipeline::cbt(
            Generator::new(provider.clone(), "m"),
            Arc::new(StaticRetriever::new(Vec::<String>::new())),
            4,
        );

        let err = pipeline.run(context()).await.unwrap_err();
        assert_eq!(err.stage(), PipelineStage::TechniqueSelection);
        assert!(matches!(err, PipelineError::Generation { .. }));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn stage_refuses_to_run_without_prior_output() {
        let provider = scripted(&["unused"]);
        let stage = ResponseStage::new(Generator::new(provider.clone(), "m"));

        let err = stage.run(context()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingInput { stage: PipelineStage::Response, input: "assessment" }
        ));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_final_response_is_an_error() {
        let provider = scripted(&["a"]);
        let pipeline = Pipeline::new(vec![Box::new(AssessmentStage::new(Generator::new(provider, "m")))]);
        let err = pipeline.run(context()).await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput { input: "response", .. }));
    }

    #[test]
    fn snippets_split_into_knowledge_and_exemplars() {
        let mut ctx = context();
        assert_eq!(ctx.knowledge_text(), NONE_AVAILABLE);
        assert_eq!(ctx.exemplar_text(), NONE_AVAILABLE);
        assert_eq!(ctx.all_retrieved_text(), NONE_AVAILABLE);

        ctx.retrieved = vec![RetrievedSnippet::new(KNOWLEDGE), RetrievedSnippet::new(EXEMPLAR)];
        assert_eq!(ctx.knowledge_text(), format!("- {KNOWLEDGE}"));
        assert!(ctx.exemplar_text().starts_with("Example 1:\nClient:"));
        let all = ctx.all_retrieved_text();
        assert!(all.contains("Relevant CBT knowledge:"));
        assert!(all.contains("Similar therapy conversations:"));
    }

    #[test]
    fn default_pipeline_stage_order() {
        let provider = scripted(&[]);
        let pipeline = Pipeline::cbt(Generator::new(provider, "m"), Arc::new(FailingRetriever), 4);
        assert_eq!(
            pipeline.stages(),
            vec![
                PipelineStage::Retrieval,
                PipelineStage::Assessment,
                PipelineStage::TechniqueSelection,
                PipelineStage::Response
            ]
        );
    }
}
