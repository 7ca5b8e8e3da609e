//! The Session Lifecycle Controller.
//!
//! One call to [`SessionController::process_turn`] is one turn:
//!
//! ```text
//! Active ──(end_session flag | SESSION_END)──► Concluding ──► Ended
//!   │
//!   ├─ GREETING / PROCEDURAL / SMALL_TALK → SimpleResponder
//!   └─ THERAPEUTIC                        → Pipeline
//! ```
//!
//! The session stays locked for the whole turn, so two turns on the same
//! session id run one after the other.

use cbtsim_agent::{ConclusionGenerator, Generator, MessageClassifier, Pipeline, PipelineContext, PipelineError, SimpleResponder};
use cbtsim_core::error::SessionError;
use cbtsim_core::event::{DomainEvent, EventBus};
use cbtsim_core::message::Message;
use cbtsim_core::session::{Classification, Session, TurnRequest, TurnResponse};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::store::SessionStore;

#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

pub struct SessionController {
    store: Arc<SessionStore>,
    classifier: MessageClassifier,
    responder: SimpleResponder,
    concluder: ConclusionGenerator,
    pipeline: Pipeline,
    events: Option<Arc<EventBus>>,
}

impl SessionController {
    /// `generator` backs the classifier, the simple responder and the
    /// conclusion; `pipeline` handles therapeutic turns.
    pub fn new(store: Arc<SessionStore>, generator: Generator, pipeline: Pipeline) -> Self {
        Self {
            store,
            classifier: MessageClassifier::new(generator.clone()),
            responder: SimpleResponder::new(generator.clone()),
            concluder: ConclusionGenerator::new(generator),
            pipeline,
            events: None,
        }
    }

    /// Temperature for the single-call paths (classification, simple replies, conclusion).
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.classifier = self.classifier.with_temperature(temperature);
        self.responder = self.responder.with_temperature(temperature);
        self.concluder = self.concluder.with_temperature(temperature);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }

    pub async fn process_turn(&self, request: TurnRequest) -> Result<TurnResponse, TurnError> {
        request.validate()?;

        let mut session = self.store.lock(&request.session_id).await;
        session.ensure_active()?;

        let message = request.message.trim();
        if !message.is_empty() {
            self.store.append_locked(&mut session, Message::user(message)).await?;
        }

        if request.end_session {
            info!(session_id = %session.id, "Explicit end of session requested");
            return self.conclude(&mut session).await;
        }

        let context = self.store.render_locked(&session);
        let route = self.classifier.classify(message, &context).await;
        info!(session_id = %session.id, classification = %route, "Message routed");
        self.publish(DomainEvent::MessageClassified {
            session_id: session.id.clone(),
            classification: route,
            timestamp: Utc::now(),
        });

        let reply = match route {
            Classification::SessionEnd => return self.conclude(&mut session).await,
            Classification::Therapeutic => {
                let ctx = PipelineContext::new(session.id.clone(), message, context);
                match self.pipeline.run(ctx).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        error!(session_id = %session.id, stage = %e.stage(), error = %e, "Therapeutic turn failed");
                        return Err(e.into());
                    }
                }
            }
            simple => self.responder.respond(simple, message, &context).await,
        };

        self.store.append_locked(&mut session, Message::assistant(reply.clone())).await?;
        Ok(TurnResponse {
            response: reply,
            session_id: session.id.clone(),
            is_session_ended: false,
        })
    }

    async fn conclude(&self, session: &mut Session) -> Result<TurnResponse, TurnError> {
        let context = self.store.render_locked(session);
        let conclusion = self.concluder.conclude(&context).await;

        self.store
            .append_locked(session, Message::conclusion(conclusion.text.clone()))
            .await?;
        session.mark_ended();

        info!(
            session_id = %session.id,
            message_count = session.message_count,
            fallback = conclusion.fallback,
            "Session ended"
        );
        self.publish(DomainEvent::SessionEnded {
            session_id: session.id.clone(),
            message_count: session.message_count,
            timestamp: Utc::now(),
        });

        Ok(TurnResponse {
            response: conclusion.text,
            session_id: session.id.clone(),
            is_session_ended: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbtsim_agent::conclusion::FALLBACK_CONCLUSION;
    use cbtsim_agent::responder::FALLBACK_RESPONSE;
    use cbtsim_agent::test_helpers::{FailingRetriever, ScriptedProvider, StaticRetriever};
    use cbtsim_config::SessionConfig;
    use cbtsim_core::retrieval::Retriever;

    fn controller(provider: Arc<ScriptedProvider>, retriever: Arc<dyn Retriever>) -> SessionController {
        let generator = Generator::new(provider, "m");
        let summarizer = cbtsim_agent::ContextSummarizer::new(generator.clone());
        let store = Arc::new(SessionStore::new(summarizer, &SessionConfig::default()));
        let pipeline = Pipeline::cbt(generator.clone(), retriever, 4);
        SessionController::new(store, generator, pipeline)
    }

    fn no_snippets() -> Arc<dyn Retriever> {
        Arc::new(StaticRetriever::new(Vec::<String>::new()))
    }

    #[tokio::test]
    async fn greeting_skips_the_pipeline() {
        let provider = Arc::new(ScriptedProvider::new(["GREETING", "Hello, I'm glad you're here."]));
        let retriever = Arc::new(StaticRetriever::new(["unused"]));
        let ctl = controller(provider.clone(), retriever.clone());

        let resp = ctl.process_turn(TurnRequest::new("s1", "Hi")).await.unwrap();
        assert_eq!(resp.response, "Hello, I'm glad you're here.");
        assert_eq!(resp.session_id, "s1");
        assert!(!resp.is_session_ended);

        assert_eq!(provider.call_count(), 2);
        assert!(retriever.queries().is_empty());

        let session = ctl.store().snapshot("s1").await.unwrap();
        assert_eq!(session.message_count, 2);
        assert_eq!(session.messages()[0].content, "Hi");
    }

    #[tokio::test]
    async fn therapeutic_message_runs_all_stages() {
        let provider = Arc::new(ScriptedProvider::new([
            "THERAPEUTIC",
            "ASSESSMENT-OUT",
            "PLAN-OUT",
            "That sounds hard. What tends to keep you awake?",
        ]));
        let retriever = Arc::new(StaticRetriever::new(["Sleep hygiene basics."]));
        let ctl = controller(provider.clone(), retriever.clone());

        let resp = ctl
            .process_turn(TurnRequest::new("s1", "I've been feeling anxious about work and can't sleep"))
            .await
            .unwrap();
        assert!(resp.response.ends_with('?'));
        assert_eq!(provider.call_count(), 4);
        assert_eq!(retriever.queries().len(), 1);

        let prompts = provider.prompts();
        assert!(prompts[2].contains("ASSESSMENT-OUT"));
        assert!(prompts[3].contains("ASSESSMENT-OUT"));
        assert!(prompts[3].contains("PLAN-OUT"));
    }

    #[tokio::test]
    async fn session_end_concludes_and_locks_the_session() {
        let provider = Arc::new(ScriptedProvider::new([
            "SESSION_END",
            "You worked hard today. Keep noticing those thoughts. How do you feel?",
        ]));
        let ctl = controller(provider.clone(), no_snippets());

        let resp = ctl
            .process_turn(TurnRequest::new("s1", "Thanks doc, I feel better, see you soon"))
            .await
            .unwrap();
        assert!(resp.is_session_ended);
        assert!(!resp.response.trim_end().ends_with('?'));

        let session = ctl.store().snapshot("s1").await.unwrap();
        assert!(session.ended);
        assert!(session.conclusion().is_some());
        let count = session.message_count;

        let err = ctl.process_turn(TurnRequest::new("s1", "One more thing")).await.unwrap_err();
        assert!(matches!(err, TurnError::Session(SessionError::Ended { .. })));
        assert_eq!(provider.call_count(), 2);
        assert_eq!(ctl.store().snapshot("s1").await.unwrap().message_count, count);
    }

    #[tokio::test]
    async fn explicit_end_skips_classification() {
        let provider = Arc::new(ScriptedProvider::failing());
        let ctl = controller(provider.clone(), no_snippets());

        let resp = ctl.process_turn(TurnRequest::new("s1", "").ending()).await.unwrap();
        assert!(resp.is_session_ended);
        assert_eq!(resp.response, FALLBACK_CONCLUSION);
        assert_eq!(provider.call_count(), 1);

        let session = ctl.store().snapshot("s1").await.unwrap();
        assert_eq!(session.message_count, 1);
        assert!(session.messages()[0].is_conclusion);
    }

    #[tokio::test]
    async fn ended_session_stays_ended_while_others_run() {
        let provider = Arc::new(ScriptedProvider::new(Vec::<String>::new()).with_fallback("GREETING"));
        let ctl = controller(provider, no_snippets());

        ctl.process_turn(TurnRequest::new("s1", "").ending()).await.unwrap();
        ctl.process_turn(TurnRequest::new("s2", "Hi")).await.unwrap();
        ctl.process_turn(TurnRequest::new("s3", "Hi")).await.unwrap();

        let err = ctl.process_turn(TurnRequest::new("s1", "Hello again")).await.unwrap_err();
        assert!(matches!(err, TurnError::Session(SessionError::Ended { .. })));
        assert_eq!(ctl.store().len().await, 3);
    }

    #[tokio::test]
    async fn retrieval_failure_does_not_fail_the_turn() {
        let provider = Arc::new(ScriptedProvider::new(["THERAPEUTIC", "a", "p", "What else is on your mind?"]));
        let ctl = controller(provider, Arc::new(FailingRetriever));

        let resp = ctl.process_turn(TurnRequest::new("s1", "I feel low")).await.unwrap();
        assert_eq!(resp.response, "What else is on your mind?");
    }

    #[tokio::test]
    async fn pipeline_failure_propagates_without_reply() {
        let provider = Arc::new(ScriptedProvider::new(["THERAPEUTIC", "a"]).fail_on(3));
        let ctl = controller(provider, no_snippets());

        let err = ctl.process_turn(TurnRequest::new("s1", "I feel low")).await.unwrap_err();
        assert!(matches!(err, TurnError::Pipeline(_)));

        let session = ctl.store().snapshot("s1").await.unwrap();
        assert_eq!(session.message_count, 1);
        assert!(!session.ended);
    }

    #[tokio::test]
    async fn classifier_failure_routes_to_pipeline() {
        let provider = Arc::new(
            ScriptedProvider::new(["a", "p", "How long has this been going on?"]).fail_on(1),
        );
        let ctl = controller(provider.clone(), no_snippets());

        let resp = ctl.process_turn(TurnRequest::new("s1", "Hi")).await.unwrap();
        assert_eq!(resp.response, "How long has this been going on?");
        assert_eq!(provider.call_count(), 4);
    }

    #[tokio::test]
    async fn simple_route_failure_uses_fallback() {
        let provider = Arc::new(ScriptedProvider::new(["SMALL_TALK"]));
        let ctl = controller(provider, no_snippets());

        let resp = ctl.process_turn(TurnRequest::new("s1", "Nice weather")).await.unwrap();
        assert_eq!(resp.response, FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn invalid_request_creates_nothing() {
        let ctl = controller(Arc::new(ScriptedProvider::failing()), no_snippets());

        let err = ctl.process_turn(TurnRequest::new("s1", "   ")).await.unwrap_err();
        assert!(matches!(err, TurnError::Session(SessionError::InvalidRequest(_))));
        assert!(ctl.store().is_empty().await);
    }

    #[tokio::test]
    async fn second_turn_sees_previous_exchange() {
        let provider = Arc::new(ScriptedProvider::new([
            "GREETING",
            "Welcome.",
            "SMALL_TALK",
            "It is lovely out.",
        ]));
        let ctl = controller(provider.clone(), no_snippets());

        ctl.process_turn(TurnRequest::new("s1", "Hi")).await.unwrap();
        ctl.process_turn(TurnRequest::new("s1", "Nice weather")).await.unwrap();

        let classify_prompt = &provider.prompts()[2];
        assert!(classify_prompt.contains("User: Hi"));
        assert!(classify_prompt.contains("Assistant: Welcome."));
        assert!(classify_prompt.contains("Do NOT greet"));
    }
}
