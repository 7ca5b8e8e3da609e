//! Scripted provider and retrievers for stubbing collaborators in tests.

use cbtsim_core::error::{KnowledgeError, ProviderError};
use cbtsim_core::message::Message;
use cbtsim_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use cbtsim_core::retrieval::{RetrievedSnippet, Retriever};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

/// A provider that replays queued responses and records every request.
///
/// Calls are numbered from 1. Calls listed with [`fail_on`](Self::fail_on)
/// return a network error without consuming a queued response. When the
/// queue runs dry, `fallback` is returned if set, otherwise a network error.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ProviderRequest>>,
    failing_calls: HashSet<usize>,
    fallback: Option<String>,
}

impl ScriptedProvider {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
            failing_calls: HashSet::new(),
            fallback: None,
        }
    }

    /// Every call fails.
    pub fn failing() -> Self {
        Self::new(Vec::<String>::new())
    }

    /// Fail the given call number (1-based).
    pub fn fail_on(mut self, call: usize) -> Self {
        self.failing_calls.insert(call);
        self
    }

    /// Answer with `text` once the script is exhausted.
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// The prompt text of every call, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n"))
            .collect()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };

        if self.failing_calls.contains(&call) {
            return Err(ProviderError::Network(format!("scripted failure on call {call}")));
        }

        let next = self.responses.lock().unwrap().pop_front();
        let text = next
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| ProviderError::Network(format!("no scripted response for call {call}")))?;

        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: request.model,
        })
    }
}

/// A retriever that returns the same snippets for every query.
pub struct StaticRetriever {
    snippets: Vec<RetrievedSnippet>,
    queries: Mutex<Vec<(String, usize)>>,
}

impl StaticRetriever {
    pub fn new<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            snippets: texts.into_iter().map(RetrievedSnippet::new).collect(),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Every `(query, k)` pair received, in order.
    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Retriever for StaticRetriever {
    fn name(&self) -> &str {
        "static"
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedSnippet>, KnowledgeError> {
        self.queries.lock().unwrap().push((query.to_string(), k));
        Ok(self.snippets.iter().take(k).cloned().collect())
    }
}

/// A retriever whose every call fails.
pub struct FailingRetriever;

#[async_trait::async_trait]
impl Retriever for FailingRetriever {
    fn name(&self) -> &str {
        "failing"
    }

    async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<RetrievedSnippet>, KnowledgeError> {
        Err(KnowledgeError::QueryFailed("vector index unreachable".into()))
    }
}
