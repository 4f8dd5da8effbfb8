//! Scripted language model for tests and offline runs.
//!
//! Returns canned tool decisions and answer fragments, and records every
//! prompt it was given so callers can assert on what the model saw.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::{stream, StreamExt};

use crate::error::ModelError;
use crate::llm::{FragmentStream, LanguageModel, PromptMessage};
use crate::registry::ToolDeclaration;
use crate::runtime::ToolCallRequest;

/// How the answer stream ends after the scripted fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamEnd {
    #[default]
    Finish,
    /// Never yields again; used to exercise client cancellation.
    Hang,
}

#[derive(Debug)]
pub struct ScriptedModel {
    decision: Result<Vec<ToolCallRequest>, ModelError>,
    answer_open: Option<ModelError>,
    fragments: Vec<Result<String, ModelError>>,
    end: StreamEnd,
    decide_calls: Mutex<Vec<Vec<PromptMessage>>>,
    declared_tools: Mutex<Vec<Vec<ToolDeclaration>>>,
    answer_calls: Mutex<Vec<Vec<PromptMessage>>>,
    released: Arc<AtomicUsize>,
}

/// Bumps the shared counter when the answer stream holding it is dropped.
struct ReleaseOnDrop(Arc<AtomicUsize>);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedModel {
    /// Requests no tools and answers with an empty stream.
    pub fn new() -> Self {
        Self {
            decision: Ok(Vec::new()),
            answer_open: None,
            fragments: Vec::new(),
            end: StreamEnd::Finish,
            decide_calls: Mutex::new(Vec::new()),
            declared_tools: Mutex::new(Vec::new()),
            answer_calls: Mutex::new(Vec::new()),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Requests these tool calls, given as `(name, raw_arguments)`.
    pub fn with_tool_calls(mut self, calls: &[(&str, &str)]) -> Self {
        self.decision = Ok(calls
            .iter()
            .map(|(name, arguments)| ToolCallRequest {
                name: name.to_string(),
                arguments: arguments.to_string(),
            })
            .collect());
        self
    }

    pub fn with_decide_error(mut self, error: ModelError) -> Self {
        self.decision = Err(error);
        self
    }

    pub fn with_answer(mut self, fragments: &[&str]) -> Self {
        self.fragments = fragments.iter().map(|f| Ok(f.to_string())).collect();
        self
    }

    /// Appends a mid-stream fault after the scripted fragments.
    pub fn with_stream_fault(mut self, message: &str) -> Self {
        self.fragments.push(Err(ModelError::StreamFault(message.to_string())));
        self
    }

    /// Fails to open the answer stream at all.
    pub fn with_answer_error(mut self, error: ModelError) -> Self {
        self.answer_open = Some(error);
        self
    }

    pub fn hanging(mut self) -> Self {
        self.end = StreamEnd::Hang;
        self
    }

    pub fn decide_calls(&self) -> Vec<Vec<PromptMessage>> {
        self.decide_calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn declared_tools(&self) -> Vec<Vec<ToolDeclaration>> {
        self.declared_tools.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn answer_calls(&self) -> Vec<Vec<PromptMessage>> {
        self.answer_calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// How many answer streams handed out so far have been dropped.
    pub fn released_streams(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn decide(
        &self,
        messages: &[PromptMessage],
        tools: &[ToolDeclaration],
    ) -> Result<Vec<ToolCallRequest>, ModelError> {
        if let Ok(mut calls) = self.decide_calls.lock() {
            calls.push(messages.to_vec());
        }
        if let Ok(mut declared) = self.declared_tools.lock() {
            declared.push(tools.to_vec());
        }
        self.decision.clone()
    }

    async fn answer(&self, messages: &[PromptMessage]) -> Result<FragmentStream, ModelError> {
        if let Ok(mut calls) = self.answer_calls.lock() {
            calls.push(messages.to_vec());
        }
        if let Some(error) = &self.answer_open {
            return Err(error.clone());
        }

        let scripted = stream::iter(self.fragments.clone());
        let fragments: FragmentStream = match self.end {
            StreamEnd::Finish => Box::pin(scripted),
            StreamEnd::Hang => Box::pin(scripted.chain(stream::pending())),
        };

        let release = ReleaseOnDrop(Arc::clone(&self.released));
        Ok(Box::pin(fragments.map(move |item| {
            let _held = &release;
            item
        })))
    }
}
