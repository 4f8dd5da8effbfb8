//! The agent chat workflow: decide → execute → answer.
//!
//! A [`ChatTurn`] carries the conversation, the tool declarations and the
//! collected tool results through its states. Each state is its own method
//! so the sequence can be driven step by step with fake collaborators.

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::conversation::Conversation;
use crate::error::ChatError;
use crate::llm::{FragmentStream, LanguageModel, PromptMessage};
use crate::prompt::{grounding_message, page_context_message, AGENT_SYSTEM_PROMPT, PLAIN_SYSTEM_PROMPT};
use crate::registry::{Registry, ToolDeclaration, ToolName, TEXT_FILTER_MAX_CHARS};
use crate::runtime::{Runtime, ToolCallRequest, ToolResult};
use crate::store::{JobStore, DEFAULT_SEARCH_LIMIT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Deciding,
    Executing,
    Answering,
    Streaming,
    Failed,
}

pub struct ChatTurn {
    conversation: Conversation,
    declarations: Vec<ToolDeclaration>,
    results: Vec<ToolResult>,
    state: TurnState,
}

impl ChatTurn {
    pub fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            declarations: Registry::declarations(),
            results: Vec::new(),
            state: TurnState::Deciding,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn results(&self) -> &[ToolResult] {
        &self.results
    }

    fn conversation_messages(&self) -> impl Iterator<Item = PromptMessage> + '_ {
        self.conversation.turns().iter().map(PromptMessage::from)
    }

    fn fail<T>(&mut self, err: impl Into<ChatError>) -> Result<T, ChatError> {
        self.state = TurnState::Failed;
        Err(err.into())
    }

    /// Deciding: asks the model which tools to call. Falls back to one
    /// keyword search when it asks for none.
    pub async fn decide(&mut self, brain: &dyn LanguageModel) -> Result<Vec<ToolCallRequest>, ChatError> {
        debug_assert_eq!(self.state, TurnState::Deciding);

        let mut messages = vec![PromptMessage::system(AGENT_SYSTEM_PROMPT)];
        messages.extend(self.conversation_messages());

        let decision = brain.decide(&messages, &self.declarations).await;
        let calls = match decision {
            Ok(calls) => calls,
            Err(e) => return self.fail(e),
        };

        let calls = if calls.is_empty() {
            let fallback: Vec<_> = fallback_call(&self.conversation).into_iter().collect();
            info!("Model requested no tools, using {} fallback call(s)", fallback.len());
            fallback
        } else {
            info!("Model requested {} tool call(s)", calls.len());
            calls
        };

        self.state = TurnState::Executing;
        Ok(calls)
    }

    /// Executing: runs each call in order. Unknown tools are dropped, a
    /// schema violation aborts the turn.
    pub async fn execute(&mut self, runtime: &Runtime, calls: &[ToolCallRequest]) -> Result<(), ChatError> {
        debug_assert_eq!(self.state, TurnState::Executing);

        for call in calls {
            match runtime.run_tool(call).await {
                Ok(Some(result)) => self.results.push(result),
                Ok(None) => {}
                Err(violation) => {
                    warn!("Rejecting model tool call: {}", violation);
                    return self.fail(violation);
                }
            }
        }

        self.state = TurnState::Answering;
        Ok(())
    }

    /// Answering: opens the streaming call with the tool results folded in.
    pub async fn answer(&mut self, brain: &dyn LanguageModel) -> Result<FragmentStream, ChatError> {
        debug_assert_eq!(self.state, TurnState::Answering);

        let mut messages = vec![
            PromptMessage::system(AGENT_SYSTEM_PROMPT),
            grounding_message(&self.results),
        ];
        messages.extend(self.conversation_messages());

        let opened = brain.answer(&messages).await;
        match opened {
            Ok(stream) => {
                self.state = TurnState::Streaming;
                Ok(stream)
            }
            Err(e) => self.fail(e),
        }
    }
}

/// One `search_postings` call keyed on the latest user turn, or `None` when
/// that turn is blank or there is no user turn at all.
pub fn fallback_call(conversation: &Conversation) -> Option<ToolCallRequest> {
    let content = conversation.last_user_turn()?.content.trim();
    let keyword: String = content.chars().take(TEXT_FILTER_MAX_CHARS).collect();
    if keyword.is_empty() {
        return None;
    }

    Some(ToolCallRequest {
        name: ToolName::SearchPostings.as_str().to_string(),
        arguments: json!({ "keyword": keyword, "limit": DEFAULT_SEARCH_LIMIT }).to_string(),
    })
}

/// Entry point used by the gateway. Guarding happens before this is called.
pub struct Orchestrator {
    brain: Arc<dyn LanguageModel>,
    runtime: Runtime,
}

impl Orchestrator {
    /// `store` should be the service-tier store; tools run with it.
    pub fn new(brain: Arc<dyn LanguageModel>, store: Arc<dyn JobStore>) -> Self {
        Self {
            brain,
            runtime: Runtime::new(store),
        }
    }

    /// Runs the agent turn up to the point where the answer stream is open.
    pub async fn run(&self, conversation: Conversation) -> Result<FragmentStream, ChatError> {
        let mut turn = ChatTurn::new(conversation);

        // 1. THINK: which tools, if any
        let calls = turn.decide(self.brain.as_ref()).await?;

        // 2. ACT: run them against the store
        turn.execute(&self.runtime, &calls).await?;
        info!("Collected {} tool result(s)", turn.results().len());

        // 3. ANSWER: stream the grounded reply
        turn.answer(self.brain.as_ref()).await
    }

    /// Plain streaming chat without tools, optionally with page context.
    pub async fn chat(
        &self,
        conversation: Conversation,
        page_context: Option<&str>,
    ) -> Result<FragmentStream, ChatError> {
        let mut messages = vec![PromptMessage::system(PLAIN_SYSTEM_PROMPT)];
        if let Some(context) = page_context.filter(|c| !c.trim().is_empty()) {
            messages.push(page_context_message(context));
        }
        messages.extend(conversation.turns().iter().map(PromptMessage::from));

        Ok(self.brain.answer(&messages).await?)
    }
}
