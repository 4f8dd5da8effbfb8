//! Core of the si-zak job assistant: request guarding, the tool registry and
//! runtime, the model client, and the agent chat workflow.

pub mod config;
pub mod conversation;
pub mod error;
pub mod guard;
pub mod llm;
pub mod mock;
pub mod orchestrator;
pub mod prompt;
pub mod registry;
pub mod relay;
pub mod runtime;
pub mod store;
