use std::pin::Pin;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolChoiceOption,
        ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionObjectArgs,
    },
    Client,
};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tracing::{debug, info};

use crate::config::LlmConfig;
use crate::conversation::{Role, Turn};
use crate::error::ModelError;
use crate::registry::ToolDeclaration;
use crate::runtime::ToolCallRequest;

/// Partial answer text, in provider emission order.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ModelError>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

/// One message as sent to the model. Unlike a client `Turn`, this may be a
/// system message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }
}

impl From<&Turn> for PromptMessage {
    fn from(turn: &Turn) -> Self {
        let role = match turn.role {
            Role::User => PromptRole::User,
            Role::Assistant => PromptRole::Assistant,
        };
        Self {
            role,
            content: turn.content.clone(),
        }
    }
}

/// The two call shapes the chat pipeline needs from a model provider.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Non-streaming call with tool declarations and `tool_choice = auto`.
    /// Returns the requested tool calls (possibly none); any text is dropped.
    async fn decide(
        &self,
        messages: &[PromptMessage],
        tools: &[ToolDeclaration],
    ) -> Result<Vec<ToolCallRequest>, ModelError>;

    /// Streaming call without tools.
    async fn answer(&self, messages: &[PromptMessage]) -> Result<FragmentStream, ModelError>;
}

/// OpenAI-compatible chat completions client.
pub struct Brain {
    client: Client<OpenAIConfig>,
    model: String,
}

impl Brain {
    pub fn new(config: &LlmConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(config.api_key.clone())
            .with_api_base(config.base_url.clone());
        let client = Client::with_config(openai_config);

        info!("Brain connected. Model: {} via {}", config.model, config.base_url);
        Self {
            client,
            model: config.model.clone(),
        }
    }
}

fn to_request_messages(
    messages: &[PromptMessage],
) -> Result<Vec<ChatCompletionRequestMessage>, ModelError> {
    messages
        .iter()
        .map(|m| -> Result<ChatCompletionRequestMessage, ModelError> {
            let message: ChatCompletionRequestMessage = match m.role {
                PromptRole::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(m.content.as_str())
                    .build()?
                    .into(),
                PromptRole::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(m.content.as_str())
                    .build()?
                    .into(),
                PromptRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(m.content.as_str())
                    .build()?
                    .into(),
            };
            Ok(message)
        })
        .collect()
}

fn to_openai_tools(tools: &[ToolDeclaration]) -> Result<Vec<ChatCompletionTool>, ModelError> {
    tools
        .iter()
        .map(|t| -> Result<ChatCompletionTool, ModelError> {
            let function = FunctionObjectArgs::default()
                .name(t.name)
                .description(t.description)
                .parameters(t.parameters.clone())
                .build()?;
            let tool = ChatCompletionToolArgs::default()
                .r#type(ChatCompletionToolType::Function)
                .function(function)
                .build()?;
            Ok(tool)
        })
        .collect()
}

#[async_trait]
impl LanguageModel for Brain {
    async fn decide(
        &self,
        messages: &[PromptMessage],
        tools: &[ToolDeclaration],
    ) -> Result<Vec<ToolCallRequest>, ModelError> {
        // 1. Build the request with the tool menu attached
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(to_request_messages(messages)?)
            .tools(to_openai_tools(tools)?)
            .tool_choice(ChatCompletionToolChoiceOption::Auto)
            .build()?;

        // 2. Send it
        let response = self.client.chat().create(request).await?;

        // 3. Keep only the function calls; the text answer comes later
        let calls: Vec<ToolCallRequest> = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.tool_calls)
            .unwrap_or_default()
            .into_iter()
            .filter(|call| matches!(call.r#type, ChatCompletionToolType::Function))
            .filter(|call| !call.function.name.is_empty())
            .map(|call| ToolCallRequest {
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        debug!("Brain requested {} tool call(s)", calls.len());
        Ok(calls)
    }

    async fn answer(&self, messages: &[PromptMessage]) -> Result<FragmentStream, ModelError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(to_request_messages(messages)?)
            .stream(true)
            .build()?;

        let stream = self.client.chat().create_stream(request).await?;

        let fragments = stream.map(|item| match item {
            Ok(chunk) => Ok(chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
                .unwrap_or_default()),
            Err(e) => Err(ModelError::StreamFault(e.to_string())),
        });

        Ok(Box::pin(fragments))
    }
}
