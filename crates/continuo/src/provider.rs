//! Chat backend abstraction and the OpenAI implementation.
//!
//! Agents talk to a [`ChatBackend`] so the orchestrator can be driven by
//! a scripted backend in tests. The live implementation wraps
//! `async-openai` and works against any OpenAI-compatible endpoint.

use anyhow::{Context, Result};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs,
    FinishReason as ApiFinishReason, FunctionCall, FunctionObject,
};
use async_openai::Client;
use async_trait::async_trait;
use serde::Serialize;

use crate::config::BackendConfig;

/// One message in a chat transcript.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolInvocation>,
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn plain(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain("assistant", content)
    }

    /// Assistant turn that requested tool calls, replayed into the transcript.
    pub fn assistant_calls(content: Option<String>, calls: &[ToolInvocation]) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
            tool_calls: calls.to_vec(),
            tool_call_id: None,
        }
    }

    /// Result of one tool call, keyed to the id the model supplied.
    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// A tool the model may call, described with a JSON schema.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A tool call the model asked for. `arguments` is the raw JSON string.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    Other,
}

/// One completed chat turn from the backend.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolInvocation>,
    pub finish_reason: FinishReason,
}

/// Sampling settings for a single request.
#[derive(Debug, Clone, Copy)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: None,
        }
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDef]>,
        config: &GenerationConfig,
    ) -> Result<ChatOutcome>;
}

/// Backend for OpenAI and compatible servers.
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: Option<u32>,
}

impl OpenAiBackend {
    pub fn new(config: &BackendConfig) -> Self {
        let mut api = OpenAIConfig::new();
        if let Some(base) = &config.base_url {
            api = api.with_api_base(base.as_str());
        }
        if let Some(key) = &config.api_key {
            api = api.with_api_key(key.as_str());
        }
        Self {
            client: Client::with_config(api),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }
}

fn convert_messages(messages: &[ChatMessage]) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut converted = Vec::with_capacity(messages.len());
    for message in messages {
        let text = message.content.as_deref().unwrap_or_default();
        let request_message = match message.role.as_str() {
            "system" => ChatCompletionRequestSystemMessageArgs::default()
                .content(text)
                .build()?
                .into(),
            "user" => ChatCompletionRequestUserMessageArgs::default()
                .content(text)
                .build()?
                .into(),
            "assistant" => {
                let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                if let Some(content) = &message.content {
                    args.content(content.as_str());
                }
                if !message.tool_calls.is_empty() {
                    let calls: Vec<ChatCompletionMessageToolCall> = message
                        .tool_calls
                        .iter()
                        .map(|call| ChatCompletionMessageToolCall {
                            id: call.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.clone(),
                            },
                        })
                        .collect();
                    args.tool_calls(calls);
                }
                args.build()?.into()
            }
            "tool" => ChatCompletionRequestToolMessageArgs::default()
                .content(text)
                .tool_call_id(message.tool_call_id.clone().unwrap_or_default())
                .build()?
                .into(),
            other => anyhow::bail!("unsupported message role: {other}"),
        };
        converted.push(request_message);
    }
    Ok(converted)
}

fn convert_tools(tools: &[ToolDef]) -> Vec<ChatCompletionTool> {
    tools
        .iter()
        .map(|tool| ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: tool.name.clone(),
                description: Some(tool.description.clone()),
                parameters: Some(tool.parameters.clone()),
                strict: None,
            },
        })
        .collect()
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDef]>,
        config: &GenerationConfig,
    ) -> Result<ChatOutcome> {
        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(self.model.as_str())
            .messages(convert_messages(messages)?)
            .temperature(config.temperature);
        if let Some(max) = config.max_tokens.or(self.max_tokens) {
            request.max_completion_tokens(max);
        }
        if let Some(tools) = tools {
            if !tools.is_empty() {
                request.tools(convert_tools(tools));
            }
        }

        let response = self
            .client
            .chat()
            .create(request.build()?)
            .await
            .context("chat completion request failed")?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .context("chat completion returned no choices")?;

        let finish_reason = match choice.finish_reason {
            Some(ApiFinishReason::Stop) => FinishReason::Stop,
            Some(ApiFinishReason::ToolCalls) => FinishReason::ToolCalls,
            Some(ApiFinishReason::Length) => FinishReason::Length,
            _ => FinishReason::Other,
        };
        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolInvocation {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        Ok(ChatOutcome {
            content: choice.message.content,
            tool_calls,
            finish_reason,
        })
    }
}
