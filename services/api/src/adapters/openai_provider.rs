//! services/api/src/adapters/openai_provider.rs
//!
//! This module contains the adapter for the lesson-writing LLM.
//! It implements the `ModelProvider` port from the `core` crate against any
//! OpenAI-compatible chat completions endpoint.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat, ResponseFormatJsonSchema,
    },
    Client,
};
use async_trait::async_trait;
use lesson_gen_core::{
    ports::{ModelProvider, PortError, PortResult},
    prompt::OutputSchema,
};
use tracing::debug;

const SYSTEM_INSTRUCTIONS: &str = "You write structured teaching material. Respond only with JSON that matches the provided schema.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ModelProvider` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiModelProvider {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiModelProvider {
    /// Creates a new `OpenAiModelProvider`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

/// Builds the JSON-schema response format the provider is constrained by.
fn response_format(schema: &OutputSchema) -> ResponseFormat {
    ResponseFormat::JsonSchema {
        json_schema: ResponseFormatJsonSchema {
            description: Some(schema.description.clone()),
            name: schema.name.clone(),
            schema: Some(schema.schema.clone()),
            strict: Some(false),
        },
    }
}

//=========================================================================================
// `ModelProvider` Trait Implementation
//=========================================================================================

#[async_trait]
impl ModelProvider for OpenAiModelProvider {
    /// Sends the rendered prompt and returns the first choice's raw text.
    async fn invoke(&self, prompt: &str, schema: &OutputSchema) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .response_format(response_format(schema))
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        debug!(model = %self.model, schema = %schema.name, "Sending chat completion request");

        // Map the SDK error here; the core crate never sees `OpenAIError`.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| {
                PortError::Unexpected("Model provider returned no choices in its response.".to_string())
            })?
            .message
            .content
            .ok_or_else(|| {
                PortError::Unexpected("Model provider response contained no text content.".to_string())
            })
    }
}
