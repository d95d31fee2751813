//! Reqwest-backed completion provider.
//!
//! Sends the prompt as a single user message and returns the first choice.
//! The client timeout is a transport guard only; the dispatcher enforces the
//! overall deadline.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use zeroize::Zeroizing;

use super::dto::{ChatMessageDto, ChatRequestDto, ChatResponseDto};
use crate::domain::Prompt;
use crate::domain::ports::{CompletionProvider, CompletionProviderError};

pub const DEFAULT_CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-3.5-turbo";

pub struct HttpCompletionProvider {
    client: Client,
    endpoint: Url,
    api_key: Zeroizing<String>,
    model: String,
}

impl HttpCompletionProvider {
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        endpoint: Url,
        api_key: Zeroizing<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            model: model.into(),
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a Prompt) -> ChatRequestDto<'a> {
        ChatRequestDto {
            model: &self.model,
            messages: [ChatMessageDto {
                role: "user",
                content: prompt.as_str(),
            }],
        }
    }
}

#[async_trait]
impl CompletionProvider for HttpCompletionProvider {
    async fn complete(&self, prompt: &Prompt) -> Result<String, CompletionProviderError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(self.api_key.as_str())
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(CompletionProviderError::upstream(status.as_u16()));
        }
        parse_completion(&body)
    }
}

fn parse_completion(body: &[u8]) -> Result<String, CompletionProviderError> {
    let decoded: ChatResponseDto = serde_json::from_slice(body)
        .map_err(|err| CompletionProviderError::decode(err.to_string()))?;
    decoded
        .into_text()
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(CompletionProviderError::empty_response)
}

fn map_transport_error(error: reqwest::Error) -> CompletionProviderError {
    if error.is_timeout() {
        CompletionProviderError::timeout()
    } else {
        CompletionProviderError::transport(error.to_string())
    }
}
