//! Port for the metered completion provider.
//!
//! Adapters perform exactly one upstream call per invocation. Retrying and
//! refunding are decided by the caller.

use async_trait::async_trait;

use crate::domain::Prompt;

use super::define_port_error;

define_port_error! {
    /// Errors raised by completion provider adapters.
    pub enum CompletionProviderError {
        /// The provider could not be reached.
        Transport { message: String } => "completion provider unreachable: {message}",
        /// The provider answered with a non-success status.
        Upstream { status: u16 } => "completion provider returned status {status}",
        /// The provider's response could not be decoded.
        Decode { message: String } => "completion provider response malformed: {message}",
        /// The provider returned no usable text.
        EmptyResponse => "completion provider returned no output",
        /// The call did not settle within the configured deadline.
        Timeout => "completion provider timed out",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Forward `prompt` and return the generated text.
    async fn complete(&self, prompt: &Prompt) -> Result<String, CompletionProviderError>;
}

/// Development completion provider that echoes the prompt back.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureCompletionProvider;

#[async_trait]
impl CompletionProvider for FixtureCompletionProvider {
    async fn complete(&self, prompt: &Prompt) -> Result<String, CompletionProviderError> {
        Ok(format!("echo: {}", prompt.as_str()))
    }
}
