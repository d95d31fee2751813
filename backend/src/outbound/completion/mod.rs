//! OpenAI-compatible chat completion adapter.

mod dto;
mod http_completion_provider;

pub use http_completion_provider::{
    DEFAULT_CHAT_COMPLETIONS_URL, DEFAULT_COMPLETION_MODEL, HttpCompletionProvider,
};
