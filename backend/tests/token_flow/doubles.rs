//! Completion provider double that records calls and can be told to fail.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokengate::domain::Prompt;
use tokengate::domain::ports::{CompletionProvider, CompletionProviderError};

#[derive(Default)]
pub struct ScriptedCompletionProvider {
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl ScriptedCompletionProvider {
    pub fn fail_with_upstream_error(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletionProvider {
    async fn complete(&self, prompt: &Prompt) -> Result<String, CompletionProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CompletionProviderError::upstream(503_u16));
        }
        Ok(format!("answer to {}", prompt.as_str()))
    }
}
