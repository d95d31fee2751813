//! Metered operations and their token prices.

use std::fmt;

use super::{TokenAmount, TokenBalance};

/// Longest prompt forwarded upstream, in characters.
pub const PROMPT_MAX_CHARS: usize = 16_384;

/// Validation errors for completion primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptValidationError {
    Empty,
    TooLong { max: usize },
}

impl fmt::Display for PromptValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "prompt must not be empty"),
            Self::TooLong { max } => write!(f, "prompt must be at most {max} characters"),
        }
    }
}

impl std::error::Error for PromptValidationError {}

/// Caller-supplied prompt forwarded verbatim to the completion provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn new(prompt: impl Into<String>) -> Result<Self, PromptValidationError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(PromptValidationError::Empty);
        }
        if prompt.chars().count() > PROMPT_MAX_CHARS {
            return Err(PromptValidationError::TooLong {
                max: PROMPT_MAX_CHARS,
            });
        }
        Ok(Self(prompt))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Spend-bearing operations known to the access gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Completion,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completion => "completion",
        }
    }
}

/// Flat token cost per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationPricing {
    completion: TokenAmount,
}

impl OperationPricing {
    pub fn new(completion: TokenAmount) -> Self {
        Self { completion }
    }

    pub fn cost_of(&self, operation: Operation) -> TokenAmount {
        match operation {
            Operation::Completion => self.completion,
        }
    }
}

impl Default for OperationPricing {
    fn default() -> Self {
        Self {
            completion: TokenAmount::MIN,
        }
    }
}

/// Output of a paid completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReceipt {
    pub text: String,
    pub tokens_charged: TokenAmount,
    pub balance_after: TokenBalance,
}
