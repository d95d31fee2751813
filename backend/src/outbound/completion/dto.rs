//! Chat completion request and response shapes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(super) struct ChatRequestDto<'a> {
    pub(super) model: &'a str,
    pub(super) messages: [ChatMessageDto<'a>; 1],
}

#[derive(Debug, Serialize)]
pub(super) struct ChatMessageDto<'a> {
    pub(super) role: &'static str,
    pub(super) content: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatResponseDto {
    #[serde(default)]
    pub(super) choices: Vec<ChatChoiceDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatChoiceDto {
    pub(super) message: ChatChoiceMessageDto,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatChoiceMessageDto {
    #[serde(default)]
    pub(super) content: Option<String>,
}

impl ChatResponseDto {
    /// Text of the first choice, if any.
    pub(super) fn into_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
    }
}
