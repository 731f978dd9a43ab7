use async_trait::async_trait;
use chatgate_core::Principal;

use crate::error::ModerationError;
use crate::verdict::ModerationVerdict;

/// Classifier interface. From the caller's side it is a pure function of
/// `(text, principal)`; the scoring model behind it is external.
///
/// No retries happen here. A failure is reported to the caller, which treats
/// moderation as mandatory.
#[async_trait]
pub trait Moderator: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &str;

    async fn classify(
        &self,
        text: &str,
        principal: &Principal,
    ) -> Result<ModerationVerdict, ModerationError>;
}

/// Return the last `max_chars` characters of `text` (whole chars, never a
/// partial UTF-8 sequence).
pub fn trailing_window(text: &str, max_chars: usize) -> &str {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    let skip = total - max_chars;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}
