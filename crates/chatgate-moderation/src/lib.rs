//! Moderation gate: classifies a span of text for a principal into flagged
//! and blocked reason sets.

pub mod error;
pub mod moderator;
pub mod openai;
pub mod verdict;

pub use error::ModerationError;
pub use moderator::{trailing_window, Moderator};
pub use openai::OpenAiModerator;
pub use verdict::ModerationVerdict;
