pub mod error;
pub mod registry;
pub mod types;

pub use error::SessionError;
pub use registry::{ConversationRegistry, SessionFactory};
pub use types::Conversation;
