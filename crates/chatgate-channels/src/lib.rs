//! Platform-facing half of the bot: what an inbound event looks like, how a
//! [`CompletionOutcome`](chatgate_agent::CompletionOutcome) turns into
//! platform actions, and when a pending reply has gone stale.

pub mod dispatch;
pub mod error;
pub mod log;
pub mod split;
pub mod stale;
pub mod types;

pub use dispatch::ResponseDispatcher;
pub use error::ChannelError;
pub use log::{InMemoryLog, MessageLog};
pub use split::split_message;
pub use stale::is_stale;
pub use types::{
    Action, InboundEvent, MessageSnapshot, ModerationNotice, NoticeSource, Severity,
};
