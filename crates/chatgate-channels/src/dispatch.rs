use chatgate_agent::outcome::FROM_RESPONSE_PREFIX;
use chatgate_agent::{CompletionOutcome, CompletionStatus};
use chatgate_core::Principal;
use chatgate_moderation::ModerationVerdict;
use tracing::debug;

use crate::split::split_message;
use crate::types::{Action, ModerationNotice, NoticeSource, Severity};

/// How much of the offending text a moderator notice quotes.
const EXCERPT_CHARS: usize = 500;

/// Turns classified outcomes into the ordered actions the platform adapter
/// performs.
#[derive(Debug, Clone)]
pub struct ResponseDispatcher {
    max_message_chars: usize,
}

impl ResponseDispatcher {
    pub fn new(max_message_chars: usize) -> Self {
        Self { max_message_chars }
    }

    pub fn render(&self, principal: &Principal, outcome: &CompletionOutcome) -> Vec<Action> {
        let reasons = || {
            let text = outcome.status_text().unwrap_or_default();
            text.strip_prefix(FROM_RESPONSE_PREFIX)
                .unwrap_or(text)
                .to_string()
        };

        let actions = match outcome.status() {
            CompletionStatus::Ok | CompletionStatus::ModerationFlagged => {
                let mut actions = match outcome.reply_text() {
                    Some(reply) => split_message(reply, self.max_message_chars)
                        .into_iter()
                        .map(|text| Action::SendText { text })
                        .collect(),
                    None => vec![Action::banner(
                        Severity::Warn,
                        "**Invalid response** - empty response",
                    )],
                };
                if outcome.status() == CompletionStatus::ModerationFlagged {
                    actions.push(notify(
                        principal,
                        Severity::Warn,
                        NoticeSource::Response,
                        reasons(),
                        outcome.reply_text().unwrap_or_default(),
                    ));
                    actions.push(Action::banner(
                        Severity::Warn,
                        "⚠️ **This conversation has been flagged by moderation.**",
                    ));
                }
                actions
            }
            CompletionStatus::ModerationBlocked => vec![
                notify(
                    principal,
                    Severity::Error,
                    NoticeSource::Response,
                    reasons(),
                    outcome.withheld_text().unwrap_or_default(),
                ),
                Action::banner(
                    Severity::Error,
                    "❌ **The response has been blocked by moderation.**",
                ),
            ],
            CompletionStatus::TooLong => vec![Action::CloseConversation],
            CompletionStatus::InvalidRequest => vec![Action::banner(
                Severity::Warn,
                format!("**Invalid request** - {}", outcome.status_text().unwrap_or_default()),
            )],
            CompletionStatus::OtherError => vec![Action::banner(
                Severity::Warn,
                format!("**Error** - {}", outcome.status_text().unwrap_or_default()),
            )],
        };

        debug!(status = ?outcome.status(), actions = actions.len(), "rendered outcome");
        actions
    }

    /// Actions for the verdict on a user's own message.
    ///
    /// Blocked: delete the message, notify, red banner. Flagged: notify and a
    /// yellow banner. Clean: nothing. The caller stops processing the event
    /// when the verdict is blocked.
    pub fn render_inbound(
        &self,
        principal: &Principal,
        message_id: &str,
        content: &str,
        verdict: &ModerationVerdict,
    ) -> Vec<Action> {
        if verdict.is_blocked() {
            return vec![
                Action::DeleteMessage {
                    message_id: message_id.to_string(),
                },
                notify(
                    principal,
                    Severity::Error,
                    NoticeSource::Message,
                    verdict.blocked_summary(),
                    content,
                ),
                Action::banner(
                    Severity::Error,
                    format!("❌ **{principal}'s message has been deleted by moderation.**"),
                ),
            ];
        }
        if verdict.is_flagged() {
            return vec![
                notify(
                    principal,
                    Severity::Warn,
                    NoticeSource::Message,
                    verdict.flagged_summary(),
                    content,
                ),
                Action::banner(
                    Severity::Warn,
                    format!("⚠️ **{principal}'s message has been flagged by moderation.**"),
                ),
            ];
        }
        Vec::new()
    }

    /// Green banner announcing a conversation the adapter just opened.
    pub fn render_opening(&self, principal: &Principal) -> Vec<Action> {
        vec![Action::banner(
            Severity::Info,
            format!("{principal} wants to chat! 🤖💬"),
        )]
    }

    /// Reply to a message with no text, e.g. a bare mention.
    pub fn render_greeting(&self, principal: &Principal) -> Vec<Action> {
        vec![Action::SendText {
            text: format!("Hi {principal}! Can I help you? 🤖"),
        }]
    }

    /// Yellow banner for a failure that happened before orchestration.
    pub fn render_error(&self, message: &str) -> Vec<Action> {
        vec![Action::banner(Severity::Warn, format!("**Error** - {message}"))]
    }
}

fn notify(
    principal: &Principal,
    severity: Severity,
    source: NoticeSource,
    reasons: String,
    text: &str,
) -> Action {
    Action::NotifyModerators {
        notice: ModerationNotice {
            principal: principal.clone(),
            severity,
            source,
            reasons,
            excerpt: text.chars().take(EXCERPT_CHARS).collect(),
        },
    }
}
