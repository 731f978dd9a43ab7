use crate::types::MessageSnapshot;

/// A pending reply is stale when the conversation's latest message changed
/// since `pre` was taken and the newer message was not written by the bot.
///
/// A missing `post` (the log forgot the conversation) is never stale.
pub fn is_stale(pre: &MessageSnapshot, post: Option<&MessageSnapshot>) -> bool {
    match post {
        Some(latest) => {
            latest.message_id != pre.message_id
                && latest.sequence > pre.sequence
                && !latest.is_bot
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(id: &str, sequence: u64, is_bot: bool) -> MessageSnapshot {
        MessageSnapshot {
            message_id: id.into(),
            author_id: if is_bot { "bot".into() } else { "u1".into() },
            sequence,
            is_bot,
        }
    }

    #[test]
    fn unchanged_is_fresh() {
        let pre = snap("m1", 1, false);
        assert!(!is_stale(&pre, Some(&pre.clone())));
    }

    #[test]
    fn newer_user_message_is_stale() {
        assert!(is_stale(&snap("m1", 1, false), Some(&snap("m2", 2, false))));
    }

    #[test]
    fn newer_bot_message_is_fresh() {
        assert!(!is_stale(&snap("m1", 1, false), Some(&snap("b1", 2, true))));
    }

    #[test]
    fn older_snapshot_is_fresh() {
        assert!(!is_stale(&snap("m2", 2, false), Some(&snap("m1", 1, false))));
    }

    #[test]
    fn missing_latest_is_fresh() {
        assert!(!is_stale(&snap("m1", 1, false), None));
    }
}
