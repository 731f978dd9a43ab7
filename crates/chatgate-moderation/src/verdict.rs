use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Classifier decision for one span of text.
///
/// Both sets may be empty. When both are non-empty, blocked dominates.
/// Sets are ordered so summaries are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationVerdict {
    pub flagged_reasons: BTreeSet<String>,
    pub blocked_reasons: BTreeSet<String>,
}

impl ModerationVerdict {
    /// A verdict with no reasons at all.
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn flagged<I, S>(reasons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            flagged_reasons: reasons.into_iter().map(Into::into).collect(),
            blocked_reasons: BTreeSet::new(),
        }
    }

    pub fn blocked<I, S>(reasons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            flagged_reasons: BTreeSet::new(),
            blocked_reasons: reasons.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_blocked(&self) -> bool {
        !self.blocked_reasons.is_empty()
    }

    pub fn is_flagged(&self) -> bool {
        !self.flagged_reasons.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        !self.is_blocked() && !self.is_flagged()
    }

    pub fn blocked_summary(&self) -> String {
        join(&self.blocked_reasons)
    }

    pub fn flagged_summary(&self) -> String {
        join(&self.flagged_reasons)
    }
}

fn join(reasons: &BTreeSet<String>) -> String {
    reasons.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}
