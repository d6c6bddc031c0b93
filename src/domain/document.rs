use std::fmt;

use serde::{Deserialize, Serialize};

/// Monotonically increasing counter identifying one edit state of a document.
///
/// The host shell bumps the revision by exactly one for every edit it
/// observes; the render pipeline uses it to tell fresh results from stale
/// ones and never interprets the value beyond ordering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Revision(u64);

impl Revision {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// The revision immediately following this one.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable view of a document at one revision.
///
/// The document itself is owned by the host shell; the pipeline only ever
/// receives snapshots and never mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub text: String,
    pub revision: Revision,
}

impl DocumentSnapshot {
    pub fn new(text: impl Into<String>, revision: Revision) -> Self {
        Self {
            text: text.into(),
            revision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revisions_order_by_value() {
        assert!(Revision::new(2) > Revision::new(1));
        assert_eq!(Revision::new(1).next(), Revision::new(2));
    }

    #[test]
    fn snapshot_preserves_text_and_revision() {
        let snapshot = DocumentSnapshot::new("# Hi", Revision::new(7));
        assert_eq!(snapshot.text, "# Hi");
        assert_eq!(snapshot.revision.get(), 7);
    }
}
