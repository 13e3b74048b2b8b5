//! Event kind filtering
//!
//! Decides which decoded events are reported, based on the configured list
//! of event kinds. An empty list reports everything.

use super::kind::EventKind;

/// Filter over event kinds.
#[derive(Debug, Clone, Default)]
pub struct KindFilter {
    kinds: Vec<String>,
}

impl KindFilter {
    /// Create a filter from configured kind tags.
    ///
    /// Tags are trimmed; empty tags are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use laekning_eventhub::report::{EventKind, KindFilter};
    ///
    /// let filter = KindFilter::new(vec!["OrderPlaced".to_string()]);
    /// assert!(filter.allows(&EventKind::OrderPlaced));
    /// assert!(!filter.allows(&EventKind::ProductsIdentified));
    ///
    /// assert!(KindFilter::default().allows(&EventKind::from_tag("Anything")));
    /// ```
    pub fn new(kinds: Vec<String>) -> Self {
        let kinds = kinds
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        Self { kinds }
    }

    /// Check whether events of `kind` should be reported.
    pub fn allows(&self, kind: &EventKind) -> bool {
        self.kinds.is_empty() || self.kinds.iter().any(|k| k == kind.as_str())
    }

    /// Returns true when no kinds are configured.
    pub fn is_pass_through(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Get a human-readable summary of the active filter.
    pub fn summary(&self) -> String {
        if self.kinds.is_empty() {
            "all event types".to_string()
        } else {
            format!("event_types=[{}]", self.kinds.join(", "))
        }
    }
}
