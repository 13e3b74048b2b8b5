//! Event kind dispatch tag.

use std::fmt;

/// The dispatch tag of an event, read from its `EventType` field.
///
/// The four kinds published by the Laekning web shop get their own variant;
/// any other tag is kept verbatim in [`EventKind::Other`] and renders no
/// fields beyond the kind itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A prescription image was uploaded to blob storage.
    PrescriptionUploaded,
    /// A prescription was analysed by document intelligence.
    PrescriptionAnalyzed,
    /// Products were matched from an extracted inscription.
    ProductsIdentified,
    /// A customer placed an order.
    OrderPlaced,
    /// Any other tag, including the `Unknown` fallback.
    Other(String),
}

impl EventKind {
    /// Tag used when an event carries no `EventType`.
    pub const UNKNOWN: &'static str = "Unknown";

    /// Maps a tag to a kind using exact, case-sensitive comparison.
    ///
    /// # Examples
    ///
    /// ```
    /// use laekning_eventhub::report::EventKind;
    ///
    /// assert_eq!(EventKind::from_tag("OrderPlaced"), EventKind::OrderPlaced);
    /// assert_eq!(
    ///     EventKind::from_tag("orderplaced"),
    ///     EventKind::Other("orderplaced".to_string())
    /// );
    /// ```
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "PrescriptionUploaded" => Self::PrescriptionUploaded,
            "PrescriptionAnalyzed" => Self::PrescriptionAnalyzed,
            "ProductsIdentified" => Self::ProductsIdentified,
            "OrderPlaced" => Self::OrderPlaced,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the tag as it appeared on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::PrescriptionUploaded => "PrescriptionUploaded",
            Self::PrescriptionAnalyzed => "PrescriptionAnalyzed",
            Self::ProductsIdentified => "ProductsIdentified",
            Self::OrderPlaced => "OrderPlaced",
            Self::Other(tag) => tag,
        }
    }

    /// Returns true for kinds that render type-specific fields.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
