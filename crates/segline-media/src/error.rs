//! Error types for segline-media.

use thiserror::Error;

/// Result type for segline-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad area an [`Error`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Category {
    /// Malformed container index data (SIDX, EBML, Cues).
    Media,
    /// Inconsistent or unusable manifest-derived input.
    Manifest,
    /// Low-level reader and bookkeeping failures.
    Util,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Media => write!(f, "media"),
            Category::Manifest => write!(f, "manifest"),
            Category::Util => write!(f, "util"),
        }
    }
}

/// Error type for segline-media operations.
///
/// Every variant maps to a stable numeric [`code`](Error::code) so hosts can
/// report failures without matching on the enum.
#[derive(Debug, Error)]
pub enum Error {
    /// An EBML integer was wider than 8 bytes.
    #[error("EBML integer of {size} bytes does not fit in 64 bits")]
    EbmlOverflow { size: usize },

    /// An EBML float element was neither 4 nor 8 bytes.
    #[error("EBML float must be 4 or 8 bytes, got {size}")]
    EbmlBadFloatingPointSize { size: usize },

    /// The index data did not contain a `sidx` box.
    #[error("Invalid box type, expected \"sidx\"")]
    SidxWrongBoxType,

    /// The `sidx` box declared a zero timescale.
    #[error("SIDX timescale must be non-zero")]
    SidxInvalidTimescale,

    /// The `sidx` box references another `sidx` (hierarchical index).
    #[error("Hierarchical SIDXs are not supported")]
    SidxTypeNotSupported,

    /// The cues data does not start with a Cues element.
    #[error("Not a Cues element")]
    CuesElementMissing,

    /// The init data does not start with an EBML header.
    #[error("Not an EBML header element")]
    EbmlHeaderElementMissing,

    /// No Segment element follows the EBML header.
    #[error("Not a Segment element")]
    SegmentElementMissing,

    /// The Segment element has no Info child.
    #[error("Segment element has no Info element")]
    InfoElementMissing,

    /// The Info element has no Duration child.
    #[error("Info element has no Duration element")]
    DurationElementMissing,

    /// A CuePoint lacks its CueTrackPositions child.
    #[error("CuePoint has no CueTrackPositions element")]
    CueTrackPositionsElementMissing,

    /// A CuePoint lacks its CueTime child.
    #[error("CuePoint has no CueTime element")]
    CueTimeElementMissing,

    /// A representation carries none of the supported addressing schemes.
    #[error("Representation {representation_id} has no segment information")]
    NoSegmentInfo { representation_id: String },

    /// Index-range addressing was built before its index bytes were supplied.
    #[error("Segment index data for representation {representation_id} has not been loaded")]
    IndexNotLoaded { representation_id: String },

    /// A negative repeat count cannot be resolved because the next entry starts
    /// at or before the current one.
    #[error("Negative repeat at timeline entry {entry}: next start {next_start} is not after {start}")]
    NegativeRepeat {
        entry: usize,
        start: i64,
        next_start: i64,
    },

    /// A read went past the end of the available bytes.
    #[error("Buffer underflow: need {need} bytes, have {have}")]
    BufferReadOutOfBounds { need: usize, have: usize },

    /// A field of the container index pushed a time or byte position past
    /// 64 bits.
    #[error("{field} overflows a 64-bit position")]
    IndexValueOverflow { field: &'static str },

    /// A mutation was attempted on a read-only index.
    #[error("{operation} is not supported on a read-only segment index")]
    ImmutableIndex { operation: &'static str },
}

impl Error {
    /// Create an immutable-index error for the named operation.
    pub fn immutable(operation: &'static str) -> Self {
        Self::ImmutableIndex { operation }
    }

    /// Create an out-of-bounds read error.
    pub fn out_of_bounds(need: usize, have: usize) -> Self {
        Self::BufferReadOutOfBounds { need, have }
    }

    /// Create an overflow error for the named index field.
    pub fn overflow(field: &'static str) -> Self {
        Self::IndexValueOverflow { field }
    }

    /// The category this error belongs to.
    pub fn category(&self) -> Category {
        match self {
            Error::NoSegmentInfo { .. }
            | Error::NegativeRepeat { .. }
            | Error::IndexNotLoaded { .. } => Category::Manifest,
            Error::BufferReadOutOfBounds { .. }
            | Error::ImmutableIndex { .. }
            | Error::IndexValueOverflow { .. } => Category::Util,
            _ => Category::Media,
        }
    }

    /// Stable numeric code, grouped by category (3xxx media, 4xxx manifest,
    /// 7xxx util).
    pub fn code(&self) -> u16 {
        match self {
            Error::EbmlOverflow { .. } => 3001,
            Error::EbmlBadFloatingPointSize { .. } => 3002,
            Error::SidxWrongBoxType => 3004,
            Error::SidxInvalidTimescale => 3005,
            Error::SidxTypeNotSupported => 3006,
            Error::CuesElementMissing => 3007,
            Error::EbmlHeaderElementMissing => 3008,
            Error::SegmentElementMissing => 3009,
            Error::InfoElementMissing => 3010,
            Error::DurationElementMissing => 3011,
            Error::CueTrackPositionsElementMissing => 3012,
            Error::CueTimeElementMissing => 3013,
            Error::NoSegmentInfo { .. } => 4003,
            Error::NegativeRepeat { .. } => 4004,
            Error::IndexNotLoaded { .. } => 4005,
            Error::BufferReadOutOfBounds { .. } => 7000,
            Error::ImmutableIndex { .. } => 7001,
            Error::IndexValueOverflow { .. } => 7002,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_category() {
        let errors = [
            Error::SidxInvalidTimescale,
            Error::CuesElementMissing,
            Error::NoSegmentInfo {
                representation_id: "v1".to_string(),
            },
            Error::out_of_bounds(4, 2),
            Error::immutable("merge"),
            Error::overflow("first_offset"),
        ];

        for err in &errors {
            let expected = match err.category() {
                Category::Media => 3,
                Category::Manifest => 4,
                Category::Util => 7,
            };
            assert_eq!(err.code() / 1000, expected, "{err}");
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Error::out_of_bounds(8, 3).to_string(),
            "Buffer underflow: need 8 bytes, have 3"
        );
        assert_eq!(
            Error::immutable("evict").to_string(),
            "evict is not supported on a read-only segment index"
        );
        assert_eq!(
            Error::overflow("referenced_size").to_string(),
            "referenced_size overflows a 64-bit position"
        );
    }
}
