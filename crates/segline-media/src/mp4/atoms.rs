//! ISO-BMFF box type codes and headers.

/// Four-character box type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomType(pub [u8; 4]);

impl AtomType {
    pub const FTYP: Self = Self(*b"ftyp");
    pub const STYP: Self = Self(*b"styp");
    pub const SIDX: Self = Self(*b"sidx");
    pub const MOOV: Self = Self(*b"moov");
    pub const MOOF: Self = Self(*b"moof");
    pub const MDAT: Self = Self(*b"mdat");
    pub const FREE: Self = Self(*b"free");

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Get the 4-char code as a string.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl std::fmt::Display for AtomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parsed box header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Atom {
    /// Box type code.
    pub atom_type: AtomType,
    /// Offset of the box's first byte within the parsed buffer.
    pub start: u64,
    /// Box size including header.
    pub size: u64,
    /// Size of the header (8 or 16 bytes, plus 4 for full boxes).
    pub header_size: u8,
    /// Full box version, when parsed as a full box.
    pub version: Option<u8>,
    /// Full box flags (24 bits), when parsed as a full box.
    pub flags: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atom_type_display() {
        assert_eq!(AtomType::SIDX.to_string(), "sidx");
        assert_eq!(AtomType::from_bytes(*b"moof"), AtomType::MOOF);
        assert_eq!(AtomType([0xff, 0, 0, 0]).as_str(), "????");
    }
}
