//! ISO-BMFF index parsing.
//!
//! A minimal byte-slice box reader plus the `sidx` extractor built on it.
//! Only the boxes the extractor registers for are inspected.

mod atoms;
mod reader;
mod sidx;

pub use atoms::{Atom, AtomType};
pub use reader::{BoxReader, ByteReader, ParsedBox};
pub use sidx::parse_sidx;

#[cfg(test)]
pub(crate) use sidx::tests::sidx_box;
