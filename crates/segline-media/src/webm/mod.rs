//! WebM index parsing: an EBML element reader and the Cues extractor.

mod cues;
mod ebml;

pub use cues::{parse_cues, parse_cues_with_info, parse_webm_info, WebmInfo};
pub use ebml::{EbmlElement, EbmlParser};
