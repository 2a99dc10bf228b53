//! Segline-Media: segment indexing and availability windows for adaptive
//! streaming
//!
//! This crate turns manifest-derived timing data and container index
//! structures into ordered, queryable segment indexes, and computes the
//! window within which segments can be fetched for live content.
//!
//! # Modules
//!
//! - `reference` - Segment and init segment references
//! - `mp4` - ISO-BMFF box reader and SIDX extraction
//! - `webm` - EBML parser and WebM Cues extraction
//! - `timeline` - Segment timeline expansion
//! - `segment_index` - Position-stable segment indexes, iteration and updates
//! - `presentation` - Presentation timeline, live edge and seek range
//! - `addressing` - Index-range, timeline, duration and list addressing
//! - `template` - `$Identifier$` URL templates
//! - `codecs` - Codec string normalisation cache
//!
//! # Architecture
//!
//! Manifest parsing happens elsewhere. For each representation the host
//! picks a [`SegmentAddressing`] scheme, then builds its index:
//!
//! 1. Index-range media: SIDX or Cues bytes are parsed into references
//! 2. Timeline templates: entries are expanded into time ranges and
//!    references are materialized on demand
//! 3. Duration templates: positions inside the availability window are
//!    generated and, for live content, appended on a timer
//!
//! Every index reports its segments to the [`PresentationTimeline`], which
//! in turn bounds what the index keeps through eviction.

pub mod addressing;
pub mod codecs;
pub mod error;
pub mod mp4;
pub mod presentation;
pub mod reference;
pub mod segment_index;
pub mod template;
pub mod timeline;
pub mod uri;
pub mod webm;

pub use addressing::{
    refresh_timeline_index, ContainerFormat, DurationTemplate, IndexConfig, IndexedMedia,
    RepresentationContext, SegmentAddressing, SegmentList, SegmentListEntry, SegmentTemplateFields,
};
pub use codecs::CodecCache;
pub use error::{Category, Error, Result};
pub use presentation::{
    Clock, ManualClock, PresentationTimeline, SharedPresentationTimeline, SystemClock,
    TimelineConfig, TimelineKind,
};
pub use reference::{
    AesKey, BlockCipherMode, ExtractContext, InitSegmentReference, SegmentReference,
    SegmentReferenceBuilder, SegmentStatus,
};
pub use segment_index::{
    update_every, MetaSegmentIndex, SegmentIndex, SegmentIterator, SegmentSource,
    SharedSegmentIndex, TimelineTemplate,
};
pub use template::{fill_uri_template, TemplateUris, TemplateValues};
pub use timeline::{expand_timeline, TimeRange, TimelineEntry, TimelineParams};
pub use uri::{resolve_uris, StaticUris, UriProvider};
