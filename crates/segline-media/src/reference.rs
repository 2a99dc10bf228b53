//! Segment and init segment references.
//!
//! References are immutable values. Anything that needs a different start,
//! end or offset builds a new reference from an existing one, so holders of
//! an `Arc<SegmentReference>` never observe a torn update.

use std::sync::Arc;

use bytes::Bytes;

use crate::uri::UriProvider;

/// Fetch status of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum SegmentStatus {
    #[default]
    Available,
    Unavailable,
    Missing,
}

/// AES block cipher mode for segment-level encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum BlockCipherMode {
    Cbc,
    Ctr,
}

/// Key material for segment-level AES encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AesKey {
    /// Key size in bits (128 or 256).
    pub bits_key: u16,
    pub block_cipher_mode: BlockCipherMode,
    /// Raw key bytes, when already known.
    pub key: Option<Bytes>,
    /// Where to fetch the key from otherwise.
    pub key_uri: Option<String>,
    /// Explicit IV; derived from the media sequence number when absent.
    pub iv: Option<[u8; 16]>,
    pub first_media_sequence_number: u64,
}

/// Reference to a representation's initialization segment.
#[derive(Debug, Clone)]
pub struct InitSegmentReference {
    uris: Arc<dyn UriProvider>,
    start_byte: u64,
    end_byte: Option<u64>,
    timescale: Option<u32>,
    segment_data: Option<Bytes>,
    codecs: Option<String>,
    mime_type: Option<String>,
    aes_key: Option<AesKey>,
}

impl InitSegmentReference {
    pub fn new(uris: Arc<dyn UriProvider>, start_byte: u64, end_byte: Option<u64>) -> Self {
        Self {
            uris,
            start_byte,
            end_byte,
            timescale: None,
            segment_data: None,
            codecs: None,
            mime_type: None,
            aes_key: None,
        }
    }

    pub fn with_timescale(mut self, timescale: u32) -> Self {
        self.timescale = Some(timescale);
        self
    }

    /// Attach already-fetched init segment bytes.
    pub fn with_segment_data(mut self, data: Bytes) -> Self {
        self.segment_data = Some(data);
        self
    }

    pub fn with_codecs(mut self, codecs: impl Into<String>) -> Self {
        self.codecs = Some(codecs.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_aes_key(mut self, aes_key: AesKey) -> Self {
        self.aes_key = Some(aes_key);
        self
    }

    pub fn uris(&self) -> Vec<String> {
        self.uris.resolve()
    }

    pub fn start_byte(&self) -> u64 {
        self.start_byte
    }

    pub fn end_byte(&self) -> Option<u64> {
        self.end_byte
    }

    /// Size of the byte range, or `None` when it runs to the end of the resource.
    pub fn size(&self) -> Option<u64> {
        self.end_byte.map(|end| end - self.start_byte + 1)
    }

    pub fn timescale(&self) -> Option<u32> {
        self.timescale
    }

    pub fn segment_data(&self) -> Option<&Bytes> {
        self.segment_data.as_ref()
    }

    pub fn codecs(&self) -> Option<&str> {
        self.codecs.as_deref()
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn aes_key(&self) -> Option<&AesKey> {
        self.aes_key.as_ref()
    }
}

impl PartialEq for InitSegmentReference {
    fn eq(&self, other: &Self) -> bool {
        self.start_byte == other.start_byte
            && self.end_byte == other.end_byte
            && self.uris() == other.uris()
    }
}

/// A single fetchable media segment.
#[derive(Debug, Clone)]
pub struct SegmentReference {
    start_time: f64,
    end_time: f64,
    true_end_time: f64,
    uris: Arc<dyn UriProvider>,
    start_byte: u64,
    end_byte: Option<u64>,
    init_segment: Option<Arc<InitSegmentReference>>,
    timestamp_offset: f64,
    append_window_start: f64,
    append_window_end: f64,
    partial_references: Vec<Arc<SegmentReference>>,
    all_partial_segments: bool,
    independent: bool,
    partial: bool,
    first_partial: bool,
    last_partial: bool,
    aes_key: Option<AesKey>,
    codecs: Option<String>,
    mime_type: Option<String>,
    bandwidth: Option<u64>,
    status: SegmentStatus,
}

impl SegmentReference {
    /// Start building a reference covering `[start_time, end_time)`.
    pub fn builder(
        start_time: f64,
        end_time: f64,
        uris: Arc<dyn UriProvider>,
    ) -> SegmentReferenceBuilder {
        SegmentReferenceBuilder::new(start_time, end_time, uris)
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    /// End time before any clamping to a period boundary.
    pub fn true_end_time(&self) -> f64 {
        self.true_end_time
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Resolve the candidate URIs. Template substitution happens here.
    pub fn uris(&self) -> Vec<String> {
        self.uris.resolve()
    }

    pub fn uri_provider(&self) -> &Arc<dyn UriProvider> {
        &self.uris
    }

    pub fn start_byte(&self) -> u64 {
        self.start_byte
    }

    pub fn end_byte(&self) -> Option<u64> {
        self.end_byte
    }

    /// Size of the byte range, or `None` when it runs to the end of the resource.
    pub fn size(&self) -> Option<u64> {
        self.end_byte.map(|end| end - self.start_byte + 1)
    }

    pub fn init_segment(&self) -> Option<&Arc<InitSegmentReference>> {
        self.init_segment.as_ref()
    }

    pub fn timestamp_offset(&self) -> f64 {
        self.timestamp_offset
    }

    pub fn append_window_start(&self) -> f64 {
        self.append_window_start
    }

    pub fn append_window_end(&self) -> f64 {
        self.append_window_end
    }

    pub fn partial_references(&self) -> &[Arc<SegmentReference>] {
        &self.partial_references
    }

    pub fn has_partial_segments(&self) -> bool {
        !self.partial_references.is_empty()
    }

    /// Whether every partial of this parent has been published.
    pub fn all_partial_segments(&self) -> bool {
        self.all_partial_segments
    }

    /// Whether decoding can start at this segment.
    pub fn is_independent(&self) -> bool {
        self.independent
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }

    pub fn is_first_partial(&self) -> bool {
        self.first_partial
    }

    pub fn is_last_partial(&self) -> bool {
        self.last_partial
    }

    pub fn aes_key(&self) -> Option<&AesKey> {
        self.aes_key.as_ref()
    }

    pub fn codecs(&self) -> Option<&str> {
        self.codecs.as_deref()
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn bandwidth(&self) -> Option<u64> {
        self.bandwidth
    }

    pub fn status(&self) -> SegmentStatus {
        self.status
    }

    /// Copy of this reference whose end is clamped to `end_time`.
    ///
    /// The true end is preserved so the un-clamped duration stays known.
    pub fn with_end_time(&self, end_time: f64) -> SegmentReference {
        let mut copy = self.clone();
        copy.end_time = end_time;
        copy
    }

    /// Copy of this reference shifted by `offset` seconds, partials included.
    pub fn offset_by(&self, offset: f64) -> SegmentReference {
        let mut copy = self.clone();
        copy.start_time += offset;
        copy.end_time += offset;
        copy.true_end_time += offset;
        copy.timestamp_offset += offset;
        copy.append_window_start += offset;
        copy.append_window_end += offset;
        copy.partial_references = self
            .partial_references
            .iter()
            .map(|partial| Arc::new(partial.offset_by(offset)))
            .collect();
        copy
    }

    pub fn with_status(&self, status: SegmentStatus) -> SegmentReference {
        let mut copy = self.clone();
        copy.status = status;
        copy
    }

    /// Copy of this reference pointing at a different init segment.
    pub fn with_init_segment(&self, init: Option<Arc<InitSegmentReference>>) -> SegmentReference {
        let mut copy = self.clone();
        copy.init_segment = init.clone();
        copy.partial_references = self
            .partial_references
            .iter()
            .map(|partial| Arc::new(partial.with_init_segment(init.clone())))
            .collect();
        copy
    }
}

/// Builder for [`SegmentReference`].
#[derive(Debug)]
pub struct SegmentReferenceBuilder {
    reference: SegmentReference,
    true_end_time: Option<f64>,
}

impl SegmentReferenceBuilder {
    fn new(start_time: f64, end_time: f64, uris: Arc<dyn UriProvider>) -> Self {
        Self {
            reference: SegmentReference {
                start_time,
                end_time,
                true_end_time: end_time,
                uris,
                start_byte: 0,
                end_byte: None,
                init_segment: None,
                timestamp_offset: 0.0,
                append_window_start: 0.0,
                append_window_end: f64::INFINITY,
                partial_references: Vec::new(),
                all_partial_segments: true,
                independent: true,
                partial: false,
                first_partial: false,
                last_partial: false,
                aes_key: None,
                codecs: None,
                mime_type: None,
                bandwidth: None,
                status: SegmentStatus::Available,
            },
            true_end_time: None,
        }
    }

    /// Byte range `[start_byte, end_byte]`; `None` runs to the end of the resource.
    pub fn byte_range(mut self, start_byte: u64, end_byte: Option<u64>) -> Self {
        self.reference.start_byte = start_byte;
        self.reference.end_byte = end_byte;
        self
    }

    pub fn init_segment(mut self, init: Option<Arc<InitSegmentReference>>) -> Self {
        self.reference.init_segment = init;
        self
    }

    pub fn timestamp_offset(mut self, offset: f64) -> Self {
        self.reference.timestamp_offset = offset;
        self
    }

    pub fn append_window(mut self, start: f64, end: f64) -> Self {
        self.reference.append_window_start = start;
        self.reference.append_window_end = end;
        self
    }

    /// Attach partial segments. The first and last are flagged accordingly.
    pub fn partial_references(mut self, partials: Vec<SegmentReference>) -> Self {
        let count = partials.len();
        self.reference.partial_references = partials
            .into_iter()
            .enumerate()
            .map(|(i, mut partial)| {
                partial.partial = true;
                partial.first_partial = i == 0;
                partial.last_partial = i + 1 == count;
                Arc::new(partial)
            })
            .collect();
        self
    }

    pub fn all_partial_segments(mut self, all: bool) -> Self {
        self.reference.all_partial_segments = all;
        self
    }

    pub fn independent(mut self, independent: bool) -> Self {
        self.reference.independent = independent;
        self
    }

    pub fn aes_key(mut self, aes_key: Option<AesKey>) -> Self {
        self.reference.aes_key = aes_key;
        self
    }

    pub fn codecs(mut self, codecs: Option<String>) -> Self {
        self.reference.codecs = codecs;
        self
    }

    pub fn mime_type(mut self, mime_type: Option<String>) -> Self {
        self.reference.mime_type = mime_type;
        self
    }

    pub fn bandwidth(mut self, bandwidth: Option<u64>) -> Self {
        self.reference.bandwidth = bandwidth;
        self
    }

    pub fn status(mut self, status: SegmentStatus) -> Self {
        self.reference.status = status;
        self
    }

    /// Un-clamped end time; defaults to the end time.
    pub fn true_end_time(mut self, true_end_time: f64) -> Self {
        self.true_end_time = Some(true_end_time);
        self
    }

    pub fn build(mut self) -> SegmentReference {
        debug_assert!(
            self.reference.start_time <= self.reference.end_time,
            "segment start {} after end {}",
            self.reference.start_time,
            self.reference.end_time
        );
        if let Some(true_end) = self.true_end_time {
            self.reference.true_end_time = true_end;
        }
        self.reference
    }
}

/// Inputs shared by the binary index extractors.
#[derive(Debug, Clone)]
pub struct ExtractContext {
    /// Candidate URIs of the media resource the index describes.
    pub uris: Arc<dyn UriProvider>,
    pub init_segment: Option<Arc<InitSegmentReference>>,
    /// Added to every container time to get presentation time.
    pub timestamp_offset: f64,
    pub append_window_start: f64,
    pub append_window_end: f64,
}

impl ExtractContext {
    pub fn new(uris: Arc<dyn UriProvider>) -> Self {
        Self {
            uris,
            init_segment: None,
            timestamp_offset: 0.0,
            append_window_start: 0.0,
            append_window_end: f64::INFINITY,
        }
    }

    pub(crate) fn reference(&self, start: f64, end: f64) -> SegmentReferenceBuilder {
        SegmentReference::builder(start, end, Arc::clone(&self.uris))
            .init_segment(self.init_segment.clone())
            .timestamp_offset(self.timestamp_offset)
            .append_window(self.append_window_start, self.append_window_end)
    }
}
