//! Segment addressing schemes.
//!
//! A representation addresses its media segments in exactly one way, decided
//! once when the manifest is read:
//!
//! - [`SegmentAddressing::IndexRange`]: a binary index (SIDX or WebM Cues)
//!   describes the segments of a single resource.
//! - [`SegmentAddressing::Timeline`]: a URL template driven by an explicit
//!   segment timeline.
//! - [`SegmentAddressing::Duration`]: a URL template driven by a fixed
//!   segment duration. Positions are computed from the availability window.
//! - [`SegmentAddressing::List`]: explicit media URLs.
//!
//! [`SegmentAddressing::build_segment_index`] turns any of them into a
//! [`SharedSegmentIndex`] registered with the presentation timeline.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::presentation::{PresentationTimeline, SharedPresentationTimeline};
use crate::reference::{ExtractContext, InitSegmentReference, SegmentReference};
use crate::segment_index::{update_every, SegmentIndex, SharedSegmentIndex, TimelineTemplate};
use crate::template::{fill_uri_template, TemplateUris, TemplateValues};
use crate::timeline::{expand_timeline, TimelineEntry, TimelineParams, GAP_OVERLAP_TOLERANCE_SECONDS};
use crate::uri::{resolve_uris, StaticUris};
use crate::{mp4, webm, Error, Result};

/// Index-building tunables.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct IndexConfig {
    /// Timeline gaps or overlaps (seconds) at least this large are logged.
    pub gap_tolerance: f64,
    /// Update interval (seconds) for duration templates that publish
    /// segments ahead of the live edge.
    pub low_latency_update_interval: f64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            gap_tolerance: GAP_OVERLAP_TOLERANCE_SECONDS,
            low_latency_update_interval: 0.1,
        }
    }
}

/// Manifest data shared by every addressing scheme of a representation.
#[derive(Debug, Clone)]
pub struct RepresentationContext {
    pub id: String,
    pub bandwidth: Option<u64>,
    pub base_uris: Vec<String>,
    pub codecs: Option<String>,
    pub mime_type: Option<String>,
    /// Period start in presentation seconds.
    pub period_start: f64,
    /// Period duration in seconds; `f64::INFINITY` when unbounded.
    pub period_duration: f64,
    /// Whether the manifest is dynamic (live).
    pub dynamic: bool,
}

impl RepresentationContext {
    pub fn new(id: impl Into<String>, base_uris: Vec<String>) -> Self {
        Self {
            id: id.into(),
            bandwidth: None,
            base_uris,
            codecs: None,
            mime_type: None,
            period_start: 0.0,
            period_duration: f64::INFINITY,
            dynamic: false,
        }
    }

    pub fn period_end(&self) -> f64 {
        self.period_start + self.period_duration
    }

    /// Fill the representation-level identifiers of `template` and resolve
    /// the result against the base URIs.
    fn resolve(&self, template: &str) -> Vec<String> {
        let values = TemplateValues {
            representation_id: Some(self.id.as_str()),
            bandwidth: self.bandwidth,
            ..TemplateValues::default()
        };
        resolve_uris(&self.base_uris, &[fill_uri_template(template, &values)])
    }

    fn no_segment_info(&self) -> Error {
        Error::NoSegmentInfo {
            representation_id: self.id.clone(),
        }
    }
}

/// Container format of an index-range resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ContainerFormat {
    Mp4,
    WebM,
}

impl ContainerFormat {
    /// WebM for `*/webm` MIME types, MP4 otherwise.
    pub fn from_mime_type(mime_type: Option<&str>) -> Self {
        match mime_type {
            Some(mime) if mime.to_ascii_lowercase().ends_with("/webm") => ContainerFormat::WebM,
            _ => ContainerFormat::Mp4,
        }
    }
}

/// Segments described by a binary index inside (or next to) the media.
///
/// Index bytes are fetched by the host: request `index_range` from
/// `index_uris`, then attach the result with [`with_index_data`].
///
/// [`with_index_data`]: IndexedMedia::with_index_data
#[derive(Debug, Clone)]
pub struct IndexedMedia {
    pub format: ContainerFormat,
    pub media_uris: Vec<String>,
    pub index_uris: Vec<String>,
    /// Inclusive byte range of the index data in its resource.
    pub index_range: (u64, Option<u64>),
    /// Presentation time offset in seconds.
    pub presentation_time_offset: f64,
    pub init_segment: Option<Arc<InitSegmentReference>>,
    index_data: Option<Bytes>,
    init_data: Option<Bytes>,
}

impl IndexedMedia {
    /// The index lives inside the media resource.
    pub fn new(format: ContainerFormat, media_uris: Vec<String>, index_range: (u64, Option<u64>)) -> Self {
        Self {
            format,
            index_uris: media_uris.clone(),
            media_uris,
            index_range,
            presentation_time_offset: 0.0,
            init_segment: None,
            index_data: None,
            init_data: None,
        }
    }

    pub fn with_index_data(mut self, data: Bytes) -> Self {
        self.index_data = Some(data);
        self
    }

    /// Init segment bytes, needed to read WebM Cues. Bytes attached to the
    /// init segment reference are used when this is not set.
    pub fn with_init_data(mut self, data: Bytes) -> Self {
        self.init_data = Some(data);
        self
    }

    pub fn is_loaded(&self) -> bool {
        self.index_data.is_some()
    }

    fn build(&self, ctx: &RepresentationContext) -> Result<SegmentIndex> {
        let not_loaded = || Error::IndexNotLoaded {
            representation_id: ctx.id.clone(),
        };
        let data = self.index_data.as_ref().ok_or_else(not_loaded)?;

        let mut extract = ExtractContext::new(StaticUris::shared(self.media_uris.clone()));
        extract.init_segment = self.init_segment.clone();
        extract.timestamp_offset = ctx.period_start - self.presentation_time_offset;
        extract.append_window_start = ctx.period_start;
        extract.append_window_end = ctx.period_end();

        let references = match self.format {
            ContainerFormat::Mp4 => mp4::parse_sidx(self.index_range.0, data, &extract)?,
            ContainerFormat::WebM => {
                let init = self
                    .init_data
                    .as_ref()
                    .or_else(|| self.init_segment.as_ref().and_then(|init| init.segment_data()))
                    .ok_or_else(not_loaded)?;
                webm::parse_cues(data, init, &extract)?
            }
        };

        let mut index = SegmentIndex::new(references);
        index.fit(ctx.period_start, ctx.period_end(), true);
        Ok(index)
    }
}

/// URL template with a fixed segment duration.
#[derive(Debug, Clone)]
pub struct DurationTemplate {
    pub media_template: Arc<str>,
    pub timescale: u32,
    /// Segment duration in timescale units.
    pub segment_duration: u64,
    pub start_number: u64,
    /// Unscaled presentation time offset.
    pub presentation_time_offset: u64,
    /// Seconds by which segments become available before their end.
    pub availability_time_offset: f64,
    pub init_segment: Option<Arc<InitSegmentReference>>,
}

impl DurationTemplate {
    fn segment_duration_seconds(&self) -> f64 {
        self.segment_duration as f64 / self.timescale as f64
    }
}

/// Generates the references of a [`DurationTemplate`] by relative position.
#[derive(Debug, Clone)]
struct DurationSegments {
    template: DurationTemplate,
    ctx: RepresentationContext,
    representation_id: Arc<str>,
    base_uris: Arc<[String]>,
}

impl DurationSegments {
    fn new(template: DurationTemplate, ctx: RepresentationContext) -> Self {
        Self {
            representation_id: ctx.id.as_str().into(),
            base_uris: ctx.base_uris.clone().into(),
            template,
            ctx,
        }
    }

    /// First and last relative positions inside the availability window.
    fn available_positions(&self, timeline: &PresentationTimeline) -> Option<(u64, u64)> {
        let duration = self.template.segment_duration_seconds();
        let period_start = self.ctx.period_start;
        let period_end = self.ctx.period_end();

        let start = timeline.segment_availability_start().clamp(period_start, period_end);
        let end = timeline.segment_availability_end().clamp(period_start, period_end);
        if !end.is_finite() {
            warn!(
                "Representation {} has an unbounded availability window; no segments generated",
                self.ctx.id
            );
            return None;
        }

        let first = ((start - period_start) / duration).ceil();
        let last = ((end - period_start) / duration).ceil() - 1.0;
        if last < first || last < 0.0 {
            return None;
        }
        Some((first as u64, last as u64))
    }

    fn reference(&self, position: u64) -> Arc<SegmentReference> {
        let template = &self.template;
        let duration = template.segment_duration_seconds();
        let period_start = self.ctx.period_start;
        let period_end = self.ctx.period_end();

        let start = period_start + position as f64 * duration;
        let true_end = start + duration;
        let time = (position * template.segment_duration + template.presentation_time_offset) as f64;
        let uris = TemplateUris::new(
            Arc::clone(&template.media_template),
            Arc::clone(&self.representation_id),
            Arc::clone(&self.base_uris),
        )
        .number(position + template.start_number)
        .bandwidth(self.ctx.bandwidth)
        .time(time);

        let timestamp_offset =
            period_start - template.presentation_time_offset as f64 / template.timescale as f64;
        Arc::new(
            SegmentReference::builder(start, true_end.min(period_end), Arc::new(uris))
                .true_end_time(true_end)
                .init_segment(template.init_segment.clone())
                .timestamp_offset(timestamp_offset)
                .append_window(period_start, period_end)
                .codecs(self.ctx.codecs.clone())
                .mime_type(self.ctx.mime_type.clone())
                .bandwidth(self.ctx.bandwidth)
                .build(),
        )
    }

    fn build(
        self,
        timeline: &SharedPresentationTimeline,
        config: &IndexConfig,
    ) -> SharedSegmentIndex {
        let duration = self.template.segment_duration_seconds();
        let period_end = self.ctx.period_end();

        let (range, fully_available) = {
            let mut timeline = timeline.lock();
            timeline.notify_max_segment_duration(duration);
            (
                self.available_positions(&timeline),
                timeline.segment_availability_end() >= period_end,
            )
        };

        let references = match range {
            Some((first, last)) => {
                // Live indexes hold only the two newest positions. Updates
                // append from there, so earlier positions are never built.
                let min = if self.ctx.dynamic {
                    first.max(last.saturating_sub(1))
                } else {
                    first
                };
                (min..=last).map(|position| self.reference(position)).collect()
            }
            None => Vec::new(),
        };
        let index = SegmentIndex::new(references).shared();

        if self.ctx.dynamic || !fully_available {
            let seconds = if self.template.availability_time_offset > 0.0 {
                config.low_latency_update_interval
            } else {
                duration
            };
            let interval = Duration::try_from_secs_f64(seconds).unwrap_or_else(|_| {
                warn!("Invalid update interval {}s; using one second", seconds);
                Duration::from_secs(1)
            });

            let timeline = Arc::clone(timeline);
            let mut next_position = range.map(|(_, last)| last + 1);
            update_every(&index, interval, move |index| {
                let (availability_start, range) = {
                    let timeline = timeline.lock();
                    (
                        timeline.segment_availability_start(),
                        self.available_positions(&timeline),
                    )
                };

                index.evict(availability_start);
                if availability_start > period_end && index.is_empty() {
                    debug!(
                        "Period of representation {} left the availability window",
                        self.ctx.id
                    );
                    return None;
                }

                let Some((first, last)) = range else {
                    return Some(Vec::new());
                };
                let from = next_position.map_or(first, |next| next.max(first));
                if from > last {
                    return Some(Vec::new());
                }
                next_position = Some(last + 1);
                Some((from..=last).map(|position| self.reference(position)).collect())
            });
        }

        index
    }
}

/// One entry of a segment list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentListEntry {
    pub media: String,
    pub media_range: Option<(u64, Option<u64>)>,
}

/// Explicit media URLs, timed by a fixed duration or a timeline.
#[derive(Debug, Clone)]
pub struct SegmentList {
    pub entries: Vec<SegmentListEntry>,
    pub timescale: u32,
    /// Segment duration in timescale units.
    pub segment_duration: Option<u64>,
    pub timeline: Option<Vec<TimelineEntry>>,
    /// Unscaled presentation time offset.
    pub presentation_time_offset: u64,
    pub init_segment: Option<Arc<InitSegmentReference>>,
}

impl SegmentList {
    pub fn new(entries: Vec<SegmentListEntry>, timescale: u32) -> Self {
        Self {
            entries,
            timescale,
            segment_duration: None,
            timeline: None,
            presentation_time_offset: 0,
            init_segment: None,
        }
    }

    /// Period-relative `(start, end)` of each entry.
    fn spans(&self, ctx: &RepresentationContext, config: &IndexConfig) -> Result<Vec<(f64, f64)>> {
        if let Some(entries) = &self.timeline {
            let params = TimelineParams::new(self.timescale)
                .presentation_time_offset(self.presentation_time_offset)
                .period_duration(ctx.period_duration)
                .gap_tolerance(config.gap_tolerance);
            let ranges = expand_timeline(entries, &params)?;
            if ranges.len() != self.entries.len() {
                warn!(
                    "Representation {} lists {} segments but its timeline has {}",
                    ctx.id,
                    self.entries.len(),
                    ranges.len()
                );
            }
            return Ok(ranges.into_iter().map(|range| (range.start, range.end)).collect());
        }

        if let Some(duration) = self.segment_duration.filter(|d| *d > 0 && self.timescale > 0) {
            let duration = duration as f64 / self.timescale as f64;
            return Ok((0..self.entries.len())
                .map(|i| (i as f64 * duration, (i + 1) as f64 * duration))
                .collect());
        }

        if self.entries.len() == 1 && ctx.period_duration.is_finite() {
            return Ok(vec![(0.0, ctx.period_duration)]);
        }

        warn!("Segment list of representation {} has no timing", ctx.id);
        Err(ctx.no_segment_info())
    }

    fn build(&self, ctx: &RepresentationContext, config: &IndexConfig) -> Result<SegmentIndex> {
        let spans = self.spans(ctx, config)?;
        let period_start = ctx.period_start;
        let timestamp_offset = if self.timeline.is_some() || self.timescale == 0 {
            period_start
        } else {
            period_start - self.presentation_time_offset as f64 / self.timescale as f64
        };

        let references = self
            .entries
            .iter()
            .zip(spans)
            .map(|(entry, (start, end))| {
                let uris = resolve_uris(&ctx.base_uris, std::slice::from_ref(&entry.media));
                let mut builder = SegmentReference::builder(
                    period_start + start,
                    period_start + end,
                    StaticUris::shared(uris),
                )
                .init_segment(self.init_segment.clone())
                .timestamp_offset(timestamp_offset)
                .append_window(period_start, ctx.period_end())
                .codecs(ctx.codecs.clone())
                .mime_type(ctx.mime_type.clone())
                .bandwidth(ctx.bandwidth);
                if let Some((start_byte, end_byte)) = entry.media_range {
                    builder = builder.byte_range(start_byte, end_byte);
                }
                Arc::new(builder.build())
            })
            .collect();

        let mut index = SegmentIndex::new(references);
        index.fit(period_start, ctx.period_end(), true);
        Ok(index)
    }
}

/// Raw `SegmentTemplate` fields of a representation.
#[derive(Debug, Clone)]
pub struct SegmentTemplateFields {
    pub media: Option<String>,
    pub index: Option<String>,
    pub initialization: Option<String>,
    pub timescale: u32,
    pub presentation_time_offset: u64,
    pub start_number: u64,
    /// Segment duration in timescale units.
    pub duration: Option<u64>,
    pub timeline: Option<Vec<TimelineEntry>>,
    pub availability_time_offset: f64,
}

impl Default for SegmentTemplateFields {
    fn default() -> Self {
        Self {
            media: None,
            index: None,
            initialization: None,
            timescale: 1,
            presentation_time_offset: 0,
            start_number: 1,
            duration: None,
            timeline: None,
            availability_time_offset: 0.0,
        }
    }
}

impl SegmentTemplateFields {
    /// Pick the addressing scheme: index template, then timeline, then fixed
    /// duration.
    pub fn resolve(&self, ctx: &RepresentationContext, config: &IndexConfig) -> Result<SegmentAddressing> {
        let present = [self.index.is_some(), self.timeline.is_some(), self.duration.is_some()]
            .into_iter()
            .filter(|present| *present)
            .count();
        if present > 1 {
            warn!(
                "Representation {} has more than one segment addressing scheme; using the first of index, timeline, duration",
                ctx.id
            );
        }

        let timescale = if self.timescale == 0 {
            warn!("Representation {} has a zero timescale; assuming 1", ctx.id);
            1
        } else {
            self.timescale
        };
        let init_segment = self.init_segment(ctx, timescale);

        if let Some(index) = &self.index {
            let media_uris = match &self.media {
                Some(media) => ctx.resolve(media),
                None => ctx.base_uris.clone(),
            };
            let mut indexed = IndexedMedia::new(
                ContainerFormat::from_mime_type(ctx.mime_type.as_deref()),
                media_uris,
                (0, None),
            );
            indexed.index_uris = ctx.resolve(index);
            indexed.presentation_time_offset = self.presentation_time_offset as f64 / timescale as f64;
            indexed.init_segment = init_segment;
            return Ok(SegmentAddressing::IndexRange(indexed));
        }

        let Some(media) = &self.media else {
            warn!("Representation {} has a segment template without a media template", ctx.id);
            return Err(ctx.no_segment_info());
        };

        if let Some(entries) = &self.timeline {
            let params = TimelineParams::new(timescale)
                .presentation_time_offset(self.presentation_time_offset)
                .period_duration(ctx.period_duration)
                .start_number(self.start_number)
                .gap_tolerance(config.gap_tolerance);
            let ranges = expand_timeline(entries, &params)?;

            let mut template =
                TimelineTemplate::new(ranges, media.as_str(), ctx.id.as_str(), ctx.base_uris.clone(), timescale);
            template.bandwidth = ctx.bandwidth;
            template.unscaled_presentation_time_offset = self.presentation_time_offset;
            template.init_segment = init_segment;
            template.codecs = ctx.codecs.clone();
            template.mime_type = ctx.mime_type.clone();
            return Ok(SegmentAddressing::Timeline(template));
        }

        if let Some(duration) = self.duration.filter(|d| *d > 0) {
            return Ok(SegmentAddressing::Duration(DurationTemplate {
                media_template: media.as_str().into(),
                timescale,
                segment_duration: duration,
                start_number: self.start_number,
                presentation_time_offset: self.presentation_time_offset,
                availability_time_offset: self.availability_time_offset,
                init_segment,
            }));
        }

        Err(ctx.no_segment_info())
    }

    fn init_segment(&self, ctx: &RepresentationContext, timescale: u32) -> Option<Arc<InitSegmentReference>> {
        let template = self.initialization.as_ref()?;
        let mut init = InitSegmentReference::new(StaticUris::shared(ctx.resolve(template)), 0, None)
            .with_timescale(timescale);
        if let Some(codecs) = &ctx.codecs {
            init = init.with_codecs(codecs.as_str());
        }
        if let Some(mime_type) = &ctx.mime_type {
            init = init.with_mime_type(mime_type.as_str());
        }
        Some(Arc::new(init))
    }
}

/// How a representation addresses its segments.
#[derive(Debug, Clone)]
pub enum SegmentAddressing {
    IndexRange(IndexedMedia),
    Timeline(TimelineTemplate),
    Duration(DurationTemplate),
    List(SegmentList),
}

impl SegmentAddressing {
    /// Build the segment index and register its segments with `timeline`.
    ///
    /// Duration templates of live or not yet fully available periods keep
    /// their index updated on the ambient tokio runtime.
    pub fn build_segment_index(
        &self,
        ctx: &RepresentationContext,
        timeline: &SharedPresentationTimeline,
        config: &IndexConfig,
    ) -> Result<SharedSegmentIndex> {
        let index = match self {
            SegmentAddressing::IndexRange(indexed) => {
                let index = indexed.build(ctx)?;
                timeline.lock().notify_segments(&index.references());
                index.shared()
            }
            SegmentAddressing::Timeline(template) => {
                timeline
                    .lock()
                    .notify_time_range(&template.timeline, ctx.period_start);
                SegmentIndex::from_timeline(
                    template.clone(),
                    ctx.period_start,
                    ctx.period_end(),
                    ctx.period_duration.is_finite(),
                )
                .shared()
            }
            SegmentAddressing::Duration(template) => {
                DurationSegments::new(template.clone(), ctx.clone()).build(timeline, config)
            }
            SegmentAddressing::List(list) => {
                let index = list.build(ctx, config)?;
                timeline.lock().notify_segments(&index.references());
                index.shared()
            }
        };

        debug!(
            "Built segment index for representation {} with {} references",
            ctx.id,
            index.lock().num_references()
        );
        Ok(index)
    }
}

/// Apply a refreshed timeline to an existing index.
///
/// New ranges are appended and segments that left the availability window
/// are evicted.
pub fn refresh_timeline_index(
    index: &SharedSegmentIndex,
    template: TimelineTemplate,
    ctx: &RepresentationContext,
    timeline: &SharedPresentationTimeline,
) {
    let availability_start = {
        let mut timeline = timeline.lock();
        timeline.notify_time_range(&template.timeline, ctx.period_start);
        timeline.segment_availability_start()
    };

    let mut index = index.lock();
    index.append_template_info(
        template,
        ctx.period_start,
        ctx.period_end(),
        ctx.period_duration.is_finite(),
        false,
    );
    index.evict(availability_start);
}
