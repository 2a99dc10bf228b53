//! Segment index inspection for local files.
//!
//! Each command builds a real [`SegmentIndex`] or [`PresentationTimeline`]
//! from local inputs and summarises it as a serializable report.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use segline_media::{
    mp4, webm, CodecCache, ExtractContext, IndexConfig, ManualClock, PresentationTimeline,
    RepresentationContext, SegmentAddressing, SegmentIndex, SegmentTemplateFields, StaticUris,
    TimelineConfig, TimelineEntry, TimelineKind,
};

use crate::config::Config;

/// One reference of an inspected index.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentRow {
    pub position: u64,
    pub start: f64,
    pub end: f64,
    pub start_byte: u64,
    pub end_byte: Option<u64>,
    pub uris: Vec<String>,
    pub partials: usize,
}

/// Summary of a segment index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub source: String,
    pub num_references: usize,
    pub first_start: Option<f64>,
    pub last_end: Option<f64>,
    /// Codec families of the representation, when it declares codecs.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub codec_families: Vec<String>,
    pub references: Vec<SegmentRow>,
}

impl IndexReport {
    fn from_index(source: impl Into<String>, index: &SegmentIndex) -> Self {
        let first = index.num_evicted();
        let references: Vec<SegmentRow> = index
            .references()
            .iter()
            .zip(first..)
            .map(|(reference, position)| SegmentRow {
                position,
                start: reference.start_time(),
                end: reference.end_time(),
                start_byte: reference.start_byte(),
                end_byte: reference.end_byte(),
                uris: reference.uris(),
                partials: reference.partial_references().len(),
            })
            .collect();

        Self {
            source: source.into(),
            num_references: references.len(),
            first_start: references.first().map(|row| row.start),
            last_end: references.last().map(|row| row.end),
            codec_families: Vec::new(),
            references,
        }
    }

    /// Sum of segment durations.
    pub fn total_duration(&self) -> f64 {
        self.references.iter().map(|row| row.end - row.start).sum()
    }
}

/// Normalise a comma-separated codecs attribute, dropping repeated families.
pub fn codec_families(codecs: &str, cache: &mut CodecCache) -> Vec<String> {
    let mut families: Vec<String> = Vec::new();
    for codec in codecs.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        let family = cache.normalize(codec);
        if !families.contains(&family) {
            families.push(family);
        }
    }
    families
}

fn extract_context(media_uri: &str, timestamp_offset: f64) -> ExtractContext {
    let mut ctx = ExtractContext::new(StaticUris::shared(vec![media_uri.to_string()]));
    ctx.timestamp_offset = timestamp_offset;
    ctx
}

/// Read a SIDX box from `data`, which starts `index_offset` bytes into
/// the media resource.
pub fn inspect_sidx(
    data: &[u8],
    index_offset: u64,
    media_uri: &str,
    timestamp_offset: f64,
) -> Result<IndexReport> {
    let references = mp4::parse_sidx(index_offset, data, &extract_context(media_uri, timestamp_offset))
        .context("Failed to parse SIDX box")?;
    tracing::debug!("Parsed {} references from SIDX", references.len());
    Ok(IndexReport::from_index("sidx", &SegmentIndex::new(references)))
}

/// Read WebM Cues using the header values of `init`.
pub fn inspect_cues(cues: &[u8], init: &[u8], media_uri: &str) -> Result<IndexReport> {
    let info = webm::parse_webm_info(init).context("Failed to parse WebM init segment")?;
    tracing::debug!(
        "WebM segment offset {}, timecode scale {}s, duration {}s",
        info.segment_offset,
        info.timecode_scale,
        info.duration
    );
    let references = webm::parse_cues_with_info(cues, &info, &extract_context(media_uri, 0.0))
        .context("Failed to parse WebM Cues")?;
    Ok(IndexReport::from_index("cues", &SegmentIndex::new(references)))
}

/// A representation described in TOML for the `timeline` command.
#[derive(Debug, Clone, Deserialize)]
pub struct RepresentationFile {
    pub id: String,
    #[serde(default)]
    pub base_uris: Vec<String>,
    #[serde(default)]
    pub bandwidth: Option<u64>,
    #[serde(default)]
    pub codecs: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub period_start: f64,
    /// Unbounded when absent
    #[serde(default)]
    pub period_duration: Option<f64>,
    pub template: TemplateSection,
}

/// `SegmentTemplate` attributes of a [`RepresentationFile`].
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateSection {
    #[serde(default)]
    pub media: Option<String>,
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub initialization: Option<String>,
    #[serde(default = "default_timescale")]
    pub timescale: u32,
    #[serde(default)]
    pub presentation_time_offset: u64,
    #[serde(default = "default_start_number")]
    pub start_number: u64,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub timeline: Option<Vec<TimelineEntry>>,
}

fn default_timescale() -> u32 {
    1
}

fn default_start_number() -> u64 {
    1
}

impl RepresentationFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read representation file: {:?}", path))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse representation file: {:?}", path))
    }

    fn context(&self) -> RepresentationContext {
        let mut ctx = RepresentationContext::new(self.id.clone(), self.base_uris.clone());
        ctx.bandwidth = self.bandwidth;
        ctx.codecs = self.codecs.clone();
        ctx.mime_type = self.mime_type.clone();
        ctx.period_start = self.period_start;
        ctx.period_duration = self.period_duration.unwrap_or(f64::INFINITY);
        ctx
    }

    fn fields(&self) -> SegmentTemplateFields {
        let template = &self.template;
        SegmentTemplateFields {
            media: template.media.clone(),
            index: template.index.clone(),
            initialization: template.initialization.clone(),
            timescale: template.timescale,
            presentation_time_offset: template.presentation_time_offset,
            start_number: template.start_number,
            duration: template.duration,
            timeline: template.timeline.clone(),
            ..SegmentTemplateFields::default()
        }
    }
}

/// Build the static segment index of a templated representation.
pub fn inspect_template(representation: &RepresentationFile, config: &Config) -> Result<IndexReport> {
    let ctx = representation.context();
    let index_config = IndexConfig::from(&config.index);
    let addressing = representation
        .fields()
        .resolve(&ctx, &index_config)
        .with_context(|| format!("Representation {} has no usable segment template", ctx.id))?;

    if let SegmentAddressing::IndexRange(indexed) = &addressing {
        anyhow::bail!(
            "Representation {} uses an index template ({}); inspect the index with the sidx or cues command",
            ctx.id,
            indexed.index_uris.join(", ")
        );
    }

    let mut timeline = PresentationTimeline::from_config(None, &TimelineConfig::from(&config.timeline));
    if ctx.period_duration.is_finite() {
        timeline.set_duration(ctx.period_start + ctx.period_duration);
    }
    let timeline = timeline.shared();

    let index = addressing.build_segment_index(&ctx, &timeline, &index_config)?;
    let index = index.lock();
    let mut report = IndexReport::from_index(format!("template:{}", ctx.id), &index);
    if let Some(codecs) = &ctx.codecs {
        report.codec_families = codec_families(codecs, &mut CodecCache::default());
    }
    Ok(report)
}

/// Inputs of the `window` command.
#[derive(Debug, Clone)]
pub struct WindowParams {
    /// Wall-clock time (seconds since the Unix epoch) of presentation time 0
    pub presentation_start_time: f64,
    /// Evaluate at this wall-clock time instead of now
    pub now: Option<f64>,
    /// Seconds kept behind the live edge; unbounded when absent
    pub availability_duration: Option<f64>,
    /// Presentation duration for in-progress content
    pub duration: Option<f64>,
    pub max_segment_duration: f64,
}

/// Availability window of a dynamic presentation.
#[derive(Debug, Clone, Serialize)]
pub struct WindowReport {
    pub kind: TimelineKind,
    pub presentation_start_time: Option<f64>,
    pub live_edge: f64,
    pub availability_start: f64,
    pub availability_end: f64,
    pub seek_range_start: f64,
    pub seek_range_end: f64,
}

pub fn inspect_window(params: &WindowParams, config: &Config) -> WindowReport {
    let mut timeline = PresentationTimeline::from_config(
        Some(params.presentation_start_time),
        &TimelineConfig::from(&config.timeline),
    );
    if let Some(now) = params.now {
        timeline = timeline.with_clock(Arc::new(ManualClock::new(now * 1000.0)));
    }
    timeline.set_static(false);
    if let Some(duration) = params.duration {
        timeline.set_duration(duration);
    }
    if let Some(availability) = params.availability_duration {
        timeline.set_segment_availability_duration(availability);
    }
    timeline.notify_max_segment_duration(params.max_segment_duration);
    timeline.lock_start_time();
    timeline.assert_is_valid();

    WindowReport {
        kind: timeline.kind(),
        presentation_start_time: timeline.presentation_start_time(),
        live_edge: timeline.live_edge(),
        availability_start: timeline.segment_availability_start(),
        availability_end: timeline.segment_availability_end(),
        seek_range_start: timeline.seek_range_start(),
        seek_range_end: timeline.seek_range_end(),
    }
}
