//! Timeline-backed reference storage.
//!
//! Holds [`TimeRange`]s instead of references and materializes a reference
//! the first time its position is requested. Eviction drops ranges together
//! with their cached references.

use std::collections::VecDeque;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::reference::{AesKey, InitSegmentReference, SegmentReference, SegmentReferenceBuilder};
use crate::template::TemplateUris;
use crate::timeline::TimeRange;
use crate::uri::{StaticUris, UriProvider};

/// Everything needed to turn a [`TimeRange`] into a [`SegmentReference`].
#[derive(Debug, Clone)]
pub struct TimelineTemplate {
    /// Expanded timeline, relative to the period start.
    pub timeline: Vec<TimeRange>,
    /// Media URL template, e.g. `$RepresentationID$/$Time$.m4s`.
    pub media_template: Arc<str>,
    pub representation_id: Arc<str>,
    pub bandwidth: Option<u64>,
    pub base_uris: Arc<[String]>,
    pub timescale: u32,
    pub unscaled_presentation_time_offset: u64,
    pub init_segment: Option<Arc<InitSegmentReference>>,
    pub codecs: Option<String>,
    pub mime_type: Option<String>,
    pub aes_key: Option<AesKey>,
    /// Every n-th partial segment is independent; 0 means only the first.
    pub segment_sequence_cadence: u32,
}

impl TimelineTemplate {
    pub fn new(
        timeline: Vec<TimeRange>,
        media_template: impl Into<Arc<str>>,
        representation_id: impl Into<Arc<str>>,
        base_uris: Vec<String>,
        timescale: u32,
    ) -> Self {
        Self {
            timeline,
            media_template: media_template.into(),
            representation_id: representation_id.into(),
            bandwidth: None,
            base_uris: base_uris.into(),
            timescale,
            unscaled_presentation_time_offset: 0,
            init_segment: None,
            codecs: None,
            mime_type: None,
            aes_key: None,
            segment_sequence_cadence: 0,
        }
    }

    /// Presentation time offset in seconds.
    pub fn scaled_presentation_time_offset(&self) -> f64 {
        if self.timescale == 0 {
            0.0
        } else {
            self.unscaled_presentation_time_offset as f64 / self.timescale as f64
        }
    }

    fn uris(&self, number: u64, time: f64, sub_number: u64) -> Arc<dyn UriProvider> {
        Arc::new(
            TemplateUris::new(
                Arc::clone(&self.media_template),
                Arc::clone(&self.representation_id),
                Arc::clone(&self.base_uris),
            )
            .number(number)
            .sub_number(sub_number)
            .bandwidth(self.bandwidth)
            .time(time),
        )
    }

    fn reference(
        &self,
        start: f64,
        end: f64,
        uris: Arc<dyn UriProvider>,
        timestamp_offset: f64,
        period: (f64, f64),
    ) -> SegmentReferenceBuilder {
        SegmentReference::builder(start, end, uris)
            .init_segment(self.init_segment.clone())
            .timestamp_offset(timestamp_offset)
            .append_window(period.0, period.1)
            .aes_key(self.aes_key.clone())
            .codecs(self.codecs.clone())
            .mime_type(self.mime_type.clone())
            .bandwidth(self.bandwidth)
    }
}

/// Range list plus lazily materialized references.
#[derive(Debug)]
pub(crate) struct TimelineStore {
    /// `None` once every range has been evicted.
    template: Option<TimelineTemplate>,
    ranges: VecDeque<TimeRange>,
    cache: VecDeque<OnceCell<Arc<SegmentReference>>>,
    period_start: f64,
    period_end: f64,
}

impl TimelineStore {
    pub(crate) fn new(mut template: TimelineTemplate, period_start: f64, period_end: f64) -> Self {
        let ranges: VecDeque<TimeRange> = std::mem::take(&mut template.timeline).into();
        let cache = ranges.iter().map(|_| OnceCell::new()).collect();
        Self {
            template: Some(template),
            ranges,
            cache,
            period_start,
            period_end,
        }
    }

    pub(crate) fn len(&self) -> usize {
        if self.template.is_some() {
            self.ranges.len()
        } else {
            0
        }
    }

    pub(crate) fn is_released(&self) -> bool {
        self.template.is_none()
    }

    pub(crate) fn period_start(&self) -> f64 {
        self.period_start
    }

    pub(crate) fn period_end(&self) -> f64 {
        self.period_end
    }

    pub(crate) fn template(&self) -> Option<&TimelineTemplate> {
        self.template.as_ref()
    }

    /// Storage offset of the range containing `time`.
    ///
    /// A non-last range ends where the next one starts. The last range ends
    /// at the period end when that is finite.
    pub(crate) fn find(&self, time: f64) -> Option<usize> {
        if self.template.is_none() || self.ranges.is_empty() || time >= self.period_end {
            return None;
        }

        let ps = self.period_start;
        if time < self.ranges[0].start + ps {
            return Some(0);
        }

        let last = self.ranges.len() - 1;
        for (i, range) in self.ranges.iter().enumerate() {
            let start = range.start + ps;
            let end = if i < last {
                self.ranges[i + 1].start + ps
            } else if self.period_end.is_infinite() {
                range.end + ps
            } else {
                self.period_end
            };
            if time >= start && time < end {
                return Some(i);
            }
        }
        None
    }

    pub(crate) fn get(&self, offset: usize) -> Option<Arc<SegmentReference>> {
        let slot = self.cache.get(offset)?;
        if let Some(reference) = slot.get() {
            return Some(Arc::clone(reference));
        }
        let reference = Arc::new(self.materialize(offset)?);
        Some(Arc::clone(slot.get_or_init(|| reference)))
    }

    fn materialize(&self, offset: usize) -> Option<SegmentReference> {
        let template = self.template.as_ref()?;
        let range = self.ranges.get(offset)?;
        let ps = self.period_start;
        let period = (ps, self.period_end);

        let time = template.unscaled_presentation_time_offset as f64 + range.unscaled_start as f64;
        let timestamp_offset = ps - template.scaled_presentation_time_offset();
        let true_end = ps + range.end;
        let end = if offset + 1 == self.ranges.len() && self.period_end.is_finite() {
            self.period_end
        } else {
            true_end
        };

        let partial_count = range.partial_segments as usize;
        let mut partials = Vec::with_capacity(partial_count);
        if partial_count > 0 {
            let partial_duration = (range.end - range.start) / partial_count as f64;
            let cadence = template.segment_sequence_cadence as usize;
            for i in 0..partial_count {
                let start = range.start + partial_duration * i as f64;
                let uris = template.uris(range.segment_position, time, i as u64 + 1);
                let independent = if cadence == 0 { i == 0 } else { i % cadence == 0 };
                partials.push(
                    template
                        .reference(ps + start, ps + start + partial_duration, uris, timestamp_offset, period)
                        .independent(independent)
                        .build(),
                );
            }
        }

        let uris = if partial_count > 0 {
            StaticUris::shared(Vec::new())
        } else {
            template.uris(range.segment_position, time, 0)
        };

        Some(
            template
                .reference(ps + range.start, end, uris, timestamp_offset, period)
                .partial_references(partials)
                .true_end_time(true_end)
                .build(),
        )
    }

    /// Drop leading ranges ending at or before `time`. Returns the count.
    pub(crate) fn evict(&mut self, time: f64) -> usize {
        if self.template.is_none() {
            return 0;
        }
        let ps = self.period_start;
        let count = self
            .ranges
            .iter()
            .take_while(|range| range.end + ps <= time)
            .count();

        if count > 0 {
            debug!(
                "Evicting {} timeline ranges ending before {}",
                count, time
            );
            self.ranges.drain(..count);
            self.cache.drain(..count);
            if self.ranges.is_empty() {
                self.release();
            }
        }
        count
    }

    /// Trim to `[window_start, window_end)`. Returns the number of leading
    /// ranges dropped.
    pub(crate) fn fit(&mut self, window_start: f64, window_end: f64) -> usize {
        if self.template.is_none() {
            return 0;
        }
        let ps = self.period_start;
        while let Some(last) = self.ranges.back() {
            if last.start + ps >= window_end {
                self.ranges.pop_back();
                self.cache.pop_back();
            } else {
                break;
            }
        }

        if window_end.is_finite() {
            self.period_end = window_end;
        }
        // The last reference is clamped to the period end on materialization.
        if let Some(slot) = self.cache.back_mut() {
            *slot = OnceCell::new();
        }

        let mut dropped = 0;
        while let Some(first) = self.ranges.front() {
            if first.end + ps <= window_start {
                self.ranges.pop_front();
                self.cache.pop_front();
                dropped += 1;
            } else {
                break;
            }
        }
        dropped
    }

    /// Append the ranges of `info` that start at or after the current end.
    ///
    /// A released store is re-seeded from `info` entirely.
    pub(crate) fn append(&mut self, mut info: TimelineTemplate, period_start: f64, period_end: f64) {
        let incoming = std::mem::take(&mut info.timeline);

        if self.template.is_none() {
            debug!("Re-seeding released timeline with {} ranges", incoming.len());
            self.ranges = incoming.into();
            self.cache = self.ranges.iter().map(|_| OnceCell::new()).collect();
            self.template = Some(info);
            self.period_start = period_start;
            self.period_end = period_end;
            return;
        }

        if let Some(template) = self.template.as_mut() {
            if template.media_template != info.media_template {
                template.media_template = info.media_template;
                self.cache.iter_mut().for_each(|slot| *slot = OnceCell::new());
            }
        }

        let new_ranges: Vec<TimeRange> = match self.ranges.back() {
            Some(last) => incoming
                .into_iter()
                .filter(|range| range.start >= last.end)
                .collect(),
            None => incoming,
        };

        if !new_ranges.is_empty() {
            debug!("Appending {} timeline ranges", new_ranges.len());
            if let Some(slot) = self.cache.back_mut() {
                *slot = OnceCell::new();
            }
            for range in new_ranges {
                self.ranges.push_back(range);
                self.cache.push_back(OnceCell::new());
            }
        }

        if self.period_end != period_end {
            self.period_end = period_end;
            if let Some(slot) = self.cache.back_mut() {
                *slot = OnceCell::new();
            }
        }
    }

    /// Point every future materialization at a new init segment.
    pub(crate) fn set_init_segment(&mut self, init: Option<Arc<InitSegmentReference>>) {
        if let Some(template) = self.template.as_mut() {
            template.init_segment = init;
            self.cache.iter_mut().for_each(|slot| *slot = OnceCell::new());
        }
    }

    /// Materialize every held range.
    pub(crate) fn materialize_all(&self) -> Vec<Arc<SegmentReference>> {
        (0..self.len()).filter_map(|i| self.get(i)).collect()
    }

    pub(crate) fn release(&mut self) {
        self.template = None;
        self.ranges.clear();
        self.cache.clear();
    }
}
