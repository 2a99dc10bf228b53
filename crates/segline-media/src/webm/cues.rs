//! WebM Cues extraction.

use std::sync::Arc;

use tracing::{debug, error};

use super::ebml::{EbmlElement, EbmlParser};
use crate::reference::{ExtractContext, SegmentReference};
use crate::{Error, Result};

const EBML_ID: u32 = 0x1A45_DFA3;
const SEGMENT_ID: u32 = 0x1853_8067;
const INFO_ID: u32 = 0x1549_A966;
const TIMECODE_SCALE_ID: u32 = 0x2A_D7B1;
const DURATION_ID: u32 = 0x4489;
const CUES_ID: u32 = 0x1C53_BB6B;
const CUE_POINT_ID: u32 = 0xBB;
const CUE_TIME_ID: u32 = 0xB3;
const CUE_TRACK_POSITIONS_ID: u32 = 0xB7;
const CUE_CLUSTER_POSITION_ID: u32 = 0xF1;

/// Nanoseconds per timecode unit when the Info element omits TimecodeScale.
const DEFAULT_TIMECODE_SCALE_NS: u64 = 1_000_000;

/// Container-level values recovered from the WebM header.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct WebmInfo {
    /// Byte offset of the Segment payload; cluster positions are relative to it.
    pub segment_offset: u64,
    /// Seconds per timecode unit.
    pub timecode_scale: f64,
    /// Segment duration in seconds.
    pub duration: f64,
}

/// Read the EBML header, Segment and Info elements from the init data.
pub fn parse_webm_info(init_data: &[u8]) -> Result<WebmInfo> {
    let mut parser = EbmlParser::new(init_data);

    let ebml = parser.parse_element()?;
    if ebml.id != EBML_ID {
        error!("Not an EBML element, id {:#x}", ebml.id);
        return Err(Error::EbmlHeaderElementMissing);
    }

    let segment = parser.parse_element()?;
    if segment.id != SEGMENT_ID {
        error!("Not a Segment element, id {:#x}", segment.id);
        return Err(Error::SegmentElementMissing);
    }

    let segment_offset = segment.offset();
    let info = find_child(&segment, INFO_ID)?.ok_or_else(|| {
        error!("Segment element has no Info element");
        Error::InfoElementMissing
    })?;

    let mut timecode_scale_ns = DEFAULT_TIMECODE_SCALE_NS;
    let mut duration_scaled = None;
    let mut children = info.children();
    while children.has_more_data() {
        let elem = children.parse_element()?;
        match elem.id {
            TIMECODE_SCALE_ID => timecode_scale_ns = elem.as_uint()?,
            DURATION_ID => duration_scaled = Some(elem.as_float()?),
            _ => {}
        }
    }

    let duration_scaled = duration_scaled.ok_or_else(|| {
        error!("Info element has no Duration element");
        Error::DurationElementMissing
    })?;

    let timecode_scale = timecode_scale_ns as f64 / 1_000_000_000.0;
    Ok(WebmInfo {
        segment_offset,
        timecode_scale,
        duration: duration_scaled * timecode_scale,
    })
}

/// Parse a Cues element into segment references.
///
/// `init_data` supplies the timecode scale, duration and segment offset.
pub fn parse_cues(
    cues_data: &[u8],
    init_data: &[u8],
    ctx: &ExtractContext,
) -> Result<Vec<Arc<SegmentReference>>> {
    let info = parse_webm_info(init_data)?;
    parse_cues_with_info(cues_data, &info, ctx)
}

/// Parse a Cues element against already-known header values.
pub fn parse_cues_with_info(
    cues_data: &[u8],
    info: &WebmInfo,
    ctx: &ExtractContext,
) -> Result<Vec<Arc<SegmentReference>>> {
    let cues = EbmlParser::new(cues_data).parse_element()?;
    if cues.id != CUES_ID {
        error!("Not a Cues element, id {:#x}", cues.id);
        return Err(Error::CuesElementMissing);
    }

    let mut references = Vec::new();
    let mut last: Option<(f64, u64)> = None;
    let mut parser = cues.children();

    while parser.has_more_data() {
        let elem = parser.parse_element()?;
        if elem.id != CUE_POINT_ID {
            continue;
        }

        let (unscaled_time, relative_offset) = parse_cue_point(&elem)?;
        let time = info.timecode_scale * unscaled_time as f64;
        let offset = info.segment_offset.checked_add(relative_offset).ok_or_else(|| {
            error!(
                "CueClusterPosition {} overflows segment offset {}",
                relative_offset, info.segment_offset
            );
            Error::overflow("CueClusterPosition")
        })?;

        if let Some((last_time, last_offset)) = last {
            references.push(Arc::new(
                ctx.reference(last_time + ctx.timestamp_offset, time + ctx.timestamp_offset)
                    .byte_range(last_offset, Some(offset.saturating_sub(1)))
                    .build(),
            ));
        }
        last = Some((time, offset));
    }

    if let Some((last_time, last_offset)) = last {
        references.push(Arc::new(
            ctx.reference(
                last_time + ctx.timestamp_offset,
                info.duration + ctx.timestamp_offset,
            )
            .byte_range(last_offset, None)
            .build(),
        ));
    }

    debug!(
        references = references.len(),
        "Parsed WebM cues, segment offset {}",
        info.segment_offset
    );

    Ok(references)
}

/// Returns `(cue_time, cluster_position)`.
fn parse_cue_point(cue_point: &EbmlElement<'_>) -> Result<(u64, u64)> {
    let mut parser = cue_point.children();

    if !parser.has_more_data() {
        return Err(Error::CueTimeElementMissing);
    }
    let time = parser.parse_element()?;
    if time.id != CUE_TIME_ID {
        error!("CuePoint does not start with CueTime");
        return Err(Error::CueTimeElementMissing);
    }
    let unscaled_time = time.as_uint()?;

    if !parser.has_more_data() {
        return Err(Error::CueTrackPositionsElementMissing);
    }
    let positions = parser.parse_element()?;
    if positions.id != CUE_TRACK_POSITIONS_ID {
        error!("CueTime is not followed by CueTrackPositions");
        return Err(Error::CueTrackPositionsElementMissing);
    }

    let cluster = find_child(&positions, CUE_CLUSTER_POSITION_ID)?;
    let relative_offset = match cluster {
        Some(elem) => elem.as_uint()?,
        None => 0,
    };

    Ok((unscaled_time, relative_offset))
}

fn find_child<'a>(parent: &EbmlElement<'a>, id: u32) -> Result<Option<EbmlElement<'a>>> {
    let mut parser = parent.children();
    while parser.has_more_data() {
        let elem = parser.parse_element()?;
        if elem.id == id {
            return Ok(Some(elem));
        }
    }
    Ok(None)
}
