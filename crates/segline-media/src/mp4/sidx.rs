//! Segment index (`sidx`) extraction.

use std::sync::Arc;

use tracing::{debug, error};

use super::reader::ParsedBox;
use super::{AtomType, BoxReader};
use crate::reference::{ExtractContext, SegmentReference};
use crate::{Error, Result};

/// Parse the single `sidx` box in `data` into segment references.
///
/// `sidx_offset` is the absolute byte offset of `data` within the media
/// resource; the first referenced subsegment starts right after the box,
/// plus the box's declared first offset.
pub fn parse_sidx(
    sidx_offset: u64,
    data: &[u8],
    ctx: &ExtractContext,
) -> Result<Vec<Arc<SegmentReference>>> {
    let mut references = None;

    BoxReader::new()
        .on_full_box(AtomType::SIDX, |parsed| {
            references = Some(read_sidx(sidx_offset, parsed, ctx)?);
            parsed.stop();
            Ok(())
        })
        .parse(data)?;

    references.ok_or(Error::SidxWrongBoxType)
}

fn read_sidx(
    sidx_offset: u64,
    parsed: &mut ParsedBox<'_>,
    ctx: &ExtractContext,
) -> Result<Vec<Arc<SegmentReference>>> {
    let header = parsed.header;
    let reader = &mut parsed.reader;

    // reference_ID
    reader.skip(4)?;

    let timescale = reader.read_u32()?;
    if timescale == 0 {
        error!("Invalid timescale 0 in sidx box");
        return Err(Error::SidxInvalidTimescale);
    }

    let (earliest_presentation_time, first_offset) = if header.version == Some(0) {
        (reader.read_u32()? as u64, reader.read_u32()? as u64)
    } else {
        (reader.read_u64()?, reader.read_u64()?)
    };

    // reserved
    reader.skip(2)?;
    let reference_count = reader.read_u16()?;

    let timescale = timescale as f64;
    let mut unscaled_start = earliest_presentation_time;
    let box_offset = sidx_offset
        .checked_add(header.start)
        .ok_or_else(|| Error::overflow("sidx offset"))?;
    let mut start_byte = box_offset
        .checked_add(header.size)
        .and_then(|end| end.checked_add(first_offset))
        .ok_or_else(|| {
            error!("sidx first_offset {} overflows the byte range", first_offset);
            Error::overflow("first_offset")
        })?;
    let mut references = Vec::with_capacity(reference_count as usize);

    for _ in 0..reference_count {
        let chunk = reader.read_u32()?;
        if chunk >> 31 == 1 {
            error!("Hierarchical sidx boxes are not supported");
            return Err(Error::SidxTypeNotSupported);
        }
        let referenced_size = (chunk & 0x7FFF_FFFF) as u64;
        let subsegment_duration = reader.read_u32()? as u64;

        // starts_with_SAP, SAP_type, SAP_delta_time
        reader.skip(4)?;

        let unscaled_end = unscaled_start
            .checked_add(subsegment_duration)
            .ok_or_else(|| Error::overflow("subsegment_duration"))?;
        let next_byte = start_byte
            .checked_add(referenced_size)
            .ok_or_else(|| Error::overflow("referenced_size"))?;
        let start = unscaled_start as f64 / timescale + ctx.timestamp_offset;
        let end = unscaled_end as f64 / timescale + ctx.timestamp_offset;
        let end_byte = next_byte.saturating_sub(1);

        references.push(Arc::new(
            ctx.reference(start, end)
                .byte_range(start_byte, Some(end_byte))
                .build(),
        ));

        unscaled_start = unscaled_end;
        start_byte = next_byte;
    }

    debug!(
        references = references.len(),
        timescale = timescale,
        "Parsed sidx box at offset {}",
        box_offset
    );

    Ok(references)
}
