//! Shared fixtures for segline-media integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use segline_media::{SegmentReference, StaticUris};

/// A plain reference with a single URI named after its start.
pub fn reference(start: f64, end: f64) -> Arc<SegmentReference> {
    Arc::new(
        SegmentReference::builder(start, end, StaticUris::shared(vec![format!("seg-{start}.m4s")]))
            .build(),
    )
}

pub fn references(bounds: &[(f64, f64)]) -> Vec<Arc<SegmentReference>> {
    bounds.iter().map(|(start, end)| reference(*start, *end)).collect()
}

/// Contiguous references of equal duration starting at `start`.
pub fn contiguous(start: f64, duration: f64, count: usize) -> Vec<Arc<SegmentReference>> {
    (0..count)
        .map(|i| {
            let s = start + duration * i as f64;
            reference(s, s + duration)
        })
        .collect()
}

/// Encode a `sidx` box. `entries` are `(referenced_size, subsegment_duration)`.
pub fn sidx_box(version: u8, timescale: u32, earliest: u64, first_offset: u64, entries: &[(u32, u32)]) -> Vec<u8> {
    let mut payload = vec![version, 0, 0, 0];
    payload.extend_from_slice(&1u32.to_be_bytes());
    payload.extend_from_slice(&timescale.to_be_bytes());
    if version == 0 {
        payload.extend_from_slice(&(earliest as u32).to_be_bytes());
        payload.extend_from_slice(&(first_offset as u32).to_be_bytes());
    } else {
        payload.extend_from_slice(&earliest.to_be_bytes());
        payload.extend_from_slice(&first_offset.to_be_bytes());
    }
    payload.extend_from_slice(&[0, 0]);
    payload.extend_from_slice(&(entries.len() as u16).to_be_bytes());
    for (size, duration) in entries {
        payload.extend_from_slice(&size.to_be_bytes());
        payload.extend_from_slice(&duration.to_be_bytes());
        payload.extend_from_slice(&0x9000_0000u32.to_be_bytes());
    }

    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(b"sidx");
    out.extend(payload);
    out
}

/// Encode an EBML element with a one-byte (or 8-byte for large payloads) size.
pub fn ebml_element(id: u32, payload: &[u8]) -> Vec<u8> {
    let id_bytes = id.to_be_bytes();
    let skip = id_bytes.iter().take_while(|b| **b == 0).count();
    let mut out = id_bytes[skip..].to_vec();
    if payload.len() < 0x7F {
        out.push(0x80 | payload.len() as u8);
    } else {
        out.push(0x01);
        out.extend_from_slice(&(payload.len() as u64).to_be_bytes()[1..]);
    }
    out.extend_from_slice(payload);
    out
}

pub fn ebml_uint(id: u32, value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count().min(7);
    ebml_element(id, &bytes[skip..])
}

/// WebM init segment with a millisecond timecode scale.
pub fn webm_init(duration_ms: f64) -> Vec<u8> {
    let mut info = ebml_uint(0x2A_D7B1, 1_000_000);
    info.extend(ebml_element(0x4489, &duration_ms.to_be_bytes()));
    let segment = ebml_element(0x1549_A966, &info);

    let mut out = ebml_element(0x1A45_DFA3, &ebml_uint(0x4286, 1));
    out.extend(ebml_element(0x1853_8067, &segment));
    out
}

/// WebM Cues element from `(cue_time_ms, cluster_position)` pairs.
pub fn webm_cues(points: &[(u64, u64)]) -> Vec<u8> {
    let mut payload = Vec::new();
    for (time, position) in points {
        let mut track = ebml_uint(0xF7, 1);
        track.extend(ebml_uint(0xF1, *position));
        let mut point = ebml_uint(0xB3, *time);
        point.extend(ebml_element(0xB7, &track));
        payload.extend(ebml_element(0xBB, &point));
    }
    ebml_element(0x1C53_BB6B, &payload)
}
