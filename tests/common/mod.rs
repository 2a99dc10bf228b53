//! Shared fixtures for CLI integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;

/// Get a command for the segline binary
#[allow(deprecated)]
pub fn segline_cmd() -> Command {
    Command::cargo_bin("segline").unwrap()
}

/// Write `contents` to `name` inside `dir`.
pub fn write_file(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Encode a version 0 `sidx` box. `entries` are
/// `(referenced_size, subsegment_duration)`.
pub fn sidx_box(timescale: u32, entries: &[(u32, u32)]) -> Vec<u8> {
    let mut payload = vec![0, 0, 0, 0];
    payload.extend_from_slice(&1u32.to_be_bytes());
    payload.extend_from_slice(&timescale.to_be_bytes());
    payload.extend_from_slice(&0u32.to_be_bytes());
    payload.extend_from_slice(&0u32.to_be_bytes());
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

fn ebml_element(id: u32, payload: &[u8]) -> Vec<u8> {
    let id_bytes = id.to_be_bytes();
    let skip = id_bytes.iter().take_while(|b| **b == 0).count();
    let mut out = id_bytes[skip..].to_vec();
    out.push(0x80 | payload.len() as u8);
    out.extend_from_slice(payload);
    out
}

fn ebml_uint(id: u32, value: u64) -> Vec<u8> {
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
