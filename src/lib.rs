//! Segline - Segment index inspection tool
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod inspect;
