use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "segline")]
#[command(author, version, about = "Segment index and availability window inspector")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the segments described by an MP4 SIDX box
    Sidx {
        /// File holding the SIDX box
        #[arg(required = true)]
        file: PathBuf,

        /// Byte offset of the box within the media resource
        #[arg(long, default_value = "0")]
        index_offset: u64,

        /// Seconds added to every container timestamp
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        timestamp_offset: f64,

        /// Media URI recorded on each reference (overrides config)
        #[arg(long)]
        media_uri: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the segments described by WebM Cues
    Cues {
        /// File holding the Cues element
        #[arg(required = true)]
        cues: PathBuf,

        /// Init segment holding the EBML header and Segment Info
        #[arg(required = true)]
        init: PathBuf,

        /// Media URI recorded on each reference (overrides config)
        #[arg(long)]
        media_uri: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Expand a segment template described in TOML
    Timeline {
        /// Representation description
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compute the availability window of a live presentation
    Window {
        /// Presentation start time, seconds since the Unix epoch
        #[arg(long)]
        start_time: f64,

        /// Evaluate at this time (seconds since the Unix epoch) instead of now
        #[arg(long)]
        now: Option<f64>,

        /// Time-shift buffer depth in seconds
        #[arg(long)]
        availability: Option<f64>,

        /// Longest segment duration in seconds
        #[arg(long, default_value = "1")]
        segment_duration: f64,

        /// Presentation duration for content that is still being produced
        #[arg(long)]
        duration: Option<f64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
