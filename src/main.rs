mod cli;

use segline::config;
use segline::inspect::{self, IndexReport, RepresentationFile, WindowParams, WindowReport};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "segline=trace,segline_media=trace".to_string()
        } else {
            "segline=info,segline_media=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Sidx {
            file,
            index_offset,
            timestamp_offset,
            media_uri,
            json,
        } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let data = read_input(&file)?;
            let media_uri = media_uri.unwrap_or_else(|| config.inspect.media_uri.clone());
            let report = inspect::inspect_sidx(&data, index_offset, &media_uri, timestamp_offset)?;
            print_index(&report, json, config.inspect.max_rows)
        }
        Commands::Cues {
            cues,
            init,
            media_uri,
            json,
        } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let cues_data = read_input(&cues)?;
            let init_data = read_input(&init)?;
            let media_uri = media_uri.unwrap_or_else(|| config.inspect.media_uri.clone());
            let report = inspect::inspect_cues(&cues_data, &init_data, &media_uri)?;
            print_index(&report, json, config.inspect.max_rows)
        }
        Commands::Timeline { file, json } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let representation = RepresentationFile::load(&file)?;
            let report = inspect::inspect_template(&representation, &config)?;
            print_index(&report, json, config.inspect.max_rows)
        }
        Commands::Window {
            start_time,
            now,
            availability,
            segment_duration,
            duration,
            json,
        } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let params = WindowParams {
                presentation_start_time: start_time,
                now,
                availability_duration: availability,
                duration,
                max_segment_duration: segment_duration,
            };
            print_window(&inspect::inspect_window(&params, &config), json)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("segline {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn read_input(file: &Path) -> Result<Vec<u8>> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }
    std::fs::read(file).with_context(|| format!("Failed to read {:?}", file))
}

fn print_index(report: &IndexReport, json: bool, max_rows: usize) -> Result<()> {
    if json {
        let json_str = serde_json::to_string_pretty(report)?;
        println!("{}", json_str);
        return Ok(());
    }

    println!("Source: {}", report.source);
    println!("Segments: {}", report.num_references);
    if !report.codec_families.is_empty() {
        println!("Codecs: {}", report.codec_families.join(", "));
    }
    if let (Some(start), Some(end)) = (report.first_start, report.last_end) {
        println!("Range: {:.3}s - {:.3}s", start, end);
        println!("Total duration: {:.3}s", report.total_duration());
    }

    if !report.references.is_empty() {
        println!();
    }
    let max_rows = if max_rows == 0 { usize::MAX } else { max_rows };
    for row in report.references.iter().take(max_rows) {
        let bytes = match row.end_byte {
            Some(end) => format!("{}-{}", row.start_byte, end),
            None => format!("{}-", row.start_byte),
        };
        print!(
            "  [{}] {:>10.3}s {:>10.3}s  bytes {}",
            row.position, row.start, row.end, bytes
        );
        if let Some(uri) = row.uris.first() {
            print!("  {}", uri);
        }
        if row.partials > 0 {
            print!(" ({} partial)", row.partials);
        }
        println!();
    }
    if report.references.len() > max_rows {
        println!("  ... {} more", report.references.len() - max_rows);
    }

    Ok(())
}

fn print_window(report: &WindowReport, json: bool) -> Result<()> {
    if json {
        let json_str = serde_json::to_string_pretty(report)?;
        println!("{}", json_str);
        return Ok(());
    }

    println!("Kind: {:?}", report.kind);
    if let Some(pst) = report.presentation_start_time {
        let start = chrono::DateTime::from_timestamp_millis((pst * 1000.0) as i64)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| pst.to_string());
        println!("Presentation start: {}", start);
    }
    println!("Live edge: {:.3}s", report.live_edge);
    println!(
        "Availability: {:.3}s - {:.3}s",
        report.availability_start, report.availability_end
    );
    println!(
        "Seek range: {:.3}s - {:.3}s",
        report.seek_range_start, report.seek_range_end
    );

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_config(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            println!("Default config:");
            print_config(&config::Config::default());
        }
    }

    Ok(())
}

fn print_config(config: &config::Config) {
    println!("  Presentation delay: {}s", config.timeline.presentation_delay);
    println!("  Auto-correct drift: {}", config.timeline.auto_correct_drift);
    println!("  Gap tolerance: {}s", config.index.gap_tolerance);
    println!(
        "  Low-latency update interval: {}s",
        config.index.low_latency_update_interval
    );
    println!("  Max rows: {}", config.inspect.max_rows);
}
