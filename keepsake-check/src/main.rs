// Keepsake Check Tool
// Copyright (c) 2024 The Project Keepsake Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};

use keepsake::core::anomaly::{
    CatalogSeverity, PreservationLevel, SevereElement, SeverityLookup, SeverityOverrides,
};
use keepsake::core::bitstream::Bitstream;
use keepsake::core::io::SourceStream;
use keepsake::core::probe::{Characterization, ParseOptions};
use keepsake::localize::{LocalPaths, ReferenceResolver, SelfContained};

use clap::{ArgAction, Parser, Subcommand};
use log::{info, LevelFilter};
use serde::Serialize;

type CheckResult<T> = std::result::Result<T, Box<dyn StdError>>;

#[derive(Parser)]
#[command(name = "keepsake-check")]
#[command(about = "Characterize and localize files for the preservation archive")]
#[command(author, version, long_about = None)]
struct Cli {
    /// Increase the log level, once for info, twice for debug. Ignored if RUST_LOG is set
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Identify the format of a file
    Probe {
        /// The input file path
        path: PathBuf,
    },

    /// Characterize a file and report its preservation level
    Characterize {
        /// The input file path
        path: PathBuf,

        /// Print the characterization as JSON
        #[arg(long)]
        json: bool,

        /// A JSON object mapping anomaly codes to note, report, bit, or reject
        #[arg(long, value_name = "FILE")]
        severity_overrides: Option<PathBuf>,

        /// The largest size a compressed movie header may inflate to
        #[arg(long, value_name = "BYTES")]
        max_decompressed_len: Option<u64>,
    },

    /// Rewrite a QuickTime movie so it no longer depends on external media
    Localize {
        /// The input movie path
        input: PathBuf,

        /// The output movie path
        output: PathBuf,

        /// Point references to URL at the local file PATH instead of marking them self-contained
        #[arg(long = "map", value_name = "URL=PATH", value_parser = parse_mapping)]
        mappings: Vec<(String, PathBuf)>,
    },
}

/// A characterization together with the verdict reached from it.
#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    characterization: &'a Characterization,
    preservation_level: PreservationLevel,
}

fn parse_mapping(arg: &str) -> Result<(String, PathBuf), String> {
    match arg.rsplit_once('=') {
        Some((url, path)) if !url.is_empty() && !path.is_empty() => {
            Ok((url.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected URL=PATH, found '{}'", arg)),
    }
}

fn init_logging(verbose: u8) {
    let mut builder = pretty_env_logger::formatted_builder();

    match std::env::var("RUST_LOG") {
        Ok(filters) => {
            builder.parse_filters(&filters);
        }
        Err(_) => {
            let level = match verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            };
            builder.filter_level(level);
        }
    }

    builder.init();
}

fn load_overrides(path: &Path) -> CheckResult<SeverityOverrides> {
    let json = fs::read_to_string(path)?;
    let overrides: SeverityOverrides = serde_json::from_str(&json)?;

    info!("loaded {} severity override(s) from {}", overrides.len(), path.display());

    Ok(overrides)
}

fn run_probe(path: &Path) -> CheckResult<i32> {
    let mut stream = SourceStream::open(path)?;

    match keepsake::default::get_probe().format(&mut stream)? {
        Some(descriptor) => {
            let info = &descriptor.info;
            println!("{}: {} ({})", path.display(), info.long_name, info.mime_type);
            Ok(0)
        }
        None => {
            println!("{}: unrecognized", path.display());
            Ok(1)
        }
    }
}

fn print_element(element: &SevereElement, lookup: &dyn SeverityLookup) {
    let severity = lookup.severity_of(element);
    println!("  {:<32} {:<8} {}", element.code, severity.as_str(), element.description);
}

fn print_bitstream(index: usize, bitstream: &Bitstream) {
    println!("  [{}] {}", index, bitstream);

    let mut fields = Vec::new();

    if let (Some(width), Some(height)) = (bitstream.width, bitstream.height) {
        fields.push(format!("{}x{}", width, height));
    }
    if let Some(bits) = bitstream.bits_per_sample {
        fields.push(format!("{} bits", bits));
    }
    if let Some(channels) = bitstream.channels {
        fields.push(format!("{} channel(s)", channels));
    }
    if let Some(rate) = bitstream.sample_rate {
        fields.push(format!("{} Hz", rate));
    }
    if let Some(duration) = bitstream.duration {
        fields.push(format!("{:.3} s", duration));
    }
    if let Some(rate) = bitstream.frame_rate {
        fields.push(format!("{:.3} frames/s", rate));
    }
    if let Some(rate) = bitstream.data_rate {
        fields.push(format!("{:.0} bits/s", rate));
    }

    if !fields.is_empty() {
        println!("      {}", fields.join(", "));
    }
}

fn print_report(path: &Path, result: &Characterization, lookup: &dyn SeverityLookup) {
    println!("Input Path: {}", path.display());
    println!();
    println!("  Format:            {}", result.format.long_name);
    println!("  Version:           {}", result.version.as_deref().unwrap_or("---"));
    println!("  Preservation:      {}", result.preservation_level(lookup));
    println!();

    println!("Bitstreams");
    println!("=================================================");
    for (i, bitstream) in result.bitstreams.iter().enumerate() {
        print_bitstream(i, bitstream);
    }
    println!();

    println!("Attributes");
    println!("=================================================");
    for (name, value) in &result.attributes {
        println!("  {:<32} {}", name, value);
    }
    println!();

    println!("Anomalies");
    println!("=================================================");
    for element in result.anomalies.anomalies() {
        print_element(element, lookup);
    }
    println!();

    if !result.anomalies.limitations().is_empty() {
        println!("Limitations");
        println!("=================================================");
        for element in result.anomalies.limitations() {
            print_element(element, lookup);
        }
        println!();
    }
}

fn run_characterize(
    path: &Path,
    json: bool,
    overrides: Option<&Path>,
    max_decompressed_len: Option<u64>,
) -> CheckResult<i32> {
    let overrides = overrides.map(load_overrides).transpose()?;

    let lookup: &dyn SeverityLookup = match &overrides {
        Some(overrides) => overrides,
        None => &CatalogSeverity,
    };

    let mut options = ParseOptions::default();

    if let Some(len) = max_decompressed_len {
        options.max_decompressed_len = len;
    }

    let result = keepsake::characterize_file(path, &options)?;

    if json {
        let preservation_level = result.preservation_level(lookup);
        let report = Report { characterization: &result, preservation_level };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    else {
        print_report(path, &result, lookup);
    }

    Ok(0)
}

fn run_localize(input: &Path, output: &Path, mappings: &[(String, PathBuf)]) -> CheckResult<i32> {
    let mut paths = LocalPaths::new();

    for (url, path) in mappings {
        paths.insert(url, path);
    }

    let resolver: &dyn ReferenceResolver =
        if paths.is_empty() { &SelfContained } else { &paths };

    let written = keepsake::localize_file(input, output, resolver)?;

    println!("{} -> {} ({} bytes)", input.display(), output.display(), written);

    Ok(0)
}

fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let ret = match &cli.command {
        Commands::Probe { path } => run_probe(path),
        Commands::Characterize { path, json, severity_overrides, max_decompressed_len } => {
            run_characterize(path, *json, severity_overrides.as_deref(), *max_decompressed_len)
        }
        Commands::Localize { input, output, mappings } => run_localize(input, output, mappings),
    };

    match ret {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("keepsake-check: {}", err);
            std::process::exit(2);
        }
    }
}
