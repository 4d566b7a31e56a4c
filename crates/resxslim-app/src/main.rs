// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// resxslim — squeeze images embedded in .resx resource containers.
//
// Entry point. Initialises logging, loads configuration, and runs one
// optimisation pass per container named on the command line.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;

use resxslim_core::{CompressionMode, EntryResult, OptimizerConfig};
use resxslim_document::{CommandCompressor, ContainerRewriter};

#[derive(Debug, Parser)]
#[command(name = "resxslim", version, about = "Losslessly shrink images embedded in .resx files")]
struct Cli {
    /// JSON configuration file (tools, timeout, temp directory).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Allow lossy compression regardless of the configured mode.
    #[arg(long)]
    lossy: bool,

    /// Print results as JSON instead of a table.
    #[arg(long)]
    json: bool,

    /// Containers to optimise.
    #[arg(required = true)]
    containers: Vec<PathBuf>,
}

/// One reported entry, without the (large) rewritten value.
#[derive(Debug, Serialize)]
struct EntryReport<'a> {
    container: &'a std::path::Path,
    resource: &'a str,
    original_size: u64,
    optimized_size: u64,
    saving: u64,
}

impl<'a> From<&'a EntryResult> for EntryReport<'a> {
    fn from(result: &'a EntryResult) -> Self {
        Self {
            container: &result.container_path,
            resource: &result.resource_name,
            original_size: result.original_size,
            optimized_size: result.optimized_size,
            saving: result.saving(),
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match OptimizerConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to load configuration");
                return ExitCode::FAILURE;
            }
        },
        None => OptimizerConfig::default(),
    };
    let mode = if cli.lossy {
        CompressionMode::Lossy
    } else {
        config.mode
    };

    let compressor = CommandCompressor::from_config(&config);
    let rewriter = ContainerRewriter::new(&compressor).with_config(config);

    let mut results = Vec::new();
    let mut failed = false;
    for path in &cli.containers {
        match rewriter.optimize(path, mode) {
            Ok(entries) => results.extend(entries),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "container not optimised");
                failed = true;
            }
        }
    }

    let reports: Vec<EntryReport<'_>> = results.iter().map(EntryReport::from).collect();
    if cli.json {
        match serde_json::to_string_pretty(&reports) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialise results");
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_table(&reports);
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_table(reports: &[EntryReport<'_>]) {
    for report in reports {
        println!(
            "{:>10} -> {:>10}  (-{:>8})  {}  [{}]",
            report.original_size,
            report.optimized_size,
            report.saving,
            report.resource,
            report.container.display()
        );
    }
    let total: u64 = reports.iter().map(|r| r.saving).sum();
    let improved = reports.iter().filter(|r| r.saving > 0).count();
    println!("{improved} of {} image entries improved, {total} bytes saved", reports.len());
}
