// SPDX-License-Identifier: MIT OR Apache-2.0
//! Trellis bench: slab churn benchmark and dataflow-to-GPU demo.
//!
//! Usage: `trellis_bench [settings.ron]`. A missing settings file is
//! created with the defaults. Log verbosity follows `RUST_LOG`.
//!
//! The churn run compares plain `release` against `release_and_repack` on
//! the same allocation pattern, then drives the demo pipeline.

mod churn;
mod demo;
mod error;
mod settings;

use churn::ReleaseMode;
use error::BenchError;
use settings::BenchSettings;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trellis=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Trellis bench v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run() {
        tracing::error!("Bench failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), BenchError> {
    let settings = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => BenchSettings::load_or_create(&path)?,
        None => BenchSettings::default(),
    };

    for mode in [ReleaseMode::Plain, ReleaseMode::Repack] {
        let report = churn::run(&settings.churn, mode)?;
        tracing::info!(
            "{:?}: released {} blocks in {:.2?}, active size {} -> {} ({} live records, {} relocations)",
            report.mode,
            report.released,
            report.elapsed,
            report.peak_active_size,
            report.final_active_size,
            report.live_records,
            report.relocations,
        );
    }

    let summary = demo::run(&settings.demo)?;
    tracing::info!(
        "Demo: {} shapes, {} uploads ({} bytes), {} draw calls, {} calculations, {} vertices relocated, {} vertices uploaded",
        summary.shapes,
        summary.uploads,
        summary.uploaded_bytes,
        summary.draw_calls,
        summary.calculations,
        summary.relocated_vertices,
        summary.vertex_active_size,
    );
    Ok(())
}
