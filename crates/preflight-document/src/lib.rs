// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// preflight-document: print preflight for PDF documents.
//
// Loads a PDF with lopdf into an immutable snapshot, runs the six preflight
// analyzers over it, and applies ordered auto-fix pipelines to the document.

pub mod analysis;
pub mod fix;
pub mod pdf;
pub mod raster;

#[cfg(test)]
pub(crate) mod test_fixtures;

use std::time::Instant;

use preflight_core::error::Result;
use preflight_core::{AnalysisConfig, FixOptions, PreFlightReport, RasterizerConfig};
use tracing::instrument;

pub use analysis::Analysis;
pub use fix::{FixOutcome, FixPipeline};
pub use pdf::{DocumentSnapshot, load_document};
pub use raster::{Ghostscript, RasterJob, Rasterizer};

/// Analyze with the default thresholds (300 DPI, 300% TAC).
pub fn analyze(bytes: &[u8]) -> Result<PreFlightReport> {
    analyze_with(bytes, &AnalysisConfig::default())
}

/// Analyze with explicit thresholds. Fails only when the document cannot be
/// loaded; analyzers that cannot finish are listed as degraded in the report.
#[instrument(skip_all, fields(bytes_len = bytes.len()))]
pub fn analyze_with(bytes: &[u8], config: &AnalysisConfig) -> Result<PreFlightReport> {
    let started = Instant::now();
    let snapshot = DocumentSnapshot::from_bytes(bytes)?;
    Ok(analysis::build_report_since(&snapshot, config, started))
}

/// A fixed document together with its re-analysis.
#[derive(Debug, Clone)]
pub struct FixedDocument {
    pub bytes: Vec<u8>,
    pub report: PreFlightReport,
}

/// Apply fix operations, delegating to Ghostscript when it is on `PATH`.
pub fn apply_fixes<I, S>(bytes: &[u8], operations: I, options: &FixOptions) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Ok(default_pipeline(options).run(bytes, operations)?.bytes)
}

/// Apply fix operations, then analyze the result.
pub fn apply_fixes_with_analysis<I, S>(
    bytes: &[u8],
    operations: I,
    options: &FixOptions,
) -> Result<FixedDocument>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let bytes = apply_fixes(bytes, operations, options)?;
    let report = analyze(&bytes)?;
    Ok(FixedDocument { bytes, report })
}

fn default_pipeline(options: &FixOptions) -> FixPipeline {
    let pipeline = FixPipeline::new(options.clone());
    match Ghostscript::locate(&RasterizerConfig::default()) {
        Some(gs) => pipeline.with_rasterizer(Box::new(gs)),
        None => pipeline,
    }
}
