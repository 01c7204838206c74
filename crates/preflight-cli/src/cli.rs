// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line definitions.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use preflight_core::{AnalysisConfig, FixOptions, RasterizerConfig};

/// Preflight print PDFs and apply automatic fixes.
#[derive(Debug, Parser)]
#[command(name = "preflight", about, version)]
pub struct Cli {
    /// Abort when the command takes longer than this many seconds
    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Analyze a PDF and print the preflight report as JSON
    Analyze(AnalyzeArgs),

    /// Apply fix operations to a PDF and write the result
    Fix(FixArgs),
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Path to the PDF file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Minimum effective image resolution
    #[arg(long, value_name = "DPI")]
    pub min_dpi: Option<f32>,

    /// Total area coverage limit, in percent
    #[arg(long, value_name = "PERCENT")]
    pub tac_limit: Option<f64>,

    /// Print JSON on one line
    #[arg(long)]
    pub compact: bool,
}

impl AnalyzeArgs {
    pub fn config(&self) -> AnalysisConfig {
        let defaults = AnalysisConfig::default();
        AnalysisConfig {
            min_dpi: self.min_dpi.unwrap_or(defaults.min_dpi),
            tac_limit: self.tac_limit.unwrap_or(defaults.tac_limit),
        }
    }
}

#[derive(Debug, Args)]
pub struct FixArgs {
    /// Path to the PDF file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Where to write the fixed PDF
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Comma-separated operations, applied in order (e.g. 'cmyk,bleed,normalize')
    #[arg(long, value_delimiter = ',', required = true)]
    pub ops: Vec<String>,

    /// JSON file with fix options; flags below override it
    #[arg(long, value_name = "FILE")]
    pub options: Option<PathBuf>,

    /// Bleed to add, in points
    #[arg(long, value_name = "POINTS")]
    pub bleed: Option<f32>,

    /// Scale factor for the `scale` operation
    #[arg(long)]
    pub scale: Option<f32>,

    /// Resolution images are resampled to
    #[arg(long, value_name = "DPI")]
    pub target_dpi: Option<f32>,

    /// Ink ceiling for the `tac` operation, in percent
    #[arg(long, value_name = "PERCENT")]
    pub max_tac: Option<f64>,

    /// Analyze the fixed document and include the report in the output
    #[arg(long)]
    pub verify: bool,

    /// Ghostscript binary used for flattening and font outlining
    #[arg(long, value_name = "PATH", conflicts_with = "no_rasterizer")]
    pub rasterizer: Option<PathBuf>,

    /// Never delegate to an external rasterizer
    #[arg(long)]
    pub no_rasterizer: bool,

    /// Print JSON on one line
    #[arg(long)]
    pub compact: bool,
}

impl FixArgs {
    /// Options file (or defaults) with flag overrides applied, validated.
    pub fn fix_options(&self) -> Result<FixOptions> {
        let mut options = match &self.options {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("cannot read options file {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("invalid options file {}", path.display()))?
            }
            None => FixOptions::default(),
        };
        if let Some(bleed) = self.bleed {
            options.bleed_size = bleed;
        }
        if let Some(scale) = self.scale {
            options.scale_factor = scale;
        }
        if let Some(dpi) = self.target_dpi {
            options.target_dpi = dpi;
        }
        if let Some(tac) = self.max_tac {
            options.max_tac = tac;
        }
        options.validate()?;
        Ok(options)
    }

    pub fn rasterizer_config(&self) -> RasterizerConfig {
        RasterizerConfig {
            ghostscript_path: self.rasterizer.clone(),
            disabled: self.no_rasterizer,
        }
    }
}
