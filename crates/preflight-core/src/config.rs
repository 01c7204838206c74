// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Analysis and fix-pipeline configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{PreflightError, Result};
use crate::types::PdfxStandard;

/// Minimum effective resolution for print, in dots per inch.
pub const DEFAULT_MIN_DPI: f32 = 300.0;

/// Total area coverage ceiling, in percent.
pub const DEFAULT_TAC_LIMIT: f64 = 300.0;

/// Canonical bleed extension in points (0.125in).
pub const DEFAULT_BLEED_PT: f32 = 9.0;

/// Thresholds used by the analyzers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisConfig {
    /// Images below this effective DPI fail `meetsMinDPI`.
    pub min_dpi: f32,
    /// TAC samples above this percentage count as exceeding the limit.
    pub tac_limit: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_dpi: DEFAULT_MIN_DPI,
            tac_limit: DEFAULT_TAC_LIMIT,
        }
    }
}

/// Options recognised by the fix pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FixOptions {
    /// Resolution the `resample` operation brings images to.
    #[serde(rename = "targetDPI")]
    pub target_dpi: f32,
    /// Ink ceiling used by the `tac` operation, in percent.
    #[serde(rename = "maxTAC")]
    pub max_tac: f64,
    /// Bleed added by `bleed` and `pdfx`, in points.
    pub bleed_size: f32,
    /// Uniform factor applied by `scale`.
    pub scale_factor: f32,
    /// Standard stamped by `pdfx`.
    pub pdfx_standard: PdfxStandard,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            target_dpi: DEFAULT_MIN_DPI,
            max_tac: DEFAULT_TAC_LIMIT,
            bleed_size: DEFAULT_BLEED_PT,
            scale_factor: 1.0,
            pdfx_standard: PdfxStandard::X4,
        }
    }
}

impl FixOptions {
    /// Reject values no operation can work with.
    ///
    /// `scale_factor` is checked by the `scale` operation itself so that a
    /// pipeline without `scale` never fails on it.
    pub fn validate(&self) -> Result<()> {
        if !self.target_dpi.is_finite() || self.target_dpi <= 0.0 {
            return Err(PreflightError::InvalidOption(format!(
                "targetDPI must be positive, got {}",
                self.target_dpi
            )));
        }
        if !self.max_tac.is_finite() || !(0.0..=400.0).contains(&self.max_tac) {
            return Err(PreflightError::InvalidOption(format!(
                "maxTAC must be within 0..=400, got {}",
                self.max_tac
            )));
        }
        if !self.bleed_size.is_finite() || self.bleed_size < 0.0 {
            return Err(PreflightError::InvalidOption(format!(
                "bleedSize must be non-negative, got {}",
                self.bleed_size
            )));
        }
        Ok(())
    }
}

/// Where to find the optional external rasterizer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RasterizerConfig {
    /// Explicit path to a Ghostscript binary. When unset, `PATH` is searched.
    pub ghostscript_path: Option<PathBuf>,
    /// Disable delegation entirely, even if a binary is found.
    pub disabled: bool,
}
