// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PreFlight Pro: core types, configuration, error definitions and color math
// shared across all crates.

pub mod color;
pub mod config;
pub mod error;
pub mod types;

pub use config::{AnalysisConfig, FixOptions, RasterizerConfig};
pub use error::{PreflightError, Result};
pub use types::*;
