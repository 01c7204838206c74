// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `preflight analyze`: print the preflight report for one file.

use std::fs;
use std::process::ExitCode;

use anyhow::{Context, Result};
use preflight_document::analyze_with;
use serde::Serialize;
use tracing::info;

use crate::cli::AnalyzeArgs;

pub fn run(args: &AnalyzeArgs) -> Result<ExitCode> {
    let bytes = fs::read(&args.file).with_context(|| format!("cannot read {}", args.file.display()))?;
    let report = analyze_with(&bytes, &args.config())
        .with_context(|| format!("cannot analyze {}", args.file.display()))?;
    info!(
        file = %args.file.display(),
        issues = report.issues.len(),
        warnings = report.warnings.len(),
        print_ready = report.is_print_ready(),
        "Analysis complete"
    );
    println!("{}", to_json(&report, args.compact)?);
    Ok(ExitCode::SUCCESS)
}

/// Serialize for stdout, pretty unless `compact`.
pub fn to_json<T: Serialize>(value: &T, compact: bool) -> Result<String> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    json.context("cannot serialize output")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compact_output_is_one_line() {
        let value = json!({ "issues": [1, 2], "printReady": false });
        assert!(!to_json(&value, true).unwrap().contains('\n'));
        assert!(to_json(&value, false).unwrap().contains('\n'));
    }

    #[test]
    fn missing_file_is_reported_with_its_path() {
        let args = AnalyzeArgs {
            file: "/nonexistent/brochure.pdf".into(),
            min_dpi: None,
            tac_limit: None,
            compact: true,
        };
        let err = run(&args).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/brochure.pdf"));
    }
}
