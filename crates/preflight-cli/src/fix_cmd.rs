// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `preflight fix`: run the fix pipeline and write the fixed file.

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use preflight_core::{FixToken, PreFlightReport};
use preflight_document::{FixPipeline, Ghostscript, analyze};
use serde::Serialize;
use tracing::{info, warn};

use crate::analyze_cmd::to_json;
use crate::cli::FixArgs;

/// What `fix` prints on stdout.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FixSummary<'a> {
    output: &'a Path,
    applied: Vec<FixToken>,
    skipped: Vec<String>,
    notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<PreFlightReport>,
}

pub fn run(args: &FixArgs) -> Result<ExitCode> {
    let options = args.fix_options()?;
    let bytes = fs::read(&args.file).with_context(|| format!("cannot read {}", args.file.display()))?;

    let mut pipeline = FixPipeline::new(options);
    if let Some(gs) = Ghostscript::locate(&args.rasterizer_config()) {
        pipeline = pipeline.with_rasterizer(Box::new(gs));
    }
    let outcome = pipeline
        .run(&bytes, &args.ops)
        .with_context(|| format!("cannot fix {}", args.file.display()))?;
    for token in &outcome.skipped {
        warn!(token = %token, "Ignored unknown operation");
    }

    fs::write(&args.output, &outcome.bytes)
        .with_context(|| format!("cannot write {}", args.output.display()))?;
    info!(
        output = %args.output.display(),
        bytes_len = outcome.bytes.len(),
        applied = outcome.applied.len(),
        "Fixed document written"
    );

    let report = if args.verify {
        Some(analyze(&outcome.bytes).context("cannot analyze the fixed document")?)
    } else {
        None
    };
    let summary = FixSummary {
        output: &args.output,
        applied: outcome.applied,
        skipped: outcome.skipped,
        notes: outcome.notes,
        report,
    };
    println!("{}", to_json(&summary, args.compact)?);
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Dictionary, Document, Object, Stream, dictionary};
    use std::path::PathBuf;

    fn write_letter_pdf(path: &Path) {
        let mut doc = Document::with_version("1.6");
        let pages_id = doc.new_object_id();
        let contents = doc.add_object(Stream::new(Dictionary::new(), b"1 0 0 rg 0 0 100 100 re f".to_vec()));
        let page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
            "Resources" => Dictionary::new(),
            "Contents" => contents,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page)],
                "Count" => Object::Integer(1),
            }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);
        doc.save(path).unwrap();
    }

    fn args(input: PathBuf, output: PathBuf, ops: &[&str]) -> FixArgs {
        FixArgs {
            file: input,
            output,
            ops: ops.iter().map(|op| op.to_string()).collect(),
            options: None,
            bleed: None,
            scale: None,
            target_dpi: None,
            max_tac: None,
            verify: true,
            rasterizer: None,
            no_rasterizer: true,
            compact: true,
        }
    }

    #[test]
    fn fixed_file_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        write_letter_pdf(&input);

        run(&args(input, output.clone(), &["cmyk", "bleed", "normalize", "shine"])).unwrap();

        let report = analyze(&fs::read(&output).unwrap()).unwrap();
        assert!(!report.color_space_analysis.has_rgb);
        assert_eq!(report.page_box_validation[0].bleed_size, 9.0);
        assert_eq!(report.document_info.creator.as_deref(), Some("PreFlight Pro"));
    }

    #[test]
    fn failed_pipeline_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        write_letter_pdf(&input);

        let mut failing = args(input, output.clone(), &["scale"]);
        failing.scale = Some(0.0);
        assert!(run(&failing).is_err());
        assert!(!output.exists());
    }
}
