// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF/X conformance check: embedded fonts plus TrimBox and BleedBox on every
// page. Output intent presence is reported but does not gate compliance.

use preflight_core::{BoxRecord, FontRecord, PdfxCompliance, PdfxStandard};
use tracing::instrument;

use super::boxes::validate_boxes;
use super::fonts::{analyze_fonts, are_all_fonts_embedded};
use crate::pdf::snapshot::DocumentSnapshot;

#[instrument(skip_all)]
pub fn check_pdfx(snapshot: &DocumentSnapshot) -> PdfxCompliance {
    let fonts = analyze_fonts(snapshot);
    let boxes = validate_boxes(snapshot);
    evaluate(snapshot, &fonts, &boxes)
}

/// Combine font and box findings into a compliance verdict.
pub fn evaluate(snapshot: &DocumentSnapshot, fonts: &[FontRecord], boxes: &[BoxRecord]) -> PdfxCompliance {
    let fonts_embedded = are_all_fonts_embedded(fonts);
    let missing = |has: fn(&BoxRecord) -> bool| -> Vec<u32> {
        boxes.iter().filter(|b| !has(b)).map(|b| b.page).collect()
    };
    let missing_trim = missing(|b| b.has_trim_box);
    let missing_bleed = missing(|b| b.has_bleed_box);

    let mut violations = Vec::new();
    if !fonts_embedded {
        let names: Vec<&str> = fonts
            .iter()
            .filter(|font| !font.is_embedded)
            .map(|font| font.name.as_str())
            .collect();
        violations.push(format!("Fonts not embedded: {}", names.join(", ")));
    }
    if !missing_trim.is_empty() {
        violations.push(format!("TrimBox missing on page(s) {}", page_list(&missing_trim)));
    }
    if !missing_bleed.is_empty() {
        violations.push(format!("BleedBox missing on page(s) {}", page_list(&missing_bleed)));
    }

    let is_compliant = violations.is_empty();
    PdfxCompliance {
        is_compliant,
        standard: if is_compliant { PdfxStandard::X4 } else { PdfxStandard::None },
        declared_standard: snapshot
            .metadata
            .gts_pdfx_version
            .as_deref()
            .map_or(PdfxStandard::None, PdfxStandard::from_gts_version),
        violations,
        fonts_embedded,
        has_trim_box: missing_trim.is_empty(),
        has_bleed_box: missing_bleed.is_empty(),
        has_output_intent: snapshot
            .output_intents
            .iter()
            .any(|intent| intent.subtype == "GTS_PDFX"),
    }
}

fn page_list(pages: &[u32]) -> String {
    pages
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
