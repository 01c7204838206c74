// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Metadata and conformance fixes: font report, canonical metadata, PDF/X
// preparation, and the delegated flatten and outline operations.

use chrono::Utc;
use lopdf::Document;
use preflight_core::error::Result;
use preflight_core::{FixToken, PdfxStandard};
use tracing::{info, instrument, warn};

use super::color::{convert_to_cmyk, tag_producer};
use super::geometry::{bleed_geometry, page_mut};
use super::{FixContext, delegate};
use crate::analysis::fonts::analyze_fonts;
use crate::pdf::copy::{effective_media_box, page_rect};
use crate::pdf::metadata::{set_info_name, set_info_text, stamp_canonical};
use crate::pdf::snapshot::DocumentSnapshot;
use crate::raster::RasterJob;

/// List fonts that are not embedded. The engine ships no font programs, so
/// nothing is embedded here; the report tells the operator what to fix.
#[instrument(skip_all)]
pub fn report_fonts(doc: Document, ctx: &mut FixContext) -> Result<Document> {
    let snapshot = DocumentSnapshot::from_document(&doc, &[]);
    let missing: Vec<String> = analyze_fonts(&snapshot)
        .into_iter()
        .filter(|font| !font.is_embedded)
        .map(|font| font.name)
        .collect();
    if missing.is_empty() {
        info!("All fonts embedded");
    } else {
        warn!(fonts = ?missing, "Fonts not embedded");
        ctx.note(
            FixToken::Fonts,
            format!("not embedded: {} (embed them at the source)", missing.join(", ")),
        );
    }
    Ok(doc)
}

#[instrument(skip_all)]
pub fn normalize_metadata(mut doc: Document, _ctx: &mut FixContext) -> Result<Document> {
    stamp_canonical(&mut doc, Utc::now())?;
    Ok(doc)
}

#[instrument(skip_all)]
pub fn flatten_transparency(doc: Document, ctx: &mut FixContext) -> Result<Document> {
    let mut doc = delegate(doc, ctx, FixToken::Flatten, RasterJob::Flatten)?;
    tag_producer(&mut doc)?;
    Ok(doc)
}

#[instrument(skip_all)]
pub fn outline_fonts(doc: Document, ctx: &mut FixContext) -> Result<Document> {
    let mut doc = delegate(doc, ctx, FixToken::OutlineFonts, RasterJob::OutlineFonts)?;
    tag_producer(&mut doc)?;
    Ok(doc)
}

/// Prepare for PDF/X: process color, font report, print boxes on every
/// page, then the standard's identification keys.
#[instrument(skip_all, fields(standard = %ctx.options.pdfx_standard))]
pub fn make_pdfx(doc: Document, ctx: &mut FixContext) -> Result<Document> {
    let doc = convert_to_cmyk(doc, ctx)?;
    let mut doc = report_fonts(doc, ctx)?;

    let size = ctx.options.bleed_size;
    for (number, page_id) in doc.get_pages() {
        let trim = page_rect(&doc, page_id, b"TrimBox");
        let bleed = page_rect(&doc, page_id, b"BleedBox");
        if trim.is_some() && bleed.is_some() {
            continue;
        }
        let (default_trim, default_bleed, _) = bleed_geometry(&doc, page_id, size);
        let trim = trim.unwrap_or(default_trim);
        let bleed = bleed.unwrap_or(default_bleed);
        let media = effective_media_box(&doc, page_id).union(&bleed);
        let page = page_mut(&mut doc, page_id)?;
        page.set("TrimBox", trim.to_object());
        page.set("BleedBox", bleed.to_object());
        page.set("MediaBox", media.to_object());
        info!(page = number, "Print boxes added");
    }

    match ctx.options.pdfx_standard.gts_version() {
        Some(version) => set_info_text(&mut doc, "GTS_PDFXVersion", version)?,
        None => ctx.note(FixToken::Pdfx, "no PDF/X standard requested; version key not written"),
    }
    set_info_name(&mut doc, "Trapped", "False")?;
    tag_producer(&mut doc)?;
    if ctx.options.pdfx_standard == PdfxStandard::X1a && ctx.rasterizer.is_none() {
        // X-1a forbids transparency, which only the rasterizer can remove.
        ctx.note(FixToken::Pdfx, "PDF/X-1a needs flattening; run `flatten` with a rasterizer");
    }
    Ok(doc)
}
