// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fix operations. Each takes the owned document and hands back the document
// it leaves behind; most return the one they were given, `split` and `scale`
// build a new one. The pipeline folds them in request order.

pub mod color;
pub mod geometry;
pub mod images;
pub mod layout;
pub mod pipeline;
pub(crate) mod rewrite;
pub mod standards;

pub use pipeline::{FixOutcome, FixPipeline};

use lopdf::Document;
use preflight_core::error::{PreflightError, Result};
use preflight_core::{FixOptions, FixToken};
use tracing::{info, warn};

use crate::pdf::metadata::{FIX_JOURNAL_KEY, info_text, set_info_text};
use crate::pdf::snapshot::load_document;
use crate::raster::{RasterJob, Rasterizer};

/// State shared by the operations of one pipeline run.
pub struct FixContext<'a> {
    pub options: &'a FixOptions,
    pub rasterizer: Option<&'a dyn Rasterizer>,
    notes: Vec<String>,
}

impl<'a> FixContext<'a> {
    pub fn new(options: &'a FixOptions, rasterizer: Option<&'a dyn Rasterizer>) -> Self {
        Self {
            options,
            rasterizer,
            notes: Vec::new(),
        }
    }

    /// Record something the caller should know about an operation's result.
    pub fn note(&mut self, token: FixToken, message: impl Into<String>) {
        let message = message.into();
        info!(operation = token.as_str(), %message, "Fix note");
        self.notes.push(format!("{}: {}", token, message));
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn into_notes(self) -> Vec<String> {
        self.notes
    }
}

/// Run one operation.
pub fn apply(token: FixToken, doc: Document, ctx: &mut FixContext) -> Result<Document> {
    match token {
        FixToken::Cmyk => color::convert_to_cmyk(doc, ctx),
        FixToken::Fonts => standards::report_fonts(doc, ctx),
        FixToken::Resample => images::resample_images(doc, ctx),
        FixToken::Bleed => geometry::add_bleed(doc, ctx),
        FixToken::Boxes => geometry::reset_boxes(doc, ctx),
        FixToken::Marks => geometry::draw_trim_marks(doc, ctx),
        FixToken::Split => layout::split_spreads(doc, ctx),
        FixToken::Scale => layout::scale_pages(doc, ctx),
        FixToken::Clean => geometry::tighten_crop(doc, ctx),
        FixToken::Reorder => layout::flatten_page_tree(doc, ctx),
        FixToken::Normalize => standards::normalize_metadata(doc, ctx),
        FixToken::Flatten => standards::flatten_transparency(doc, ctx),
        FixToken::Tac => color::limit_ink(doc, ctx),
        FixToken::SpotToCmyk => color::convert_spots(doc, ctx),
        FixToken::OutlineFonts => standards::outline_fonts(doc, ctx),
        FixToken::Pdfx => standards::make_pdfx(doc, ctx),
    }
}

/// Hand the document to the configured rasterizer. Without one, or when the
/// tool fails, the document comes back as it was and a note says so.
pub(crate) fn delegate(
    mut doc: Document,
    ctx: &mut FixContext,
    token: FixToken,
    job: RasterJob,
) -> Result<Document> {
    let Some(rasterizer) = ctx.rasterizer else {
        warn!(operation = token.as_str(), "No rasterizer available, metadata only");
        ctx.note(token, "no rasterizer available; only metadata was updated");
        return Ok(doc);
    };

    let journal = info_text(&doc, FIX_JOURNAL_KEY);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|err| PreflightError::PdfError(format!("cannot serialize: {}", err)))?;

    let rendered = rasterizer
        .run(&bytes, job)
        .and_then(|output| load_document(&output));
    match rendered {
        Ok(mut rendered) => {
            if let Some(journal) = journal
                && info_text(&rendered, FIX_JOURNAL_KEY).is_none()
            {
                set_info_text(&mut rendered, FIX_JOURNAL_KEY, &journal)?;
            }
            info!(operation = token.as_str(), tool = rasterizer.name(), "Delegated to rasterizer");
            Ok(rendered)
        }
        Err(err) => {
            warn!(operation = token.as_str(), tool = rasterizer.name(), %err, "Rasterizer failed");
            ctx.note(token, format!("{} failed ({}); only metadata was updated", rasterizer.name(), err));
            Ok(doc)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pdf::metadata::journaled_fixes;
    use crate::test_fixtures::{FixturePage, build_document};

    /// Rasterizer double that returns a fixed document or fails.
    pub(crate) struct StubRasterizer {
        pub output: Option<Vec<u8>>,
    }

    impl Rasterizer for StubRasterizer {
        fn name(&self) -> &str {
            "stub"
        }

        fn run(&self, _pdf: &[u8], _job: RasterJob) -> Result<Vec<u8>> {
            self.output
                .clone()
                .ok_or_else(|| PreflightError::ExternalTool("stub refused".into()))
        }
    }

    #[test]
    fn missing_rasterizer_leaves_a_note() {
        let options = FixOptions::default();
        let mut ctx = FixContext::new(&options, None);
        let doc = build_document(&[FixturePage::new(100.0, 100.0)]);
        let doc = delegate(doc, &mut ctx, FixToken::Flatten, RasterJob::Flatten).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert_eq!(ctx.notes().len(), 1);
        assert!(ctx.notes()[0].starts_with("flatten: no rasterizer"));
    }

    #[test]
    fn failing_rasterizer_keeps_the_document() {
        let options = FixOptions::default();
        let stub = StubRasterizer { output: None };
        let mut ctx = FixContext::new(&options, Some(&stub));
        let doc = build_document(&[FixturePage::new(100.0, 100.0), FixturePage::new(100.0, 100.0)]);
        let doc = delegate(doc, &mut ctx, FixToken::Tac, RasterJob::ReduceInk { max_tac: 280.0 }).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
        assert!(ctx.notes()[0].contains("stub failed"));
    }

    #[test]
    fn rasterizer_output_replaces_the_document_and_keeps_the_journal() {
        let mut rendered = build_document(&[FixturePage::new(300.0, 300.0)]);
        let mut output = Vec::new();
        rendered.save_to(&mut output).unwrap();

        let options = FixOptions::default();
        let stub = StubRasterizer { output: Some(output) };
        let mut ctx = FixContext::new(&options, Some(&stub));
        let mut doc = build_document(&[FixturePage::new(100.0, 100.0), FixturePage::new(100.0, 100.0)]);
        crate::pdf::metadata::journal_fix(&mut doc, "boxes").unwrap();

        let doc = delegate(doc, &mut ctx, FixToken::Flatten, RasterJob::Flatten).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert_eq!(journaled_fixes(&doc), vec!["boxes"]);
        assert!(ctx.notes().is_empty());
    }
}
