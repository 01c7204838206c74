// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The fix pipeline: one owned document folded through the requested
// operations in order, serialized only when every operation succeeded.

use chrono::Utc;
use preflight_core::error::{PreflightError, Result};
use preflight_core::{FixOptions, FixToken};
use tracing::{debug, info, instrument, warn};

use super::{FixContext, apply};
use crate::pdf::metadata::{journal_fix, stamp_canonical};
use crate::pdf::snapshot::load_document;
use crate::raster::Rasterizer;

/// Result of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct FixOutcome {
    /// The serialized document.
    pub bytes: Vec<u8>,
    /// Operations that ran, in order.
    pub applied: Vec<FixToken>,
    /// Requested tokens that are not operations.
    pub skipped: Vec<String>,
    /// Limitations and partial results reported by operations.
    pub notes: Vec<String>,
}

pub struct FixPipeline {
    options: FixOptions,
    rasterizer: Option<Box<dyn Rasterizer>>,
}

impl FixPipeline {
    pub fn new(options: FixOptions) -> Self {
        Self {
            options,
            rasterizer: None,
        }
    }

    /// Delegate `flatten`, `tac`, `spot-to-cmyk` and `outline-fonts` to an
    /// external tool.
    pub fn with_rasterizer(mut self, rasterizer: Box<dyn Rasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    pub fn options(&self) -> &FixOptions {
        &self.options
    }

    /// Apply `operations` to the document in `bytes`.
    ///
    /// Unknown tokens are skipped. The first failing operation aborts the run
    /// with [`PreflightError::FixOperation`] and no bytes are produced.
    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    pub fn run<I, S>(&self, bytes: &[u8], operations: I) -> Result<FixOutcome>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.options.validate()?;
        let mut doc = load_document(bytes)?;
        let mut ctx = FixContext::new(&self.options, self.rasterizer.as_deref());
        let mut applied = Vec::new();
        let mut skipped = Vec::new();

        for requested in operations {
            let requested = requested.as_ref();
            let Some(token) = FixToken::parse(requested) else {
                warn!(token = requested, "Unknown fix operation skipped");
                skipped.push(requested.to_string());
                continue;
            };
            debug!(operation = token.as_str(), replaces = token.replaces_document(), "Applying fix");
            doc = apply(token, doc, &mut ctx).map_err(|err| match err {
                PreflightError::FixOperation { .. } => err,
                other => PreflightError::fix_operation(token.as_str(), other),
            })?;
            journal_fix(&mut doc, token.as_str())
                .map_err(|err| PreflightError::fix_operation(token.as_str(), err))?;
            applied.push(token);
        }

        // Later operations may have rewritten Producer; the canonical stamp wins.
        if applied.contains(&FixToken::Normalize) {
            stamp_canonical(&mut doc, Utc::now())
                .map_err(|err| PreflightError::fix_operation(FixToken::Normalize.as_str(), err))?;
        }

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|err| PreflightError::PdfError(format!("cannot serialize: {}", err)))?;
        info!(
            applied = applied.len(),
            skipped = skipped.len(),
            bytes_len = output.len(),
            "Fix pipeline finished"
        );
        Ok(FixOutcome {
            bytes: output,
            applied,
            skipped,
            notes: ctx.into_notes(),
        })
    }
}
