// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Layout fixes. `split` and `scale` re-embed pages as Form XObjects in a new
// document; `reorder` flattens the page tree of the existing one.

use lopdf::{Document, Object, ObjectId};
use preflight_core::FixToken;
use preflight_core::error::{PreflightError, Result};
use tracing::{debug, info, instrument};

use super::FixContext;
use super::geometry::page_mut;
use crate::pdf::copy::{INHERITABLE_KEYS, PageTreeBuilder, effective_media_box, page_rect};
use crate::pdf::geometry::Rect;
use crate::pdf::objects::{catalog_id, inherited};

/// Pages wider than this many times their height count as spreads.
const SPREAD_RATIO: f32 = 1.2;

/// Cut every spread into two half-width pages. Other pages pass through.
#[instrument(skip_all)]
pub fn split_spreads(doc: Document, _ctx: &mut FixContext) -> Result<Document> {
    let mut builder = PageTreeBuilder::new(&doc);
    let mut spreads = 0;
    for (number, page_id) in doc.get_pages() {
        let media = effective_media_box(&doc, page_id);
        if media.width() <= media.height() * SPREAD_RATIO {
            builder.push_copied_page(page_id)?;
            continue;
        }
        let (form, media) = builder.page_as_form(page_id)?;
        let half = media.width() / 2.0;
        let target = Rect::from_size(half, media.height());
        builder.push_form_page(target, form, [1.0, 0.0, 0.0, 1.0, -media.llx, -media.lly]);
        builder.push_form_page(target, form, [1.0, 0.0, 0.0, 1.0, -media.llx - half, -media.lly]);
        debug!(page = number, "Spread split");
        spreads += 1;
    }
    info!(spreads, "Spreads split");
    Ok(builder.finish())
}

/// Re-embed every page at `scale_factor`, carrying TrimBox and BleedBox.
#[instrument(skip_all, fields(factor = ctx.options.scale_factor))]
pub fn scale_pages(doc: Document, ctx: &mut FixContext) -> Result<Document> {
    let factor = ctx.options.scale_factor;
    if !factor.is_finite() || factor <= 0.0 {
        return Err(PreflightError::fix_operation(
            FixToken::Scale.as_str(),
            format!("scale factor must be finite and positive, got {}", factor),
        ));
    }

    let mut builder = PageTreeBuilder::new(&doc);
    for page_id in doc.get_pages().into_values() {
        let (form, media) = builder.page_as_form(page_id)?;
        let target = Rect::from_size(media.width() * factor, media.height() * factor);
        let placement = [factor, 0.0, 0.0, factor, -media.llx * factor, -media.lly * factor];
        let new_page = builder.push_form_page(target, form, placement);
        for key in ["TrimBox", "BleedBox"] {
            if let Some(rect) = page_rect(&doc, page_id, key.as_bytes()) {
                let scaled = Rect::new(
                    (rect.llx - media.llx) * factor,
                    (rect.lly - media.lly) * factor,
                    (rect.urx - media.llx) * factor,
                    (rect.ury - media.lly) * factor,
                );
                builder.set_page_box(new_page, key, scaled)?;
            }
        }
    }
    info!(factor, "Pages scaled");
    Ok(builder.finish())
}

/// Rebuild the page tree as a single flat `/Kids` list in reading order.
/// Inherited attributes are copied onto each page first.
#[instrument(skip_all)]
pub fn flatten_page_tree(mut doc: Document, _ctx: &mut FixContext) -> Result<Document> {
    let root = pages_root(&doc)?;
    let pages = doc.get_pages();

    for page_id in pages.values().copied() {
        let materialized: Vec<(&[u8], Object)> = INHERITABLE_KEYS
            .into_iter()
            .filter(|key| doc.get_dictionary(page_id).is_ok_and(|page| page.get(key).is_err()))
            .filter_map(|key| inherited(&doc, page_id, key).map(|value| (key, value.clone())))
            .collect();
        let page = page_mut(&mut doc, page_id)?;
        for (key, value) in materialized {
            page.set(key.to_vec(), value);
        }
        page.set("Parent", root);
    }

    let kids: Vec<Object> = pages.values().map(|id| Object::Reference(*id)).collect();
    let tree = doc
        .get_dictionary_mut(root)
        .map_err(|err| PreflightError::PdfError(format!("cannot update page tree: {}", err)))?;
    tree.set("Kids", kids);
    tree.set("Count", pages.len() as i64);
    // Intermediate Pages nodes are now unreachable.
    doc.prune_objects();
    info!(pages = pages.len(), "Page tree flattened");
    Ok(doc)
}

fn pages_root(doc: &Document) -> Result<ObjectId> {
    catalog_id(doc)
        .and_then(|id| doc.get_dictionary(id).ok())
        .and_then(|catalog| catalog.get(b"Pages").ok())
        .and_then(|pages| pages.as_reference().ok())
        .ok_or_else(|| PreflightError::PdfError("document has no page tree".into()))
}
