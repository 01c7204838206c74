// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page-box fixes: bleed, box reset, crop tightening and trim marks. All of
// them edit page dictionaries in place.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use preflight_core::FixToken;
use preflight_core::error::{PreflightError, Result};
use tracing::{debug, info, instrument};

use super::FixContext;
use crate::pdf::copy::{effective_media_box, page_rect};
use crate::pdf::geometry::Rect;
use crate::pdf::objects::{inherited, resolve};

/// Margin removed by `clean`, in points.
const CLEAN_INSET: f32 = 5.0;

/// Trim-mark geometry, in points.
const MARK_LENGTH: f32 = 18.0;
const MARK_OFFSET: f32 = 6.0;
const MARK_WIDTH: f32 = 0.25;

pub(crate) fn page_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary> {
    doc.get_dictionary_mut(page_id)
        .map_err(|err| PreflightError::PdfError(format!("cannot update page {:?}: {}", page_id, err)))
}

/// TrimBox from the existing TrimBox or the MediaBox; BleedBox around it;
/// MediaBox grown to hold the bleed.
#[instrument(skip_all, fields(bleed = ctx.options.bleed_size))]
pub fn add_bleed(mut doc: Document, ctx: &mut FixContext) -> Result<Document> {
    let size = ctx.options.bleed_size;
    for (number, page_id) in doc.get_pages() {
        let (trim, bleed, media) = bleed_geometry(&doc, page_id, size);
        let page = page_mut(&mut doc, page_id)?;
        page.set("TrimBox", trim.to_object());
        page.set("BleedBox", bleed.to_object());
        page.set("MediaBox", media.to_object());
        debug!(page = number, "Bleed added");
    }
    info!(size, "Bleed applied to every page");
    Ok(doc)
}

/// Trim, bleed and media boxes for a page given a bleed size.
pub(crate) fn bleed_geometry(doc: &Document, page_id: ObjectId, size: f32) -> (Rect, Rect, Rect) {
    let media = effective_media_box(doc, page_id);
    let trim = page_rect(doc, page_id, b"TrimBox").unwrap_or(media);
    let bleed = trim.grow(size);
    (trim, bleed, media.union(&bleed))
}

/// Every box set to the page's MediaBox.
#[instrument(skip_all)]
pub fn reset_boxes(mut doc: Document, _ctx: &mut FixContext) -> Result<Document> {
    for page_id in doc.get_pages().into_values() {
        let media = effective_media_box(&doc, page_id).to_object();
        let page = page_mut(&mut doc, page_id)?;
        for key in ["MediaBox", "CropBox", "TrimBox", "BleedBox"] {
            page.set(key, media.clone());
        }
    }
    Ok(doc)
}

/// Pull the CropBox in by a fixed margin to hide stray edge content.
#[instrument(skip_all)]
pub fn tighten_crop(mut doc: Document, ctx: &mut FixContext) -> Result<Document> {
    for (number, page_id) in doc.get_pages() {
        let visible = inherited(&doc, page_id, b"CropBox")
            .and_then(|crop| Rect::from_object(&doc, crop))
            .unwrap_or_else(|| effective_media_box(&doc, page_id));
        match visible.inset(CLEAN_INSET) {
            Some(crop) => {
                page_mut(&mut doc, page_id)?.set("CropBox", crop.to_object());
            }
            None => ctx.note(
                FixToken::Clean,
                format!("page {} is too small to inset; CropBox left unchanged", number),
            ),
        }
    }
    Ok(doc)
}

/// Draw registration-black trim marks at each TrimBox corner. The existing
/// content is isolated in `q ... Q` so its graphics state cannot leak.
#[instrument(skip_all)]
pub fn draw_trim_marks(mut doc: Document, _ctx: &mut FixContext) -> Result<Document> {
    for page_id in doc.get_pages().into_values() {
        let media = effective_media_box(&doc, page_id);
        let trim = page_rect(&doc, page_id, b"TrimBox").unwrap_or(media);
        let marks = mark_segments(&trim, &media);

        let mut operations = format!("Q\nq {} w 1 1 1 1 K\n", MARK_WIDTH);
        for [x0, y0, x1, y1] in marks {
            operations.push_str(&format!("{} {} m {} {} l S\n", x0, y0, x1, y1));
        }
        operations.push_str("Q\n");

        let mut existing = existing_contents(&doc, page_id);
        let open = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let close = doc.add_object(Stream::new(Dictionary::new(), operations.into_bytes()));
        let mut contents = vec![Object::Reference(open)];
        contents.append(&mut existing);
        contents.push(Object::Reference(close));
        page_mut(&mut doc, page_id)?.set("Contents", contents);
    }
    Ok(doc)
}

fn existing_contents(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    let Some(value) = doc.get_dictionary(page_id).ok().and_then(|page| page.get(b"Contents").ok()) else {
        return Vec::new();
    };
    match value {
        Object::Reference(_) => match resolve(doc, value) {
            Some(Object::Array(items)) => items.clone(),
            _ => vec![value.clone()],
        },
        Object::Array(items) => items.clone(),
        _ => Vec::new(),
    }
}

/// Eight segments `[x0 y0 x1 y1]`, two per trim corner. They point away
/// from the trim when the MediaBox has room for them, along the trim edges
/// inside the page otherwise.
pub(crate) fn mark_segments(trim: &Rect, media: &Rect) -> Vec<[f32; 4]> {
    let room = media.min_extension_beyond(trim);
    let outward = room >= MARK_OFFSET + MARK_LENGTH;
    let inward_length = MARK_LENGTH.min(trim.width() / 4.0).min(trim.height() / 4.0);

    let corners = [
        (trim.llx, trim.lly, -1.0, -1.0),
        (trim.urx, trim.lly, 1.0, -1.0),
        (trim.llx, trim.ury, -1.0, 1.0),
        (trim.urx, trim.ury, 1.0, 1.0),
    ];
    let mut segments = Vec::with_capacity(8);
    for (x, y, sx, sy) in corners {
        if outward {
            let (near, far) = (MARK_OFFSET, MARK_OFFSET + MARK_LENGTH);
            segments.push([x + sx * near, y, x + sx * far, y]);
            segments.push([x, y + sy * near, x, y + sy * far]);
        } else {
            segments.push([x, y, x - sx * inward_length, y]);
            segments.push([x, y, x, y - sy * inward_length]);
        }
    }
    segments
}
