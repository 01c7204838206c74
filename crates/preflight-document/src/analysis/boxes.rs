// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page-box validation. MediaBox is required; TrimBox and BleedBox are
// required for print. MediaBox and CropBox may be inherited from the page
// tree, TrimBox and BleedBox may not.

use preflight_core::BoxRecord;
use tracing::instrument;

use crate::pdf::geometry::Rect;
use crate::pdf::snapshot::{DocumentSnapshot, PageSnapshot};

/// Slack for containment checks, in points.
const TOLERANCE: f32 = 0.01;

#[instrument(skip_all, fields(pages = snapshot.pages.len()))]
pub fn validate_boxes(snapshot: &DocumentSnapshot) -> Vec<BoxRecord> {
    snapshot.pages.iter().map(validate_page).collect()
}

pub fn validate_page(page: &PageSnapshot) -> BoxRecord {
    let mut issues = Vec::new();
    let boxes = [
        ("MediaBox", page.media_box),
        ("CropBox", page.crop_box),
        ("TrimBox", page.trim_box),
        ("BleedBox", page.bleed_box),
    ];
    for (name, rect) in boxes {
        match rect {
            None if name != "CropBox" => issues.push(format!("{} is missing", name)),
            Some(rect) if rect.is_degenerate() => issues.push(format!("{} has no area", name)),
            _ => {}
        }
    }

    if let (Some(trim), Some(bleed)) = (page.trim_box, page.bleed_box)
        && !bleed.contains(&trim, TOLERANCE)
    {
        issues.push("TrimBox extends beyond BleedBox".into());
    }
    if let (Some(bleed), Some(media)) = (page.bleed_box, page.media_box)
        && !media.contains(&bleed, TOLERANCE)
    {
        issues.push("BleedBox extends beyond MediaBox".into());
    }

    BoxRecord {
        page: page.number,
        has_media_box: page.media_box.is_some(),
        has_crop_box: page.crop_box.is_some(),
        has_trim_box: page.trim_box.is_some(),
        has_bleed_box: page.bleed_box.is_some(),
        media_box: page.media_box.map(Rect::to_array),
        crop_box: page.crop_box.map(Rect::to_array),
        trim_box: page.trim_box.map(Rect::to_array),
        bleed_box: page.bleed_box.map(Rect::to_array),
        bleed_size: bleed_size(page.trim_box, page.bleed_box),
        is_valid: issues.is_empty(),
        issues,
    }
}

/// Smallest outward extension of the bleed beyond the trim, never negative.
fn bleed_size(trim: Option<Rect>, bleed: Option<Rect>) -> f32 {
    match (trim, bleed) {
        (Some(trim), Some(bleed)) => {
            let size = bleed.min_extension_beyond(&trim).max(0.0);
            (size * 100.0).round() / 100.0
        }
        _ => 0.0,
    }
}
