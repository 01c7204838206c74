// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transparency analyzer. Flattening is always recommended once any
// transparency is present; blend modes are not judged individually.

use std::collections::BTreeSet;

use preflight_core::TransparencyAnalysis;
use tracing::{debug, instrument};

use crate::pdf::snapshot::{DocumentSnapshot, XObjectTarget};

/// Blend modes that composite opaquely.
const OPAQUE_BLEND_MODES: [&str; 2] = ["Normal", "Compatible"];

#[instrument(skip_all, fields(pages = snapshot.pages.len()))]
pub fn analyze_transparency(snapshot: &DocumentSnapshot) -> TransparencyAnalysis {
    let mut blend_modes = BTreeSet::new();
    let mut affected_pages = Vec::new();
    let mut soft_mask_count = 0;
    let mut transparency_group_count = 0;

    for page in &snapshot.pages {
        let mut transparent = false;
        if page.transparency_group {
            transparency_group_count += 1;
            transparent = true;
        }

        let mut masked_images = BTreeSet::new();
        for index in snapshot.page_streams(page) {
            let stream = &snapshot.streams[index];
            if index != page.content && stream.transparency_group {
                transparency_group_count += 1;
                transparent = true;
            }
            for state in stream.resources.ext_gstates.values() {
                if state.soft_mask {
                    soft_mask_count += 1;
                    transparent = true;
                }
                if let Some(mode) = &state.blend_mode
                    && !OPAQUE_BLEND_MODES.contains(&mode.as_str())
                {
                    blend_modes.insert(mode.clone());
                    transparent = true;
                }
                let translucent = |alpha: Option<f32>| alpha.is_some_and(|a| a < 1.0);
                if translucent(state.fill_alpha) || translucent(state.stroke_alpha) {
                    transparent = true;
                }
            }
            for target in stream.resources.xobjects.values() {
                if let XObjectTarget::Image(image) = target
                    && snapshot.images[*image].soft_mask
                {
                    masked_images.insert(*image);
                }
            }
        }
        if !masked_images.is_empty() {
            soft_mask_count += masked_images.len();
            transparent = true;
        }
        if transparent {
            affected_pages.push(page.number);
        }
    }

    let has_transparency = !affected_pages.is_empty();
    debug!(has_transparency, pages = affected_pages.len(), "Transparency analysis complete");
    TransparencyAnalysis {
        has_transparency,
        needs_flattening: has_transparency,
        blend_modes: blend_modes.into_iter().collect(),
        affected_pages,
        soft_mask_count,
        transparency_group_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{FixtureImage, FixturePage, build_pdf};
    use lopdf::{Object, dictionary};

    fn analyze(pages: &[FixturePage]) -> TransparencyAnalysis {
        let snapshot = DocumentSnapshot::from_bytes(&build_pdf(pages)).unwrap();
        analyze_transparency(&snapshot)
    }

    #[test]
    fn opaque_document_needs_no_flattening() {
        let result = analyze(&[FixturePage::new(612.0, 792.0)
            .with_ext_gstate(dictionary! { "BM" => "Normal", "ca" => Object::Integer(1) })]);
        assert!(!result.has_transparency);
        assert!(!result.needs_flattening);
        assert!(result.blend_modes.is_empty());
    }

    #[test]
    fn blend_modes_are_collected() {
        let result = analyze(&[
            FixturePage::new(612.0, 792.0),
            FixturePage::new(612.0, 792.0)
                .with_ext_gstate(dictionary! { "BM" => "Multiply" })
                .with_ext_gstate(dictionary! { "BM" => "Screen" }),
        ]);
        assert!(result.has_transparency);
        assert!(result.needs_flattening);
        assert_eq!(result.blend_modes, vec!["Multiply".to_string(), "Screen".to_string()]);
        assert_eq!(result.affected_pages, vec![2]);
    }

    #[test]
    fn groups_alpha_and_masks_are_detected() {
        let result = analyze(&[
            FixturePage::new(612.0, 792.0).with_transparency_group(),
            FixturePage::new(612.0, 792.0).with_ext_gstate(dictionary! { "ca" => 0.5f32 }),
            FixturePage::new(612.0, 792.0).with_image(FixtureImage::rgb(4, 4).with_soft_mask()),
        ]);
        assert_eq!(result.affected_pages, vec![1, 2, 3]);
        assert_eq!(result.transparency_group_count, 1);
        assert_eq!(result.soft_mask_count, 1);
    }
}
