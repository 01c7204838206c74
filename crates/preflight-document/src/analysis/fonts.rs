// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font analyzer: embedding, subsetting and type of every font used, merged by
// name across pages.

use std::collections::BTreeSet;

use preflight_core::{FontRecord, FontType};
use tracing::{debug, instrument};

use crate::pdf::snapshot::DocumentSnapshot;

#[instrument(skip_all, fields(fonts = snapshot.fonts.len()))]
pub fn analyze_fonts(snapshot: &DocumentSnapshot) -> Vec<FontRecord> {
    let mut records: Vec<FontRecord> = Vec::new();
    let mut pages: Vec<BTreeSet<u32>> = Vec::new();

    for page in &snapshot.pages {
        for stream in snapshot.page_streams(page) {
            for font_index in &snapshot.streams[stream].resources.fonts {
                let font = &snapshot.fonts[*font_index];
                let slot = match records.iter().position(|r| r.name == font.base_font) {
                    Some(slot) => slot,
                    None => {
                        records.push(FontRecord {
                            name: font.base_font.clone(),
                            font_type: classify_font_type(&font.subtype),
                            is_embedded: font.embedded,
                            is_subset: is_subset_name(&font.base_font),
                            usage_count: 0,
                            pages: Vec::new(),
                        });
                        pages.push(BTreeSet::new());
                        records.len() - 1
                    }
                };
                // One unembedded instance is enough to fail output.
                records[slot].is_embedded &= font.embedded;
                pages[slot].insert(page.number);
            }
        }
    }

    for (record, used_on) in records.iter_mut().zip(pages) {
        record.usage_count = used_on.len();
        record.pages = used_on.into_iter().collect();
    }
    debug!(unique = records.len(), "Font analysis complete");
    records
}

pub fn are_all_fonts_embedded(fonts: &[FontRecord]) -> bool {
    fonts.iter().all(|font| font.is_embedded)
}

/// Six uppercase ASCII letters followed by `+`.
pub fn is_subset_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() > 7 && bytes[6] == b'+' && bytes[..6].iter().all(u8::is_ascii_uppercase)
}

pub fn classify_font_type(subtype: &str) -> FontType {
    let lower = subtype.to_ascii_lowercase();
    [
        ("truetype", FontType::TrueType),
        ("type1", FontType::Type1),
        ("type3", FontType::Type3),
        ("cidfont", FontType::CidFont),
        ("opentype", FontType::OpenType),
    ]
    .into_iter()
    .find(|(needle, _)| lower.contains(needle))
    .map_or(FontType::Unknown, |(_, kind)| kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{FixtureFont, FixturePage, build_pdf};

    #[test]
    fn subset_prefix_detection() {
        assert!(is_subset_name("ABCDEF+Minion-Regular"));
        assert!(!is_subset_name("AbCDEF+Minion"));
        assert!(!is_subset_name("ABCDE+Minion"));
        assert!(!is_subset_name("Helvetica"));
        assert!(!is_subset_name("ABCDEF+"));
    }

    #[test]
    fn font_type_matching_is_case_insensitive() {
        assert_eq!(classify_font_type("TrueType"), FontType::TrueType);
        assert_eq!(classify_font_type("MMType1"), FontType::Type1);
        assert_eq!(classify_font_type("CIDFontType0"), FontType::CidFont);
        assert_eq!(classify_font_type("OpenType"), FontType::OpenType);
        assert_eq!(classify_font_type("Type3"), FontType::Type3);
        assert_eq!(classify_font_type("Bitmap"), FontType::Unknown);
    }

    #[test]
    fn fonts_merge_by_name_across_pages() {
        let bytes = build_pdf(&[
            FixturePage::new(612.0, 792.0).with_font(FixtureFont::standard("Helvetica")),
            FixturePage::new(612.0, 792.0).with_font(FixtureFont::embedded("ABCDEF+Minion")),
            FixturePage::new(612.0, 792.0).with_font(FixtureFont::standard("Helvetica")),
        ]);
        let snapshot = DocumentSnapshot::from_bytes(&bytes).unwrap();
        let fonts = analyze_fonts(&snapshot);
        assert_eq!(fonts.len(), 2);

        let helvetica = &fonts[0];
        assert_eq!(helvetica.name, "Helvetica");
        assert_eq!(helvetica.font_type, FontType::Type1);
        assert!(!helvetica.is_embedded);
        assert_eq!(helvetica.usage_count, 2);
        assert_eq!(helvetica.pages, vec![1, 3]);

        let minion = &fonts[1];
        assert!(minion.is_embedded);
        assert!(minion.is_subset);
        assert_eq!(minion.font_type, FontType::TrueType);
        assert!(!are_all_fonts_embedded(&fonts));
        assert!(are_all_fonts_embedded(&fonts[1..]));
    }

    #[test]
    fn type3_fonts_count_as_embedded() {
        let bytes = build_pdf(&[FixturePage::new(612.0, 792.0).with_font(FixtureFont::Type3("Glyphs".into()))]);
        let snapshot = DocumentSnapshot::from_bytes(&bytes).unwrap();
        let fonts = analyze_fonts(&snapshot);
        assert_eq!(fonts[0].font_type, FontType::Type3);
        assert!(fonts[0].is_embedded);
    }

    #[test]
    fn no_fonts_means_all_embedded() {
        assert!(are_all_fonts_embedded(&[]));
    }
}
