// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Color-space scanner: tallies color-setting operators across every content
// stream reachable from each page, and samples total area coverage from the
// CMYK occurrences.
//
// Dominant color space is the category with the strictly highest share. Ties
// go to the first category in CMYK, RGB, Spot, Grayscale order. When nothing
// could be scanned the result is the conservative print default: CMYK
// dominant, no RGB, no ink coverage.

use std::collections::BTreeSet;

use preflight_core::color::calculate_tac;
use preflight_core::{AnalysisConfig, ColorModel, ColorSpaceAnalysis, ColorUsageTally, TacAnalysis};
use tracing::{debug, instrument, warn};

use super::Analysis;
use super::content::{decode, name_operand, numbers};
use crate::pdf::snapshot::{ColorSpaceKind, DocumentSnapshot, Resources};

/// Color and ink-coverage findings from one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScan {
    pub colors: ColorSpaceAnalysis,
    pub tac: TacAnalysis,
}

impl ColorScan {
    /// The fail-open default.
    pub fn conservative(limit: f64) -> Self {
        Self {
            colors: summarize(ColorUsageTally::default()),
            tac: summarize_tac(&[], limit),
        }
    }
}

/// One CMYK occurrence: page number and TAC in percent.
type TacSample = (u32, f64);

#[instrument(skip_all, fields(pages = snapshot.pages.len()))]
pub fn scan_colors(snapshot: &DocumentSnapshot, config: &AnalysisConfig) -> Analysis<ColorScan> {
    let mut tally = ColorUsageTally::default();
    let mut samples: Vec<TacSample> = Vec::new();

    for page in &snapshot.pages {
        let mut page_tally = ColorUsageTally::default();
        for index in snapshot.page_streams(page) {
            let stream = &snapshot.streams[index];
            let Some(bytes) = stream.bytes.as_deref() else {
                let reason = format!("page {}: content stream cannot be decoded", page.number);
                warn!(%reason, "Color scan degraded");
                return Analysis::Degraded {
                    value: ColorScan::conservative(config.tac_limit),
                    reason,
                };
            };
            if let Err(reason) =
                scan_stream(bytes, &stream.resources, page.number, &mut page_tally, &mut samples)
            {
                let reason = format!("page {}: {}", page.number, reason);
                warn!(%reason, "Color scan degraded");
                return Analysis::Degraded {
                    value: ColorScan::conservative(config.tac_limit),
                    reason,
                };
            }
        }
        debug!(page = page.number, operators = page_tally.total(), "Page colors tallied");
        tally.merge(&page_tally);
    }

    debug!(total = tally.total(), tac_samples = samples.len(), "Color scan complete");
    Analysis::Clean(ColorScan {
        tac: summarize_tac(&samples, config.tac_limit),
        colors: summarize(tally),
    })
}

fn scan_stream(
    bytes: &[u8],
    resources: &Resources,
    page: u32,
    tally: &mut ColorUsageTally,
    samples: &mut Vec<TacSample>,
) -> Result<(), String> {
    let mut fill = ColorSpaceKind::Gray;
    let mut stroke = ColorSpaceKind::Gray;
    let mut saved: Vec<(ColorSpaceKind, ColorSpaceKind)> = Vec::new();

    for operation in decode(bytes)? {
        let operands = &operation.operands;
        match operation.operator.as_str() {
            "q" => saved.push((fill.clone(), stroke.clone())),
            // An unbalanced Q keeps the current spaces.
            "Q" => {
                if let Some((saved_fill, saved_stroke)) = saved.pop() {
                    fill = saved_fill;
                    stroke = saved_stroke;
                }
            }
            "rg" | "RG" => record_components(&numbers(operands), page, tally, samples),
            "k" | "K" => record_components(&numbers(operands), page, tally, samples),
            "g" | "G" => record_components(&numbers(operands), page, tally, samples),
            "cs" => fill = lookup_space(name_operand(operands), resources),
            "CS" => stroke = lookup_space(name_operand(operands), resources),
            "sc" | "scn" => record_in_space(&fill, &numbers(operands), page, tally, samples),
            "SC" | "SCN" => record_in_space(&stroke, &numbers(operands), page, tally, samples),
            _ => {}
        }
    }
    Ok(())
}

fn lookup_space(name: Option<String>, resources: &Resources) -> ColorSpaceKind {
    let Some(name) = name else {
        return ColorSpaceKind::Other(String::new());
    };
    ColorSpaceKind::from_device_name(&name)
        .or_else(|| resources.color_spaces.get(&name).cloned())
        .unwrap_or(ColorSpaceKind::Other(name))
}

fn record_in_space(
    space: &ColorSpaceKind,
    values: &[f64],
    page: u32,
    tally: &mut ColorUsageTally,
    samples: &mut Vec<TacSample>,
) {
    match space {
        ColorSpaceKind::Spot(name) => *tally.spot.entry(name.clone()).or_insert(0) += 1,
        ColorSpaceKind::Pattern if values.is_empty() => {}
        _ => record_components(values, page, tally, samples),
    }
}

/// Classify by component count: 1 gray, 3 RGB, 4 CMYK.
fn record_components(
    values: &[f64],
    page: u32,
    tally: &mut ColorUsageTally,
    samples: &mut Vec<TacSample>,
) {
    match values {
        [gray] => *tally.gray.entry(format!("{:.2}", gray)).or_insert(0) += 1,
        [r, g, b] => {
            let key = format!("{},{},{}", to_byte(*r), to_byte(*g), to_byte(*b));
            *tally.rgb.entry(key).or_insert(0) += 1;
        }
        [c, m, y, k] => {
            let key = format!("{:.2},{:.2},{:.2},{:.2}", c, m, y, k);
            *tally.cmyk.entry(key).or_insert(0) += 1;
            let tac = (calculate_tac(*c, *m, *y, *k) * 100.0).round() / 100.0;
            samples.push((page, tac));
        }
        _ => {}
    }
}

fn to_byte(component: f64) -> u8 {
    (component.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Derive shares and the dominant color space from raw tallies.
pub fn summarize(tally: ColorUsageTally) -> ColorSpaceAnalysis {
    let rgb = tally.rgb_count();
    let cmyk = tally.cmyk_count();
    let gray = tally.gray_count();
    let spot = tally.spot_count();
    let total = tally.total();
    let share = |count: usize| {
        if total == 0 {
            0.0
        } else {
            count as f64 * 100.0 / total as f64
        }
    };

    ColorSpaceAnalysis {
        rgb_count: rgb,
        cmyk_count: cmyk,
        grayscale_count: gray,
        spot_count: spot,
        rgb_percentage: share(rgb),
        cmyk_percentage: share(cmyk),
        grayscale_percentage: share(gray),
        spot_percentage: share(spot),
        dominant_color_space: dominant(cmyk, rgb, spot, gray),
        has_rgb: rgb > 0,
        spot_colors: tally.spot.keys().cloned().collect(),
        tally,
    }
}

fn dominant(cmyk: usize, rgb: usize, spot: usize, gray: usize) -> ColorModel {
    let ranked = [
        (ColorModel::Cmyk, cmyk),
        (ColorModel::Rgb, rgb),
        (ColorModel::Spot, spot),
        (ColorModel::Grayscale, gray),
    ];
    let mut best = ranked[0];
    for candidate in &ranked[1..] {
        if candidate.1 > best.1 {
            best = *candidate;
        }
    }
    best.0
}

fn summarize_tac(samples: &[TacSample], limit: f64) -> TacAnalysis {
    let max_tac = samples.iter().map(|(_, tac)| *tac).fold(0.0, f64::max);
    let average_tac = if samples.is_empty() {
        0.0
    } else {
        samples.iter().map(|(_, tac)| tac).sum::<f64>() / samples.len() as f64
    };
    let affected_pages: BTreeSet<u32> = samples
        .iter()
        .filter(|(_, tac)| *tac > limit)
        .map(|(page, _)| *page)
        .collect();

    TacAnalysis {
        max_tac,
        average_tac,
        limit,
        exceeds_limit: max_tac > limit,
        affected_pages: affected_pages.into_iter().collect(),
        sample_count: samples.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{FixturePage, build_pdf};
    use lopdf::Object;

    fn scan(pages: &[FixturePage]) -> Analysis<ColorScan> {
        let snapshot = DocumentSnapshot::from_bytes(&build_pdf(pages)).unwrap();
        scan_colors(&snapshot, &AnalysisConfig::default())
    }

    #[test]
    fn rgb_operators_are_counted() {
        let result = scan(&[FixturePage::new(612.0, 792.0)
            .with_content("1 0 0 rg 0 0 10 10 re f 0 0 1 RG 0 0 0 1 k")]);
        let colors = &result.value().colors;
        assert!(!result.is_degraded());
        assert_eq!(colors.rgb_count, 2);
        assert_eq!(colors.cmyk_count, 1);
        assert!(colors.has_rgb);
        assert_eq!(colors.dominant_color_space, ColorModel::Rgb);
        assert_eq!(colors.tally.rgb.get("255,0,0"), Some(&1));
    }

    #[test]
    fn no_colors_defaults_to_cmyk() {
        let result = scan(&[FixturePage::new(612.0, 792.0).with_content("0 0 10 10 re S")]);
        let colors = &result.value().colors;
        assert_eq!(colors.dominant_color_space, ColorModel::Cmyk);
        assert_eq!(colors.rgb_percentage, 0.0);
        assert_eq!(colors.cmyk_percentage, 0.0);
    }

    #[test]
    fn ties_follow_policy_order() {
        assert_eq!(dominant(1, 1, 0, 0), ColorModel::Cmyk);
        assert_eq!(dominant(0, 2, 2, 0), ColorModel::Rgb);
        assert_eq!(dominant(0, 0, 3, 3), ColorModel::Spot);
        assert_eq!(dominant(0, 0, 0, 1), ColorModel::Grayscale);
        assert_eq!(dominant(0, 0, 0, 0), ColorModel::Cmyk);
    }

    #[test]
    fn separation_fills_are_tallied_as_spot() {
        let separation = Object::Array(vec![
            Object::Name(b"Separation".to_vec()),
            Object::Name(b"PANTONE 185 C".to_vec()),
            Object::Name(b"DeviceCMYK".to_vec()),
            Object::Null,
        ]);
        let result = scan(&[FixturePage::new(612.0, 792.0)
            .with_color_space("CS0", separation)
            .with_content("/CS0 cs 1 scn 0 0 10 10 re f")]);
        let colors = &result.value().colors;
        assert_eq!(colors.spot_count, 1);
        assert_eq!(colors.spot_colors, vec!["PANTONE 185 C".to_string()]);
        assert_eq!(colors.dominant_color_space, ColorModel::Spot);
    }

    #[test]
    fn device_spaces_via_scn_use_operand_count() {
        let result = scan(&[FixturePage::new(612.0, 792.0)
            .with_content("/DeviceRGB cs 0.2 0.4 0.6 sc /DeviceCMYK CS 0 1 0 0 SC")]);
        let colors = &result.value().colors;
        assert_eq!(colors.rgb_count, 1);
        assert_eq!(colors.cmyk_count, 1);
    }

    #[test]
    fn restore_returns_to_the_outer_color_space() {
        let separation = Object::Array(vec![
            Object::Name(b"Separation".to_vec()),
            Object::Name(b"PANTONE 185 C".to_vec()),
            Object::Name(b"DeviceCMYK".to_vec()),
            Object::Null,
        ]);
        let result = scan(&[FixturePage::new(612.0, 792.0)
            .with_color_space("CS0", separation)
            .with_content("q /CS0 cs 1 scn /CS0 CS 1 SCN Q 0.5 sc 0.25 SC 0 0 10 10 re B")]);
        let colors = &result.value().colors;
        assert_eq!(colors.spot_count, 2);
        assert_eq!(colors.grayscale_count, 2);
        assert_eq!(colors.tally.gray.get("0.50"), Some(&1));
        assert_eq!(colors.tally.gray.get("0.25"), Some(&1));
    }

    #[test]
    fn unbalanced_restore_keeps_current_space() {
        let result = scan(&[FixturePage::new(612.0, 792.0)
            .with_content("/DeviceRGB cs Q 0.2 0.4 0.6 sc")]);
        assert_eq!(result.value().colors.rgb_count, 1);
    }

    #[test]
    fn tallies_add_up_across_pages() {
        let result = scan(&[
            FixturePage::new(612.0, 792.0).with_content("1 0 0 rg 0 0 0 1 k"),
            FixturePage::new(612.0, 792.0).with_content("1 0 0 rg 0.5 g"),
        ]);
        let colors = &result.value().colors;
        assert_eq!(colors.tally.rgb.get("255,0,0"), Some(&2));
        assert_eq!(colors.rgb_count, 2);
        assert_eq!(colors.cmyk_count, 1);
        assert_eq!(colors.grayscale_count, 1);
    }

    #[test]
    fn forms_are_scanned() {
        let result = scan(&[FixturePage::new(612.0, 792.0)
            .with_form("0 1 0 rg")
            .with_content("/Fm0 Do")]);
        assert_eq!(result.value().colors.rgb_count, 1);
    }

    #[test]
    fn tac_samples_track_limit() {
        let result = scan(&[
            FixturePage::new(612.0, 792.0).with_content("1 1 1 1 k"),
            FixturePage::new(612.0, 792.0).with_content("0 0 0 1 k"),
        ]);
        let tac = &result.value().tac;
        assert_eq!(tac.max_tac, 400.0);
        assert_eq!(tac.average_tac, 250.0);
        assert!(tac.exceeds_limit);
        assert_eq!(tac.affected_pages, vec![1]);
        assert_eq!(tac.sample_count, 2);
    }

    #[test]
    fn undecodable_stream_degrades_to_default() {
        let result = scan(&[FixturePage::new(612.0, 792.0)
            .with_raw_content(b"1 0 0 rg".to_vec(), "JBIG2Decode")]);
        assert!(result.is_degraded());
        let value = result.value();
        assert_eq!(value.colors.dominant_color_space, ColorModel::Cmyk);
        assert!(!value.colors.has_rgb);
        assert_eq!(value.tac.max_tac, 0.0);
    }
}
