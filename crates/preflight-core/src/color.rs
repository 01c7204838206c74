// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Color math for print production: RGB/CMYK conversion, total area coverage,
// black classification and approximate spot-color lookup.
//
// The conversions are the naive device formulas used for preflight estimates.
// They are not colorimetric and carry no ICC profile.

use serde::{Deserialize, Serialize};

use crate::error::{PreflightError, Result};
use crate::types::ColorModel;

/// Process color with each channel in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cmyk {
    pub c: f64,
    pub m: f64,
    pub y: f64,
    pub k: f64,
}

impl Cmyk {
    /// Build a CMYK value, rejecting channels outside `[0, 1]`.
    pub fn new(c: f64, m: f64, y: f64, k: f64) -> Result<Self> {
        if !validate_cmyk(c, m, y, k) {
            return Err(PreflightError::InvalidColor(format!(
                "CMYK channels must be within 0..=1, got ({c}, {m}, {y}, {k})"
            )));
        }
        Ok(Self { c, m, y, k })
    }

    pub const BLACK: Cmyk = Cmyk {
        c: 0.0,
        m: 0.0,
        y: 0.0,
        k: 1.0,
    };

    /// Total area coverage of this color, in percent.
    pub fn tac(&self) -> f64 {
        calculate_tac(self.c, self.m, self.y, self.k)
    }

    /// Multiply every channel by `tint` (a Separation tint in `[0, 1]`).
    pub fn tinted(&self, tint: f64) -> Self {
        let tint = tint.clamp(0.0, 1.0);
        Self {
            c: self.c * tint,
            m: self.m * tint,
            y: self.y * tint,
            k: self.k * tint,
        }
    }
}

/// 8-bit device RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build from wider integers, rejecting components outside `[0, 255]`.
    pub fn from_ints(r: i64, g: i64, b: i64) -> Result<Self> {
        if !validate_rgb(r, g, b) {
            return Err(PreflightError::InvalidColor(format!(
                "RGB components must be within 0..=255, got ({r}, {g}, {b})"
            )));
        }
        Ok(Self {
            r: r as u8,
            g: g as u8,
            b: b as u8,
        })
    }
}

// -- Conversion ---------------------------------------------------------------

/// Convert device RGB to CMYK.
///
/// Pure black short-circuits to `{0, 0, 0, 1}` so the chromatic channels never
/// divide by zero.
pub fn rgb_to_cmyk(r: u8, g: u8, b: u8) -> Cmyk {
    let (r, g, b) = (r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0);
    let k = 1.0 - r.max(g).max(b);
    if k >= 1.0 {
        return Cmyk::BLACK;
    }
    Cmyk {
        c: (1.0 - r - k) / (1.0 - k),
        m: (1.0 - g - k) / (1.0 - k),
        y: (1.0 - b - k) / (1.0 - k),
        k,
    }
}

/// Convert CMYK back to device RGB. Always yields a valid triple for in-range
/// input; out-of-range input is clamped by the final rounding.
pub fn cmyk_to_rgb(c: f64, m: f64, y: f64, k: f64) -> Rgb {
    let channel = |v: f64| (255.0 * (1.0 - v) * (1.0 - k)).round().clamp(0.0, 255.0) as u8;
    Rgb {
        r: channel(c),
        g: channel(m),
        b: channel(y),
    }
}

/// Parse `#RRGGBB` or `RRGGBB` and convert to CMYK.
pub fn hex_to_cmyk(hex: &str) -> Result<Cmyk> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(PreflightError::InvalidColor(format!(
            "expected 6 hex digits, got {hex:?}"
        )));
    }
    let component = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16)
            .map_err(|err| PreflightError::InvalidColor(format!("{hex:?}: {err}")))
    };
    Ok(rgb_to_cmyk(component(0..2)?, component(2..4)?, component(4..6)?))
}

/// Convert CMYK to an uppercase `#RRGGBB` string.
pub fn cmyk_to_hex(c: f64, m: f64, y: f64, k: f64) -> String {
    let rgb = cmyk_to_rgb(c, m, y, k);
    format!("#{:02X}{:02X}{:02X}", rgb.r, rgb.g, rgb.b)
}

// -- Total area coverage ------------------------------------------------------

/// Sum of the four inks in percent, `0..=400` for valid input.
pub fn calculate_tac(c: f64, m: f64, y: f64, k: f64) -> f64 {
    (c + m + y + k) * 100.0
}

/// Scale all four channels uniformly so coverage does not exceed `max_tac`.
///
/// Channel ratios are preserved. Colors already at or under the limit,
/// including paper white, come back unchanged.
pub fn reduce_tac(c: f64, m: f64, y: f64, k: f64, max_tac: f64) -> Cmyk {
    let total = c + m + y + k;
    if total <= 0.0 || calculate_tac(c, m, y, k) <= max_tac {
        return Cmyk { c, m, y, k };
    }
    let factor = (max_tac / 100.0) / total;
    Cmyk {
        c: c * factor,
        m: m * factor,
        y: y * factor,
        k: k * factor,
    }
}

// -- Classification -----------------------------------------------------------

/// Infer the color model from the number of color components.
pub fn detect_color_space(values: &[f64]) -> ColorModel {
    match values.len() {
        0 => ColorModel::Unknown,
        1 => ColorModel::Grayscale,
        3 => ColorModel::Rgb,
        4 => ColorModel::Cmyk,
        n if n > 4 => ColorModel::DeviceN,
        // Two components match no device space.
        _ => ColorModel::Unknown,
    }
}

/// Heavy black built with supporting chromatic ink.
pub fn is_rich_black(c: f64, m: f64, y: f64, k: f64) -> bool {
    k > 0.5 && (c > 0.0 || m > 0.0 || y > 0.0)
}

/// Black carried (almost) entirely by the K plate.
pub fn is_pure_black(c: f64, m: f64, y: f64, k: f64) -> bool {
    k > 0.9 && c < 0.1 && m < 0.1 && y < 0.1
}

pub fn validate_rgb(r: i64, g: i64, b: i64) -> bool {
    [r, g, b].iter().all(|v| (0..=255).contains(v))
}

pub fn validate_cmyk(c: f64, m: f64, y: f64, k: f64) -> bool {
    [c, m, y, k].iter().all(|v| (0.0..=1.0).contains(v))
}

// -- Spot colors --------------------------------------------------------------

/// Approximate process builds for common named inks.
///
/// These are published coated-stock approximations, good enough to preview a
/// separation or estimate coverage. They are not a substitute for a
/// colorimetric conversion.
const SPOT_TABLE: &[(&str, [f64; 4])] = &[
    ("pantone 032 c", [0.0, 0.90, 0.86, 0.0]),
    ("pantone 072 c", [1.0, 0.88, 0.0, 0.05]),
    ("pantone 109 c", [0.0, 0.10, 1.0, 0.0]),
    ("pantone 185 c", [0.0, 0.91, 0.76, 0.0]),
    ("pantone 186 c", [0.02, 1.0, 0.85, 0.06]),
    ("pantone 286 c", [1.0, 0.66, 0.0, 0.02]),
    ("pantone 300 c", [0.99, 0.50, 0.0, 0.0]),
    ("pantone 347 c", [0.99, 0.0, 1.0, 0.0]),
    ("pantone 354 c", [0.80, 0.0, 0.90, 0.0]),
    ("pantone 485 c", [0.0, 0.95, 1.0, 0.0]),
    ("pantone 021 c", [0.0, 0.53, 1.0, 0.0]),
    ("pantone black c", [0.0, 0.13, 0.49, 0.98]),
    ("pantone cool gray 11 c", [0.44, 0.34, 0.22, 0.77]),
    ("pantone process blue c", [1.0, 0.13, 0.01, 0.02]),
    ("pantone process yellow c", [0.0, 0.0, 1.0, 0.0]),
    ("pantone reflex blue c", [1.0, 0.73, 0.0, 0.02]),
    ("pantone rubine red c", [0.0, 1.0, 0.15, 0.04]),
    ("pantone warm red c", [0.0, 0.75, 0.90, 0.0]),
    ("cyan", [1.0, 0.0, 0.0, 0.0]),
    ("magenta", [0.0, 1.0, 0.0, 0.0]),
    ("yellow", [0.0, 0.0, 1.0, 0.0]),
    ("black", [0.0, 0.0, 0.0, 1.0]),
    ("all", [1.0, 1.0, 1.0, 1.0]),
    ("white", [0.0, 0.0, 0.0, 0.0]),
    ("gold", [0.0, 0.20, 0.60, 0.20]),
    ("silver", [0.0, 0.0, 0.0, 0.30]),
];

/// Look up an approximate CMYK build for a named spot color.
///
/// Names are matched case-insensitively with runs of whitespace collapsed.
/// Unknown names fall back to solid black; this is an approximation, not a
/// colorimetric result.
pub fn spot_to_cmyk(name: &str) -> Cmyk {
    let normalized = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase();
    SPOT_TABLE
        .iter()
        .find(|(key, _)| *key == normalized)
        .map(|(_, [c, m, y, k])| Cmyk {
            c: *c,
            m: *m,
            y: *y,
            k: *k,
        })
        .unwrap_or(Cmyk::BLACK)
}

/// Whether a spot name is present in the lookup table.
pub fn is_known_spot(name: &str) -> bool {
    let normalized = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase();
    SPOT_TABLE.iter().any(|(key, _)| *key == normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() <= tolerance
    }

    #[test]
    fn rgb_round_trip_is_stable_within_rounding() {
        for r in (0..=255u16).step_by(15) {
            for g in (0..=255u16).step_by(15) {
                for b in (0..=255u16).step_by(15) {
                    let cmyk = rgb_to_cmyk(r as u8, g as u8, b as u8);
                    let back = cmyk_to_rgb(cmyk.c, cmyk.m, cmyk.y, cmyk.k);
                    assert!((back.r as i16 - r as i16).abs() <= 1, "r for {r},{g},{b}");
                    assert!((back.g as i16 - g as i16).abs() <= 1, "g for {r},{g},{b}");
                    assert!((back.b as i16 - b as i16).abs() <= 1, "b for {r},{g},{b}");
                }
            }
        }
    }

    #[test]
    fn pure_black_short_circuits() {
        assert_eq!(rgb_to_cmyk(0, 0, 0), Cmyk::BLACK);
    }

    #[test]
    fn primaries_convert_as_expected() {
        let red = rgb_to_cmyk(255, 0, 0);
        assert_eq!((red.c, red.m, red.y, red.k), (0.0, 1.0, 1.0, 0.0));
        let white = rgb_to_cmyk(255, 255, 255);
        assert_eq!((white.c, white.m, white.y, white.k), (0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn tac_is_sum_of_inks() {
        assert!(close(calculate_tac(0.5, 0.5, 0.5, 0.5), 200.0, 1e-9));
        assert!(close(calculate_tac(1.0, 1.0, 1.0, 1.0), 400.0, 1e-9));
        assert!(close(calculate_tac(0.0, 0.0, 0.0, 0.0), 0.0, 1e-9));
    }

    #[test]
    fn reduce_tac_scales_to_limit_preserving_ratios() {
        let reduced = reduce_tac(1.0, 1.0, 1.0, 1.0, 300.0);
        assert!(close(reduced.tac(), 300.0, 0.1));
        assert_eq!(reduced.c, reduced.m);
        assert_eq!(reduced.m, reduced.y);
        assert_eq!(reduced.y, reduced.k);
    }

    #[test]
    fn reduce_tac_leaves_compliant_colors_alone() {
        let same = reduce_tac(0.5, 0.5, 0.5, 0.5, 300.0);
        assert_eq!(same, Cmyk { c: 0.5, m: 0.5, y: 0.5, k: 0.5 });
        let white = reduce_tac(0.0, 0.0, 0.0, 0.0, 0.0);
        assert_eq!(white, Cmyk { c: 0.0, m: 0.0, y: 0.0, k: 0.0 });
    }

    #[test]
    fn detect_color_space_by_arity() {
        assert_eq!(detect_color_space(&[]), ColorModel::Unknown);
        assert_eq!(detect_color_space(&[128.0]), ColorModel::Grayscale);
        assert_eq!(detect_color_space(&[255.0, 128.0, 64.0]), ColorModel::Rgb);
        assert_eq!(detect_color_space(&[0.5, 0.5, 0.5, 0.5]), ColorModel::Cmyk);
        assert_eq!(
            detect_color_space(&[1.0, 2.0, 3.0, 4.0, 5.0]),
            ColorModel::DeviceN
        );
    }

    #[test]
    fn black_classification() {
        assert!(is_pure_black(0.0, 0.0, 0.0, 1.0));
        assert!(!is_pure_black(0.2, 0.2, 0.2, 0.8));
        assert!(is_rich_black(0.2, 0.2, 0.2, 0.8));
        assert!(!is_rich_black(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn validation_bounds_are_inclusive() {
        assert!(!validate_rgb(256, 0, 0));
        assert!(validate_rgb(255, 0, 0));
        assert!(!validate_cmyk(-0.1, 0.0, 0.0, 0.0));
        assert!(validate_cmyk(0.5, 0.5, 0.5, 0.5));
        assert!(validate_cmyk(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn constructors_reject_out_of_range() {
        assert!(Cmyk::new(1.2, 0.0, 0.0, 0.0).is_err());
        assert!(Rgb::from_ints(0, -1, 0).is_err());
        assert_eq!(Rgb::from_ints(1, 2, 3).unwrap(), Rgb::new(1, 2, 3));
    }

    #[test]
    fn hex_conversion_accepts_optional_hash() {
        let with = hex_to_cmyk("#FF0000").unwrap();
        let without = hex_to_cmyk("ff0000").unwrap();
        assert_eq!(with, without);
        assert_eq!(cmyk_to_hex(with.c, with.m, with.y, with.k), "#FF0000");
        assert!(hex_to_cmyk("#FF00").is_err());
        assert!(hex_to_cmyk("GG0000").is_err());
    }

    #[test]
    fn spot_lookup_normalizes_names_and_falls_back_to_black() {
        let reflex = spot_to_cmyk("  PANTONE   Reflex Blue C ");
        assert_eq!(reflex.c, 1.0);
        assert!(is_known_spot("pantone 185 c"));
        assert_eq!(spot_to_cmyk("Corporate Teal 2"), Cmyk::BLACK);
        assert!(!is_known_spot("Corporate Teal 2"));
    }

    #[test]
    fn tint_scales_spot_build() {
        let half = spot_to_cmyk("Magenta").tinted(0.5);
        assert_eq!(half, Cmyk { c: 0.0, m: 0.5, y: 0.0, k: 0.0 });
    }
}
