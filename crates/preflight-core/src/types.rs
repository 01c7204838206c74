// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Domain types for preflight reports and fix operations.
//
// Field names serialize in camelCase; the report shape is consumed by
// downstream services and must stay stable.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// -- Vocabulary ---------------------------------------------------------------

/// Closed set of color models the engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorModel {
    #[serde(rename = "CMYK")]
    Cmyk,
    #[serde(rename = "RGB")]
    Rgb,
    Grayscale,
    Indexed,
    DeviceN,
    Spot,
    Unknown,
}

impl std::fmt::Display for ColorModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Cmyk => "CMYK",
            Self::Rgb => "RGB",
            Self::Grayscale => "Grayscale",
            Self::Indexed => "Indexed",
            Self::DeviceN => "DeviceN",
            Self::Spot => "Spot",
            Self::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// PDF/X conformance levels the engine can report or stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PdfxStandard {
    #[serde(rename = "PDF/X-1a")]
    X1a,
    #[serde(rename = "PDF/X-3")]
    X3,
    #[serde(rename = "PDF/X-4")]
    X4,
    None,
}

impl PdfxStandard {
    /// Value written to `/GTS_PDFXVersion` in the Info dictionary.
    pub fn gts_version(&self) -> Option<&'static str> {
        match self {
            Self::X1a => Some("PDF/X-1a:2003"),
            Self::X3 => Some("PDF/X-3:2003"),
            Self::X4 => Some("PDF/X-4"),
            Self::None => None,
        }
    }

    /// Parse a `/GTS_PDFXVersion` value, ignoring the year suffix.
    pub fn from_gts_version(version: &str) -> Self {
        let trimmed = version.trim();
        let family = trimmed.split(':').next().unwrap_or(trimmed);
        match family {
            "PDF/X-1a" | "PDF/X-1" => Self::X1a,
            "PDF/X-3" => Self::X3,
            "PDF/X-4" | "PDF/X-4p" => Self::X4,
            _ => Self::None,
        }
    }
}

impl std::fmt::Display for PdfxStandard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::X1a => "PDF/X-1a",
            Self::X3 => "PDF/X-3",
            Self::X4 => "PDF/X-4",
            Self::None => "None",
        };
        f.write_str(label)
    }
}

/// Operation tokens understood by the fix pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixToken {
    Cmyk,
    Fonts,
    Resample,
    Bleed,
    Boxes,
    Marks,
    Split,
    Scale,
    Clean,
    Reorder,
    Normalize,
    Flatten,
    Tac,
    SpotToCmyk,
    OutlineFonts,
    Pdfx,
}

impl FixToken {
    pub const ALL: [FixToken; 16] = [
        Self::Cmyk,
        Self::Fonts,
        Self::Resample,
        Self::Bleed,
        Self::Boxes,
        Self::Marks,
        Self::Split,
        Self::Scale,
        Self::Clean,
        Self::Reorder,
        Self::Normalize,
        Self::Flatten,
        Self::Tac,
        Self::SpotToCmyk,
        Self::OutlineFonts,
        Self::Pdfx,
    ];

    /// Wire name of the token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cmyk => "cmyk",
            Self::Fonts => "fonts",
            Self::Resample => "resample",
            Self::Bleed => "bleed",
            Self::Boxes => "boxes",
            Self::Marks => "marks",
            Self::Split => "split",
            Self::Scale => "scale",
            Self::Clean => "clean",
            Self::Reorder => "reorder",
            Self::Normalize => "normalize",
            Self::Flatten => "flatten",
            Self::Tac => "tac",
            Self::SpotToCmyk => "spot-to-cmyk",
            Self::OutlineFonts => "outline-fonts",
            Self::Pdfx => "pdfx",
        }
    }

    /// Parse a wire token. Matching is exact, including case and
    /// whitespace; anything else is not a token and the caller skips it.
    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == token)
    }

    /// Whether the operation hands back a new document instead of mutating
    /// the one it was given.
    pub fn replaces_document(&self) -> bool {
        matches!(self, Self::Split | Self::Scale)
    }
}

impl std::fmt::Display for FixToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- Findings -----------------------------------------------------------------

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Error,
    Warning,
}

/// Priority of a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Area of the document a finding concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueCategory {
    Color,
    Image,
    Font,
    Transparency,
    Tac,
    Compliance,
    Boxes,
}

/// A single issue or warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub severity: Severity,
    pub category: IssueCategory,
    pub message: String,
    pub page: Option<u32>,
    pub auto_fix_available: bool,
    pub fix_type: Option<FixToken>,
}

/// Suggested next step derived from the issue list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub priority: Priority,
    pub category: IssueCategory,
    pub message: String,
    pub fix_type: Option<FixToken>,
}

// -- Analyzer outputs ---------------------------------------------------------

/// Raw color operator occurrences keyed by their formatted value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorUsageTally {
    /// `"r,g,b"` with 0-255 components.
    pub rgb: BTreeMap<String, usize>,
    /// `"c,m,y,k"` with two-decimal components.
    pub cmyk: BTreeMap<String, usize>,
    /// Two-decimal gray level.
    pub gray: BTreeMap<String, usize>,
    /// Separation/DeviceN colorant name.
    pub spot: BTreeMap<String, usize>,
}

impl ColorUsageTally {
    pub fn rgb_count(&self) -> usize {
        self.rgb.values().sum()
    }

    pub fn cmyk_count(&self) -> usize {
        self.cmyk.values().sum()
    }

    pub fn gray_count(&self) -> usize {
        self.gray.values().sum()
    }

    pub fn spot_count(&self) -> usize {
        self.spot.values().sum()
    }

    pub fn total(&self) -> usize {
        self.rgb_count() + self.cmyk_count() + self.gray_count() + self.spot_count()
    }

    /// Fold another tally into this one.
    pub fn merge(&mut self, other: &ColorUsageTally) {
        for (target, source) in [
            (&mut self.rgb, &other.rgb),
            (&mut self.cmyk, &other.cmyk),
            (&mut self.gray, &other.gray),
            (&mut self.spot, &other.spot),
        ] {
            for (key, count) in source {
                *target.entry(key.clone()).or_insert(0) += count;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorSpaceAnalysis {
    pub rgb_count: usize,
    pub cmyk_count: usize,
    pub grayscale_count: usize,
    pub spot_count: usize,
    pub rgb_percentage: f64,
    pub cmyk_percentage: f64,
    pub grayscale_percentage: f64,
    pub spot_percentage: f64,
    pub dominant_color_space: ColorModel,
    pub has_rgb: bool,
    pub spot_colors: Vec<String>,
    pub tally: ColorUsageTally,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TacAnalysis {
    #[serde(rename = "maxTAC")]
    pub max_tac: f64,
    #[serde(rename = "averageTAC")]
    pub average_tac: f64,
    pub limit: f64,
    pub exceeds_limit: bool,
    pub affected_pages: Vec<u32>,
    pub sample_count: usize,
}

/// How an image's DPI was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DpiSource {
    /// From the transformation matrix in effect where the image is painted.
    Placement,
    /// From the JFIF density tag inside the image data.
    Density,
    /// Assumed to cover the whole page.
    Page,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub index: usize,
    pub page: u32,
    pub width: u32,
    pub height: u32,
    pub dpi: f32,
    pub dpi_source: DpiSource,
    pub color_space: ColorModel,
    pub declared_color_space: String,
    pub color_space_recognized: bool,
    pub compression: String,
    pub byte_size: usize,
    pub has_soft_mask: bool,
    #[serde(rename = "meetsMinDPI")]
    pub meets_min_dpi: bool,
    pub needs_optimization: bool,
    /// Object number and generation of the image XObject, when indirect.
    #[serde(skip)]
    pub object_ref: Option<(u32, u16)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FontType {
    TrueType,
    Type1,
    Type3,
    #[serde(rename = "CIDFont")]
    CidFont,
    OpenType,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub font_type: FontType,
    pub is_embedded: bool,
    pub is_subset: bool,
    pub usage_count: usize,
    pub pages: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransparencyAnalysis {
    pub has_transparency: bool,
    pub needs_flattening: bool,
    pub blend_modes: Vec<String>,
    pub affected_pages: Vec<u32>,
    pub soft_mask_count: usize,
    pub transparency_group_count: usize,
}

/// `[llx, lly, urx, ury]` in points.
pub type BoxRect = [f32; 4];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxRecord {
    pub page: u32,
    pub has_media_box: bool,
    pub has_crop_box: bool,
    pub has_trim_box: bool,
    pub has_bleed_box: bool,
    pub media_box: Option<BoxRect>,
    pub crop_box: Option<BoxRect>,
    pub trim_box: Option<BoxRect>,
    pub bleed_box: Option<BoxRect>,
    pub bleed_size: f32,
    pub is_valid: bool,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfxCompliance {
    pub is_compliant: bool,
    pub standard: PdfxStandard,
    pub declared_standard: PdfxStandard,
    pub violations: Vec<String>,
    pub fonts_embedded: bool,
    pub has_trim_box: bool,
    pub has_bleed_box: bool,
    pub has_output_intent: bool,
}

// -- Report -------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub page_count: usize,
    pub pdf_version: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub file_size: usize,
    /// SHA-256 of the analyzed bytes, lowercase hex.
    pub sha256: String,
    pub is_encrypted: bool,
}

/// An analyzer that fell back to its conservative default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DegradedAnalyzer {
    pub analyzer: String,
    pub reason: String,
}

/// Complete preflight result for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreFlightReport {
    pub document_info: DocumentInfo,
    pub color_space_analysis: ColorSpaceAnalysis,
    pub image_analysis: Vec<ImageRecord>,
    pub font_analysis: Vec<FontRecord>,
    pub transparency_analysis: TransparencyAnalysis,
    pub tac_analysis: TacAnalysis,
    pub pdfx_compliance: PdfxCompliance,
    pub page_box_validation: Vec<BoxRecord>,
    pub issues: Vec<Issue>,
    pub warnings: Vec<Issue>,
    pub recommendations: Vec<Recommendation>,
    pub degraded_analyzers: Vec<DegradedAnalyzer>,
    pub timestamp: DateTime<Utc>,
    /// Wall-clock analysis time in milliseconds.
    pub processing_time: u64,
}

impl PreFlightReport {
    /// True when no critical or error issue was found.
    pub fn is_print_ready(&self) -> bool {
        !self
            .issues
            .iter()
            .any(|issue| matches!(issue.severity, Severity::Critical | Severity::Error))
    }
}
