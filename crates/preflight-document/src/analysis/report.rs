// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Preflight report builder. Runs the six analyzers concurrently over one
// snapshot, then derives issues, warnings and recommendations from a fixed
// rule table. The result depends only on the snapshot and configuration.

use std::time::Instant;

use chrono::Utc;
use preflight_core::{
    AnalysisConfig, BoxRecord, ColorSpaceAnalysis, DegradedAnalyzer, DocumentInfo, FixToken,
    FontRecord, ImageRecord, Issue, IssueCategory, PdfxCompliance, PreFlightReport, Priority,
    Recommendation, Severity, TacAnalysis, TransparencyAnalysis,
};
use tracing::{info, instrument};

use super::Analysis;
use super::boxes::validate_boxes;
use super::color_space::{ColorScan, scan_colors};
use super::fonts::analyze_fonts;
use super::images::analyze_images;
use super::pdfx::check_pdfx;
use super::transparency::analyze_transparency;
use crate::pdf::snapshot::DocumentSnapshot;

/// Build a report, timing from now.
pub fn build_report(snapshot: &DocumentSnapshot, config: &AnalysisConfig) -> PreFlightReport {
    build_report_since(snapshot, config, Instant::now())
}

/// Build a report whose processing time counts from `started`.
#[instrument(skip_all, fields(pages = snapshot.pages.len()))]
pub fn build_report_since(
    snapshot: &DocumentSnapshot,
    config: &AnalysisConfig,
    started: Instant,
) -> PreFlightReport {
    let ((color, images), ((fonts, transparency), (boxes, pdfx))) = rayon::join(
        || {
            rayon::join(
                || scan_colors(snapshot, config),
                || analyze_images(snapshot, config),
            )
        },
        || {
            rayon::join(
                || rayon::join(|| analyze_fonts(snapshot), || analyze_transparency(snapshot)),
                || rayon::join(|| validate_boxes(snapshot), || check_pdfx(snapshot)),
            )
        },
    );

    let mut degraded_analyzers = Vec::new();
    let ColorScan { colors, tac } = collect("colorSpace", color, &mut degraded_analyzers);
    let images = collect("images", images, &mut degraded_analyzers);

    let findings = Findings {
        colors: &colors,
        images: &images,
        fonts: &fonts,
        transparency: &transparency,
        tac: &tac,
        pdfx: &pdfx,
        boxes: &boxes,
        config,
    };
    let issues = findings.issues();
    let warnings = findings.warnings();
    let recommendations = recommend(&issues);

    let report = PreFlightReport {
        document_info: document_info(snapshot),
        color_space_analysis: colors,
        image_analysis: images,
        font_analysis: fonts,
        transparency_analysis: transparency,
        tac_analysis: tac,
        pdfx_compliance: pdfx,
        page_box_validation: boxes,
        issues,
        warnings,
        recommendations,
        degraded_analyzers,
        timestamp: Utc::now(),
        processing_time: started.elapsed().as_millis() as u64,
    };
    info!(
        issues = report.issues.len(),
        warnings = report.warnings.len(),
        degraded = report.degraded_analyzers.len(),
        processing_ms = report.processing_time,
        "Preflight report built"
    );
    report
}

fn collect<T>(name: &str, analysis: Analysis<T>, degraded: &mut Vec<DegradedAnalyzer>) -> T {
    let (value, reason) = analysis.into_parts();
    if let Some(reason) = reason {
        degraded.push(DegradedAnalyzer {
            analyzer: name.to_string(),
            reason,
        });
    }
    value
}

fn document_info(snapshot: &DocumentSnapshot) -> DocumentInfo {
    let meta = &snapshot.metadata;
    DocumentInfo {
        page_count: snapshot.pages.len(),
        pdf_version: meta.version.clone(),
        title: meta.title.clone(),
        author: meta.author.clone(),
        subject: meta.subject.clone(),
        creator: meta.creator.clone(),
        producer: meta.producer.clone(),
        creation_date: meta.creation_date.clone(),
        modification_date: meta.modification_date.clone(),
        file_size: meta.file_size,
        sha256: meta.sha256.clone(),
        is_encrypted: meta.encrypted,
    }
}

// -- Rule table ---------------------------------------------------------------

struct Findings<'a> {
    colors: &'a ColorSpaceAnalysis,
    images: &'a [ImageRecord],
    fonts: &'a [FontRecord],
    transparency: &'a TransparencyAnalysis,
    tac: &'a TacAnalysis,
    pdfx: &'a PdfxCompliance,
    boxes: &'a [BoxRecord],
    config: &'a AnalysisConfig,
}

fn finding(
    severity: Severity,
    category: IssueCategory,
    message: String,
    page: Option<u32>,
    fix: Option<FixToken>,
) -> Issue {
    Issue {
        severity,
        category,
        message,
        page,
        auto_fix_available: fix.is_some(),
        fix_type: fix,
    }
}

impl Findings<'_> {
    fn issues(&self) -> Vec<Issue> {
        let mut issues = Vec::new();

        if self.colors.has_rgb {
            issues.push(finding(
                Severity::Error,
                IssueCategory::Color,
                format!(
                    "Document uses RGB color ({} occurrences, {:.1}% of color operations); print requires CMYK",
                    self.colors.rgb_count, self.colors.rgb_percentage
                ),
                None,
                Some(FixToken::Cmyk),
            ));
        }

        for image in self.images.iter().filter(|image| !image.meets_min_dpi) {
            issues.push(finding(
                Severity::Error,
                IssueCategory::Image,
                format!(
                    "Image {} on page {} is {:.0} DPI, below the {:.0} DPI minimum",
                    image.index, image.page, image.dpi, self.config.min_dpi
                ),
                Some(image.page),
                Some(FixToken::Resample),
            ));
        }

        for font in self.fonts.iter().filter(|font| !font.is_embedded) {
            issues.push(finding(
                Severity::Critical,
                IssueCategory::Font,
                format!("Font \"{}\" is not embedded", font.name),
                font.pages.first().copied(),
                Some(FixToken::Fonts),
            ));
        }

        if self.transparency.has_transparency {
            let modes = if self.transparency.blend_modes.is_empty() {
                String::new()
            } else {
                format!(" (blend modes: {})", self.transparency.blend_modes.join(", "))
            };
            issues.push(finding(
                Severity::Warning,
                IssueCategory::Transparency,
                format!(
                    "Transparency on {} page(s){} should be flattened for print",
                    self.transparency.affected_pages.len(),
                    modes
                ),
                None,
                Some(FixToken::Flatten),
            ));
        }

        if self.tac.exceeds_limit {
            issues.push(finding(
                Severity::Error,
                IssueCategory::Tac,
                format!(
                    "Total area coverage reaches {:.1}%, above the {:.0}% limit",
                    self.tac.max_tac, self.tac.limit
                ),
                self.tac.affected_pages.first().copied(),
                Some(FixToken::Tac),
            ));
        }

        if !self.pdfx.is_compliant {
            issues.push(finding(
                Severity::Warning,
                IssueCategory::Compliance,
                format!("Document is not PDF/X compliant: {}", self.pdfx.violations.join("; ")),
                None,
                Some(FixToken::Pdfx),
            ));
        }

        for record in self.boxes.iter().filter(|record| !record.is_valid) {
            issues.push(finding(
                Severity::Error,
                IssueCategory::Boxes,
                format!("Page {} box geometry: {}", record.page, record.issues.join("; ")),
                Some(record.page),
                Some(FixToken::Bleed),
            ));
        }

        if !self.colors.spot_colors.is_empty() {
            issues.push(finding(
                Severity::Warning,
                IssueCategory::Color,
                format!("Spot colors in use: {}", self.colors.spot_colors.join(", ")),
                None,
                Some(FixToken::SpotToCmyk),
            ));
        }

        issues
    }

    fn warnings(&self) -> Vec<Issue> {
        let mut warnings = Vec::new();

        for image in self.images.iter().filter(|image| image.needs_optimization) {
            let reason = match (image.meets_min_dpi, image.compression == "None") {
                (false, true) => "low resolution and uncompressed",
                (false, false) => "low resolution",
                _ => "uncompressed",
            };
            warnings.push(finding(
                Severity::Warning,
                IssueCategory::Image,
                format!("Image {} on page {} could be optimized: {}", image.index, image.page, reason),
                Some(image.page),
                (!image.meets_min_dpi).then_some(FixToken::Resample),
            ));
        }

        let subset = self.fonts.iter().filter(|font| font.is_subset).count();
        if subset > 0 {
            warnings.push(finding(
                Severity::Warning,
                IssueCategory::Font,
                format!("{} subset font(s) in use; late text edits may be missing glyphs", subset),
                None,
                None,
            ));
        }

        for image in self.images.iter().filter(|image| !image.color_space_recognized) {
            let declared = if image.declared_color_space.is_empty() {
                "none declared"
            } else {
                image.declared_color_space.as_str()
            };
            warnings.push(finding(
                Severity::Warning,
                IssueCategory::Image,
                format!(
                    "Image {} on page {} has an unrecognized color space ({}), reported as CMYK",
                    image.index, image.page, declared
                ),
                Some(image.page),
                None,
            ));
        }

        warnings
    }
}

fn recommend(issues: &[Issue]) -> Vec<Recommendation> {
    let blocking = |issue: &&Issue| matches!(issue.severity, Severity::Critical | Severity::Error);
    let mut recommendations = Vec::new();

    let blocking_count = issues.iter().filter(blocking).count();
    if let Some(first) = issues.iter().find(blocking) {
        recommendations.push(Recommendation {
            priority: Priority::High,
            category: first.category,
            message: format!(
                "Fix all {} critical and error issues before sending to print",
                blocking_count
            ),
            fix_type: None,
        });
    }

    let mut seen: Vec<IssueCategory> = Vec::new();
    for issue in issues {
        if seen.contains(&issue.category) {
            continue;
        }
        seen.push(issue.category);
        let in_category = || issues.iter().filter(|other| other.category == issue.category);
        let priority = if in_category().any(|other| blocking(&other)) {
            Priority::Medium
        } else {
            Priority::Low
        };
        recommendations.push(Recommendation {
            priority,
            category: issue.category,
            message: advice(issue.fix_type).to_string(),
            fix_type: issue.fix_type,
        });
    }
    recommendations
}

fn advice(fix: Option<FixToken>) -> &'static str {
    match fix {
        Some(FixToken::Cmyk) => "Convert RGB colors to CMYK",
        Some(FixToken::Resample) => "Resample low-resolution images to print resolution",
        Some(FixToken::Fonts) => "Embed all fonts or convert text to outlines",
        Some(FixToken::Flatten) => "Flatten transparency before output",
        Some(FixToken::Tac) => "Reduce total ink coverage to the press limit",
        Some(FixToken::Pdfx) => "Export as PDF/X-4 for a predictable print workflow",
        Some(FixToken::Bleed) => "Define TrimBox and BleedBox with adequate bleed",
        Some(FixToken::SpotToCmyk) => "Convert spot colors to process unless spot plates are intended",
        _ => "Review the reported issues",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{FixtureImage, FixturePage, build_pdf, print_ready_pdf, rgb_letter_pdf};

    fn report_for(bytes: &[u8]) -> PreFlightReport {
        let snapshot = DocumentSnapshot::from_bytes(bytes).unwrap();
        build_report(&snapshot, &AnalysisConfig::default())
    }

    fn has(issues: &[Issue], severity: Severity, category: IssueCategory) -> bool {
        issues.iter().any(|i| i.severity == severity && i.category == category)
    }

    #[test]
    fn rgb_document_with_unembedded_font_fails() {
        let report = report_for(&rgb_letter_pdf());
        assert!(has(&report.issues, Severity::Critical, IssueCategory::Font));
        assert!(has(&report.issues, Severity::Error, IssueCategory::Color));
        assert!(!report.pdfx_compliance.is_compliant);
        assert!(!report.is_print_ready());
        assert_eq!(report.recommendations[0].priority, Priority::High);
        assert_eq!(report.document_info.page_count, 1);
        assert!(report.degraded_analyzers.is_empty());
    }

    #[test]
    fn issue_order_follows_rule_table() {
        let report = report_for(&rgb_letter_pdf());
        let categories: Vec<_> = report.issues.iter().map(|i| i.category).collect();
        assert_eq!(
            categories,
            vec![
                IssueCategory::Color,
                IssueCategory::Font,
                IssueCategory::Compliance,
                IssueCategory::Boxes,
            ]
        );
        let fixes: Vec<_> = report.issues.iter().map(|i| i.fix_type).collect();
        assert_eq!(
            fixes,
            vec![
                Some(FixToken::Cmyk),
                Some(FixToken::Fonts),
                Some(FixToken::Pdfx),
                Some(FixToken::Bleed),
            ]
        );
    }

    #[test]
    fn print_ready_document_is_clean() {
        let report = report_for(&print_ready_pdf());
        assert!(report.is_print_ready(), "{:?}", report.issues);
        assert!(report.issues.is_empty());
        assert!(report.pdfx_compliance.is_compliant);
        // Subset font warning only.
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].category, IssueCategory::Font);
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn warning_only_categories_get_low_priority() {
        let bytes = build_pdf(&[FixturePage::new(612.0, 792.0)
            .with_trim_and_bleed(9.0)
            .with_transparency_group()]);
        let report = report_for(&bytes);
        assert!(report.is_print_ready());
        let transparency = report
            .recommendations
            .iter()
            .find(|r| r.category == IssueCategory::Transparency)
            .unwrap();
        assert_eq!(transparency.priority, Priority::Low);
        assert_eq!(transparency.fix_type, Some(FixToken::Flatten));
    }

    #[test]
    fn low_resolution_images_yield_issue_and_warning() {
        let bytes = build_pdf(&[FixturePage::new(612.0, 792.0)
            .with_trim_and_bleed(9.0)
            .with_image(FixtureImage::cmyk(100, 100))
            .with_content("q 72 0 0 72 0 0 cm /Im0 Do Q")]);
        let report = report_for(&bytes);
        let image_issue = report
            .issues
            .iter()
            .find(|i| i.category == IssueCategory::Image)
            .unwrap();
        assert_eq!(image_issue.page, Some(1));
        assert_eq!(image_issue.fix_type, Some(FixToken::Resample));
        assert!(report.warnings.iter().any(|w| w.category == IssueCategory::Image));
    }

    #[test]
    fn degraded_color_scan_is_listed() {
        let bytes = build_pdf(&[FixturePage::new(612.0, 792.0)
            .with_trim_and_bleed(9.0)
            .with_raw_content(b"0 0 1 rg".to_vec(), "JBIG2Decode")]);
        let report = report_for(&bytes);
        assert!(
            report
                .degraded_analyzers
                .iter()
                .any(|d| d.analyzer == "colorSpace")
        );
        assert!(!report.color_space_analysis.has_rgb);
    }

    #[test]
    fn report_serializes_with_contract_field_names() {
        let report = report_for(&rgb_letter_pdf());
        let json = serde_json::to_value(&report).unwrap();
        for key in [
            "documentInfo",
            "colorSpaceAnalysis",
            "imageAnalysis",
            "fontAnalysis",
            "transparencyAnalysis",
            "tacAnalysis",
            "pdfxCompliance",
            "pageBoxValidation",
            "issues",
            "warnings",
            "recommendations",
            "timestamp",
            "processingTime",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(json["tacAnalysis"]["maxTAC"], 0.0);
    }
}
