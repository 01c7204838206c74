// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image analyzer: effective resolution, compression and color space of every
// raster image reachable from each page.
//
// Effective DPI comes from, in order: the transformation matrix in effect
// where the image is painted, the JFIF density tag, or the assumption that
// the image covers the page.

use std::collections::BTreeMap;

use preflight_core::{AnalysisConfig, ColorModel, DpiSource, ImageRecord};
use tracing::{debug, instrument, warn};

use super::Analysis;
use super::content::{decode, name_operand};
use crate::pdf::geometry::{Matrix, POINTS_PER_INCH, Rect};
use crate::pdf::snapshot::{DocumentSnapshot, ImageObject, PageSnapshot, XObjectTarget};

/// Form nesting deeper than this is not walked.
const MAX_FORM_NESTING: usize = 16;

const LETTER: Rect = Rect {
    llx: 0.0,
    lly: 0.0,
    urx: 612.0,
    ury: 792.0,
};

#[instrument(skip_all, fields(images = snapshot.images.len()))]
pub fn analyze_images(snapshot: &DocumentSnapshot, config: &AnalysisConfig) -> Analysis<Vec<ImageRecord>> {
    let mut records = Vec::new();
    let mut problems = Vec::new();

    for page in &snapshot.pages {
        let mut walker = PlacementWalker {
            snapshot,
            placements: BTreeMap::new(),
            active: Vec::new(),
            problems: Vec::new(),
        };
        walker.walk(page.content, Matrix::IDENTITY);
        problems.extend(walker.problems.into_iter().map(|p| format!("page {}: {}", page.number, p)));

        for image_index in page_images(snapshot, page) {
            let image = &snapshot.images[image_index];
            let placement = walker.placements.get(&image_index).copied();
            let (dpi, source) = effective_dpi(image, placement, page);
            records.push(build_record(records.len(), page.number, image, dpi, source, config));
        }
    }

    debug!(records = records.len(), "Image analysis complete");
    if problems.is_empty() {
        Analysis::Clean(records)
    } else {
        warn!(problems = problems.len(), "Image placement partially unknown");
        Analysis::Degraded {
            value: records,
            reason: problems.join("; "),
        }
    }
}

/// Images referenced by any stream reachable from the page, in discovery
/// order, each once.
fn page_images(snapshot: &DocumentSnapshot, page: &PageSnapshot) -> Vec<usize> {
    let mut images = Vec::new();
    for stream in snapshot.page_streams(page) {
        for target in snapshot.streams[stream].resources.xobjects.values() {
            if let XObjectTarget::Image(index) = target
                && !images.contains(index)
            {
                images.push(*index);
            }
        }
    }
    images
}

/// Tracks the CTM through a page's content and its forms, recording the
/// lowest placement DPI for each image painted.
struct PlacementWalker<'a> {
    snapshot: &'a DocumentSnapshot,
    /// Image index -> lowest (horizontal, vertical) DPI seen.
    placements: BTreeMap<usize, f32>,
    active: Vec<usize>,
    problems: Vec<String>,
}

impl PlacementWalker<'_> {
    fn walk(&mut self, stream_index: usize, base: Matrix) {
        if self.active.contains(&stream_index) || self.active.len() >= MAX_FORM_NESTING {
            return;
        }
        let stream = &self.snapshot.streams[stream_index];
        let Some(bytes) = stream.bytes.as_deref() else {
            self.problems.push("content stream cannot be decoded".into());
            return;
        };
        let operations = match decode(bytes) {
            Ok(operations) => operations,
            Err(reason) => {
                self.problems.push(reason);
                return;
            }
        };

        self.active.push(stream_index);
        let mut ctm = base;
        let mut saved = Vec::new();
        for operation in operations {
            match operation.operator.as_str() {
                "q" => saved.push(ctm),
                "Q" => ctm = saved.pop().unwrap_or(base),
                "cm" => {
                    if let Some(matrix) = Matrix::from_objects(&operation.operands) {
                        ctm = matrix.then(&ctm);
                    }
                }
                "Do" => {
                    let Some(name) = name_operand(&operation.operands) else {
                        continue;
                    };
                    match stream.resources.xobjects.get(&name) {
                        Some(XObjectTarget::Image(index)) => self.place(*index, &ctm),
                        Some(XObjectTarget::Form(form)) => {
                            let matrix = self.snapshot.streams[*form].matrix.then(&ctm);
                            self.walk(*form, matrix);
                        }
                        None => {}
                    }
                }
                _ => {}
            }
        }
        self.active.pop();
    }

    fn place(&mut self, index: usize, ctm: &Matrix) {
        let image = &self.snapshot.images[index];
        let width_in = ctm.x_extent() / POINTS_PER_INCH;
        let height_in = ctm.y_extent() / POINTS_PER_INCH;
        if width_in <= 0.0 || height_in <= 0.0 || image.width == 0 || image.height == 0 {
            return;
        }
        let dpi = (image.width as f32 / width_in).min(image.height as f32 / height_in);
        let entry = self.placements.entry(index).or_insert(dpi);
        *entry = entry.min(dpi);
    }
}

fn effective_dpi(image: &ImageObject, placement: Option<f32>, page: &PageSnapshot) -> (f32, DpiSource) {
    if let Some(dpi) = placement {
        return (round_dpi(dpi), DpiSource::Placement);
    }
    if let Some((x, y)) = image.density {
        return (round_dpi(x.min(y)), DpiSource::Density);
    }
    let area = page.media_box.filter(|b| !b.is_degenerate()).unwrap_or(LETTER);
    let dpi = (image.width as f32 / (area.width() / POINTS_PER_INCH))
        .min(image.height as f32 / (area.height() / POINTS_PER_INCH));
    (round_dpi(dpi), DpiSource::Page)
}

fn round_dpi(dpi: f32) -> f32 {
    (dpi * 10.0).round() / 10.0
}

fn build_record(
    index: usize,
    page: u32,
    image: &ImageObject,
    dpi: f32,
    dpi_source: DpiSource,
    config: &AnalysisConfig,
) -> ImageRecord {
    let compression = compression_name(&image.filters);
    let (color_space, recognized) = normalize_color_space(&image.color_space);
    let meets_min_dpi = dpi >= config.min_dpi;
    ImageRecord {
        index,
        page,
        width: image.width,
        height: image.height,
        dpi,
        dpi_source,
        color_space,
        declared_color_space: image.color_space.clone(),
        color_space_recognized: recognized,
        needs_optimization: !meets_min_dpi || compression == "None",
        compression,
        byte_size: image.byte_size,
        has_soft_mask: image.soft_mask,
        meets_min_dpi,
        object_ref: image.object_id,
    }
}

/// Compression name of the image's own encoding (the last filter).
pub fn compression_name(filters: &[String]) -> String {
    let Some(filter) = filters.last() else {
        return "None".into();
    };
    match filter.as_str() {
        "DCTDecode" | "DCT" => "JPEG",
        "JPXDecode" => "JPEG2000",
        "JBIG2Decode" => "JBIG2",
        "CCITTFaxDecode" | "CCF" => "CCITT",
        "FlateDecode" | "Fl" => "Flate",
        "LZWDecode" | "LZW" => "LZW",
        "RunLengthDecode" | "RL" => "RunLength",
        other => other,
    }
    .to_string()
}

/// Normalize a declared color space. Unrecognized spaces are reported as
/// CMYK with the flag cleared.
pub fn normalize_color_space(declared: &str) -> (ColorModel, bool) {
    let lower = declared.to_ascii_lowercase();
    if lower.contains("indexed") {
        (ColorModel::Indexed, true)
    } else if lower.contains("separation") || lower.contains("devicen") {
        (ColorModel::DeviceN, true)
    } else if lower.contains("cmyk") {
        (ColorModel::Cmyk, true)
    } else if lower.contains("rgb") {
        (ColorModel::Rgb, true)
    } else if lower.contains("gray") || lower.contains("grey") {
        (ColorModel::Grayscale, true)
    } else {
        (ColorModel::Cmyk, false)
    }
}
