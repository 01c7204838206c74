// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Color fixes: RGB to process CMYK, ink limiting and spot to process. All
// three rewrite color operators in place; the conversions are the device
// formulas from `preflight_core::color`, not an ICC transform.

use lopdf::content::Operation;
use lopdf::{Document, Object, dictionary};
use preflight_core::color::{Cmyk, calculate_tac, reduce_tac, rgb_to_cmyk, spot_to_cmyk};
use preflight_core::error::{PreflightError, Result};
use preflight_core::FixToken;
use tracing::{info, instrument};

use super::rewrite::{PaintState, cmyk_operation, process_operator, rewrite_content};
use super::{FixContext, delegate};
use crate::analysis::content::numbers;
use crate::pdf::metadata::{PRODUCER, set_info_text};
use crate::pdf::objects::{catalog_id, entry_name, resolve, resolve_dict};
use crate::pdf::snapshot::ColorSpaceKind;
use crate::raster::RasterJob;

/// Characterization registered when a document gains an output intent.
const DEFAULT_CONDITION: &str = "FOGRA39";
const DEFAULT_CONDITION_NAME: &str = "Coated FOGRA39 (ISO 12647-2:2004)";

/// Convert RGB fills and strokes to CMYK and declare a CMYK output intent.
#[instrument(skip_all)]
pub fn convert_to_cmyk(mut doc: Document, ctx: &mut FixContext) -> Result<Document> {
    let summary = rewrite_content(&mut doc, rgb_to_process)?;
    if summary.skipped > 0 {
        ctx.note(
            FixToken::Cmyk,
            format!("{} content stream(s) could not be decoded and keep their colors", summary.skipped),
        );
    }
    if ensure_output_intent(&mut doc)? {
        info!(condition = DEFAULT_CONDITION, "Output intent added");
    }
    tag_producer(&mut doc)?;
    info!(streams = summary.rewritten, "RGB color converted to CMYK");
    Ok(doc)
}

fn rgb_to_process(operation: &Operation, state: &PaintState) -> Option<Vec<Operation>> {
    let operator = operation.operator.as_str();
    match operator {
        "rg" | "RG" => {
            let &[r, g, b] = numbers(&operation.operands).as_slice() else {
                return None;
            };
            let cmyk = rgb_to_cmyk(to_byte(r), to_byte(g), to_byte(b));
            Some(vec![cmyk_operation(process_operator(operator), cmyk)])
        }
        "cs" | "CS" if *state.space_for(operator) == ColorSpaceKind::Rgb => Some(vec![Operation::new(
            operator,
            vec![Object::Name(b"DeviceCMYK".to_vec())],
        )]),
        "sc" | "scn" | "SC" | "SCN" if *state.space_for(operator) == ColorSpaceKind::Rgb => {
            let &[r, g, b] = numbers(&operation.operands).as_slice() else {
                return None;
            };
            let cmyk = rgb_to_cmyk(to_byte(r), to_byte(g), to_byte(b));
            Some(vec![cmyk_operation(operator, cmyk)])
        }
        _ => None,
    }
}

fn to_byte(component: f64) -> u8 {
    (component.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Scale every CMYK color above the ink ceiling down to it, then hand the
/// document to the rasterizer for the images.
#[instrument(skip_all, fields(max_tac = ctx.options.max_tac))]
pub fn limit_ink(mut doc: Document, ctx: &mut FixContext) -> Result<Document> {
    let max_tac = ctx.options.max_tac;
    let summary = rewrite_content(&mut doc, |operation, state| {
        let operator = operation.operator.as_str();
        let in_cmyk = match operator {
            "k" | "K" => true,
            "sc" | "scn" | "SC" | "SCN" => *state.space_for(operator) == ColorSpaceKind::Cmyk,
            _ => false,
        };
        if !in_cmyk {
            return None;
        }
        let &[c, m, y, k] = numbers(&operation.operands).as_slice() else {
            return None;
        };
        if calculate_tac(c, m, y, k) <= max_tac {
            return None;
        }
        let reduced = reduce_tac(c, m, y, k, max_tac);
        Some(vec![cmyk_operation(operator, floor_channels(reduced))])
    })?;
    info!(streams = summary.rewritten, "Ink coverage limited");
    if summary.skipped > 0 {
        ctx.note(
            FixToken::Tac,
            format!("{} content stream(s) could not be decoded and keep their inks", summary.skipped),
        );
    }
    let mut doc = delegate(doc, ctx, FixToken::Tac, RasterJob::ReduceInk { max_tac })?;
    tag_producer(&mut doc)?;
    Ok(doc)
}

/// Round each channel down to four decimals so the written color never
/// lands above the ceiling.
fn floor_channels(color: Cmyk) -> Cmyk {
    let floor = |v: f64| (v * 10_000.0).floor() / 10_000.0;
    Cmyk {
        c: floor(color.c),
        m: floor(color.m),
        y: floor(color.y),
        k: floor(color.k),
    }
}

/// Replace Separation and DeviceN colors with their approximate process
/// builds, scaled by tint.
#[instrument(skip_all)]
pub fn convert_spots(mut doc: Document, ctx: &mut FixContext) -> Result<Document> {
    let summary = rewrite_content(&mut doc, |operation, state| {
        let operator = operation.operator.as_str();
        let ColorSpaceKind::Spot(colorants) = state.space_for(operator) else {
            return None;
        };
        let tints = match operator {
            "sc" | "scn" | "SC" | "SCN" => numbers(&operation.operands),
            // Selecting a spot space sets every colorant to full tint.
            "cs" | "CS" => vec![1.0; colorants.split('+').count()],
            _ => return None,
        };
        let build = process_build(colorants, &tints)?;
        Some(vec![cmyk_operation(process_operator(operator), build)])
    })?;
    info!(streams = summary.rewritten, "Spot colors converted to process");
    if summary.skipped > 0 {
        ctx.note(
            FixToken::SpotToCmyk,
            format!("{} content stream(s) could not be decoded and keep their spot colors", summary.skipped),
        );
    }
    let mut doc = delegate(doc, ctx, FixToken::SpotToCmyk, RasterJob::ConvertSpots)?;
    tag_producer(&mut doc)?;
    Ok(doc)
}

/// Sum the tinted builds of each colorant, capped at solid. `None` for the
/// invisible `None` colorant or a tint count that does not match.
fn process_build(colorants: &str, tints: &[f64]) -> Option<Cmyk> {
    let names: Vec<&str> = colorants.split('+').collect();
    if names.len() != tints.len() || names.iter().any(|name| name.eq_ignore_ascii_case("None")) {
        return None;
    }
    let mut total = Cmyk {
        c: 0.0,
        m: 0.0,
        y: 0.0,
        k: 0.0,
    };
    for (name, tint) in names.into_iter().zip(tints) {
        let part = spot_to_cmyk(name).tinted(*tint);
        total.c += part.c;
        total.m += part.m;
        total.y += part.y;
        total.k += part.k;
    }
    Some(Cmyk {
        c: total.c.min(1.0),
        m: total.m.min(1.0),
        y: total.y.min(1.0),
        k: total.k.min(1.0),
    })
}

/// Add a GTS_PDFX output intent unless one is present. Returns whether one
/// was added.
pub(crate) fn ensure_output_intent(doc: &mut Document) -> Result<bool> {
    let catalog = catalog_id(doc)
        .ok_or_else(|| PreflightError::PdfError("document has no catalog".into()))?;
    let mut intents: Vec<Object> = doc
        .get_dictionary(catalog)
        .ok()
        .and_then(|dict| dict.get(b"OutputIntents").ok())
        .and_then(|value| resolve(doc, value))
        .and_then(|value| value.as_array().ok())
        .cloned()
        .unwrap_or_default();
    let present = intents.iter().any(|intent| {
        resolve_dict(doc, intent)
            .and_then(|dict| entry_name(doc, dict, b"S"))
            .is_some_and(|subtype| subtype == "GTS_PDFX")
    });
    if present {
        return Ok(false);
    }

    let intent = doc.add_object(dictionary! {
        "Type" => "OutputIntent",
        "S" => "GTS_PDFX",
        "OutputConditionIdentifier" => Object::string_literal(DEFAULT_CONDITION),
        "OutputCondition" => Object::string_literal(DEFAULT_CONDITION_NAME),
        "RegistryName" => Object::string_literal("http://www.color.org"),
        "Info" => Object::string_literal(DEFAULT_CONDITION_NAME),
    });
    intents.push(intent.into());
    doc.get_dictionary_mut(catalog)
        .map_err(|err| PreflightError::PdfError(format!("cannot update catalog: {}", err)))?
        .set("OutputIntents", intents);
    Ok(true)
}

pub(crate) fn tag_producer(doc: &mut Document) -> Result<()> {
    set_info_text(doc, "Producer", PRODUCER)
}
