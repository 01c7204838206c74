// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operator-level rewriting of every content stream reachable from the pages:
// page contents and Form XObjects, each visited once. Color-space state is
// tracked through `q`/`Q` so a rewrite knows what an `sc` operand means.

use std::collections::{BTreeMap, BTreeSet};

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use preflight_core::color::Cmyk;
use preflight_core::error::{PreflightError, Result};
use tracing::{debug, warn};

use crate::analysis::content::decode;
use crate::pdf::objects::{
    compress_stream, entry_dict, entry_name, inherited, name, page_content, resolve, resolve_dict, stream_bytes,
};
use crate::pdf::snapshot::{ColorSpaceKind, classify_color_space};

/// Form nesting deeper than this is left alone.
const MAX_FORM_DEPTH: usize = 16;

/// Current fill and stroke color spaces of a content stream.
pub(crate) struct PaintState<'a> {
    spaces: &'a BTreeMap<String, ColorSpaceKind>,
    pub fill: ColorSpaceKind,
    pub stroke: ColorSpaceKind,
    saved: Vec<(ColorSpaceKind, ColorSpaceKind)>,
}

impl<'a> PaintState<'a> {
    fn new(spaces: &'a BTreeMap<String, ColorSpaceKind>) -> Self {
        Self {
            spaces,
            fill: ColorSpaceKind::Gray,
            stroke: ColorSpaceKind::Gray,
            saved: Vec::new(),
        }
    }

    /// The space an `sc`-family or `cs`-family operator applies to.
    pub fn space_for(&self, operator: &str) -> &ColorSpaceKind {
        if operator.starts_with(|ch: char| ch.is_ascii_lowercase()) {
            &self.fill
        } else {
            &self.stroke
        }
    }

    fn observe(&mut self, operation: &Operation) {
        let operator = operation.operator.as_str();
        match operator {
            "q" => self.saved.push((self.fill.clone(), self.stroke.clone())),
            "Q" => {
                if let Some((fill, stroke)) = self.saved.pop() {
                    self.fill = fill;
                    self.stroke = stroke;
                }
            }
            "cs" | "CS" => {
                let space = self.lookup(operation.operands.first());
                if operator == "cs" {
                    self.fill = space;
                } else {
                    self.stroke = space;
                }
            }
            "g" => self.fill = ColorSpaceKind::Gray,
            "G" => self.stroke = ColorSpaceKind::Gray,
            "rg" => self.fill = ColorSpaceKind::Rgb,
            "RG" => self.stroke = ColorSpaceKind::Rgb,
            "k" => self.fill = ColorSpaceKind::Cmyk,
            "K" => self.stroke = ColorSpaceKind::Cmyk,
            _ => {}
        }
    }

    fn lookup(&self, operand: Option<&Object>) -> ColorSpaceKind {
        let Some(space) = operand.and_then(name) else {
            return ColorSpaceKind::Other(String::new());
        };
        ColorSpaceKind::from_device_name(&space)
            .or_else(|| self.spaces.get(&space).cloned())
            .unwrap_or(ColorSpaceKind::Other(space))
    }
}

/// What a rewrite pass touched.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RewriteSummary {
    /// Streams written back with at least one replaced operator.
    pub rewritten: usize,
    /// Streams left alone because they could not be decoded or parsed.
    pub skipped: usize,
}

enum Target {
    Page(ObjectId),
    Form(ObjectId),
}

/// Apply `rewrite` to every operation of every reachable content stream.
/// `rewrite` returns `None` to keep an operation, or its replacement.
pub(crate) fn rewrite_content<F>(doc: &mut Document, mut rewrite: F) -> Result<RewriteSummary>
where
    F: FnMut(&Operation, &PaintState) -> Option<Vec<Operation>>,
{
    let mut summary = RewriteSummary::default();
    for (target, spaces) in collect_targets(doc) {
        let bytes = match &target {
            Target::Page(id) => page_content(doc, *id),
            Target::Form(id) => match doc.get_object(*id) {
                Ok(Object::Stream(stream)) => stream_bytes(stream),
                _ => None,
            },
        };
        let Some(operations) = bytes.and_then(|bytes| decode(&bytes).ok()) else {
            warn!("Content stream cannot be decoded, left unchanged");
            summary.skipped += 1;
            continue;
        };

        let mut state = PaintState::new(&spaces);
        let mut changed = false;
        let mut output = Vec::with_capacity(operations.len());
        for operation in operations {
            state.observe(&operation);
            match rewrite(&operation, &state) {
                Some(replacement) => {
                    changed = true;
                    output.extend(replacement);
                }
                None => output.push(operation),
            }
        }
        if !changed {
            continue;
        }

        let encoded = Content { operations: output }
            .encode()
            .map_err(|err| PreflightError::PdfError(format!("cannot encode content: {}", err)))?;
        match target {
            Target::Page(page_id) => {
                let mut stream = Stream::new(Dictionary::new(), encoded);
                compress_stream(&mut stream);
                let content_id = doc.add_object(stream);
                doc.get_dictionary_mut(page_id)
                    .map_err(|err| PreflightError::PdfError(format!("cannot update page: {}", err)))?
                    .set("Contents", content_id);
            }
            Target::Form(form_id) => {
                if let Ok(Object::Stream(stream)) = doc.get_object_mut(form_id) {
                    stream.set_plain_content(encoded);
                    compress_stream(stream);
                }
            }
        }
        summary.rewritten += 1;
    }
    debug!(rewritten = summary.rewritten, skipped = summary.skipped, "Content rewrite finished");
    Ok(summary)
}

fn collect_targets(doc: &Document) -> Vec<(Target, BTreeMap<String, ColorSpaceKind>)> {
    let mut targets = Vec::new();
    let mut seen = BTreeSet::new();
    for page_id in doc.get_pages().into_values() {
        let resources = inherited(doc, page_id, b"Resources").and_then(|r| resolve_dict(doc, r));
        targets.push((Target::Page(page_id), color_spaces(doc, resources)));
        collect_forms(doc, resources, 0, &mut seen, &mut targets);
    }
    targets
}

fn collect_forms(
    doc: &Document,
    resources: Option<&Dictionary>,
    depth: usize,
    seen: &mut BTreeSet<ObjectId>,
    targets: &mut Vec<(Target, BTreeMap<String, ColorSpaceKind>)>,
) {
    let Some(xobjects) = resources.and_then(|r| entry_dict(doc, r, b"XObject")) else {
        return;
    };
    if depth >= MAX_FORM_DEPTH {
        return;
    }
    for (_, value) in xobjects.iter() {
        let Object::Reference(id) = value else {
            continue;
        };
        let Ok(Object::Stream(form)) = doc.get_object(*id) else {
            continue;
        };
        if entry_name(doc, &form.dict, b"Subtype").as_deref() != Some("Form") || !seen.insert(*id) {
            continue;
        }
        let own = entry_dict(doc, &form.dict, b"Resources").or(resources);
        targets.push((Target::Form(*id), color_spaces(doc, own)));
        collect_forms(doc, own, depth + 1, seen, targets);
    }
}

fn color_spaces(doc: &Document, resources: Option<&Dictionary>) -> BTreeMap<String, ColorSpaceKind> {
    let Some(spaces) = resources.and_then(|r| entry_dict(doc, r, b"ColorSpace")) else {
        return BTreeMap::new();
    };
    spaces
        .iter()
        .map(|(key, value)| {
            let kind = if is_indexed(doc, value) {
                // Indexed operands are palette indices, never components.
                ColorSpaceKind::Other("Indexed".into())
            } else {
                classify_color_space(doc, value)
            };
            (String::from_utf8_lossy(key).into_owned(), kind)
        })
        .collect()
}

fn is_indexed(doc: &Document, value: &Object) -> bool {
    match resolve(doc, value) {
        Some(Object::Array(items)) => matches!(
            items.first().and_then(|f| resolve(doc, f)).and_then(name).as_deref(),
            Some("Indexed") | Some("I")
        ),
        _ => false,
    }
}

/// A `k` or `K` operation setting `color`.
pub(crate) fn cmyk_operation(operator: &str, color: Cmyk) -> Operation {
    Operation::new(
        operator,
        [color.c, color.m, color.y, color.k]
            .into_iter()
            .map(|channel| Object::Real(channel as f32))
            .collect(),
    )
}

/// The process-color operator matching an `sc`/`cs` family operator's case.
pub(crate) fn process_operator(operator: &str) -> &'static str {
    if operator.starts_with(|ch: char| ch.is_ascii_lowercase()) {
        "k"
    } else {
        "K"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::content::numbers;
    use crate::test_fixtures::{FixturePage, build_document};

    fn operators(doc: &Document, page: u32) -> Vec<String> {
        let id = doc.get_pages()[&page];
        let bytes = page_content(doc, id).unwrap();
        decode(&bytes).unwrap().into_iter().map(|op| op.operator).collect()
    }

    #[test]
    fn page_and_form_streams_are_rewritten_once() {
        let mut doc = build_document(&[FixturePage::new(200.0, 200.0)
            .with_content("0 g /Fm0 Do")
            .with_form("0 g 0 0 10 10 re f")]);
        let summary = rewrite_content(&mut doc, |op, _| {
            (op.operator == "g").then(|| vec![cmyk_operation("k", Cmyk::BLACK)])
        })
        .unwrap();
        assert_eq!(summary, RewriteSummary { rewritten: 2, skipped: 0 });
        assert_eq!(operators(&doc, 1), vec!["k", "Do"]);
    }

    #[test]
    fn state_follows_color_space_resources_and_save_restore() {
        let mut doc = build_document(&[FixturePage::new(200.0, 200.0)
            .with_color_space("CsR", Object::Name(b"DeviceRGB".to_vec()))
            .with_content("q /CsR cs 1 0 0 sc Q 0.5 sc")]);
        let mut seen = Vec::new();
        rewrite_content(&mut doc, |op, state| {
            if op.operator == "sc" {
                seen.push((state.space_for("sc").clone(), numbers(&op.operands).len()));
            }
            None
        })
        .unwrap();
        assert_eq!(seen, vec![(ColorSpaceKind::Rgb, 3), (ColorSpaceKind::Gray, 1)]);
    }

    #[test]
    fn undecodable_streams_are_skipped() {
        let mut doc = build_document(&[FixturePage::new(200.0, 200.0)
            .with_raw_content(b"\x00\x01garbage".to_vec(), "JBIG2Decode")]);
        let summary = rewrite_content(&mut doc, |_, _| Some(Vec::new())).unwrap();
        assert_eq!(summary, RewriteSummary { rewritten: 0, skipped: 1 });
    }

    #[test]
    fn operator_case_selects_fill_or_stroke() {
        assert_eq!(process_operator("scn"), "k");
        assert_eq!(process_operator("SC"), "K");
    }
}
