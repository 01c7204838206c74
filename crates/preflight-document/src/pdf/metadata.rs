// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document Info dictionary: reading, writing, fix journal and the canonical
// producer stamp.

use chrono::{DateTime, Utc};
use lopdf::{Dictionary, Document, Object, ObjectId};
use preflight_core::error::{PreflightError, Result};

use super::objects::{resolve, resolve_dict, text, text_object};

pub const PRODUCER: &str = "PreFlight Pro PDF Processor";
pub const CREATOR: &str = "PreFlight Pro";

/// Info key recording every fix applied, in order, comma separated.
pub const FIX_JOURNAL_KEY: &str = "PreflightFixes";

/// Format a timestamp as a PDF date string (`D:YYYYMMDDHHmmSSZ`).
pub fn pdf_date(at: DateTime<Utc>) -> String {
    at.format("D:%Y%m%d%H%M%SZ").to_string()
}

/// Read a text field from the Info dictionary.
pub fn info_text(doc: &Document, key: &str) -> Option<String> {
    let info = doc.trailer.get(b"Info").ok().and_then(|i| resolve_dict(doc, i))?;
    info.get(key.as_bytes()).ok().and_then(|v| resolve(doc, v)).and_then(text)
}

/// The Info dictionary, created (and made indirect) when absent.
pub fn info_mut(doc: &mut Document) -> Result<&mut Dictionary> {
    let id = info_id(doc);
    match doc.get_object_mut(id) {
        Ok(Object::Dictionary(dict)) => Ok(dict),
        _ => Err(PreflightError::PdfError("Info is not a dictionary".into())),
    }
}

fn info_id(doc: &mut Document) -> ObjectId {
    match doc.trailer.get(b"Info").ok().cloned() {
        Some(Object::Reference(id))
            if matches!(doc.get_object(id), Ok(Object::Dictionary(_))) =>
        {
            id
        }
        Some(Object::Dictionary(inline)) => {
            let id = doc.add_object(inline);
            doc.trailer.set("Info", id);
            id
        }
        _ => {
            let id = doc.add_object(Dictionary::new());
            doc.trailer.set("Info", id);
            id
        }
    }
}

pub fn set_info_text(doc: &mut Document, key: &str, value: &str) -> Result<()> {
    info_mut(doc)?.set(key, text_object(value));
    Ok(())
}

pub fn set_info_name(doc: &mut Document, key: &str, value: &str) -> Result<()> {
    info_mut(doc)?.set(key, Object::Name(value.as_bytes().to_vec()));
    Ok(())
}

/// Append a fix token to the journal.
pub fn journal_fix(doc: &mut Document, token: &str) -> Result<()> {
    let journal = match info_text(doc, FIX_JOURNAL_KEY) {
        Some(existing) if !existing.is_empty() => format!("{},{}", existing, token),
        _ => token.to_string(),
    };
    set_info_text(doc, FIX_JOURNAL_KEY, &journal)
}

/// Fix tokens recorded in the journal, oldest first.
pub fn journaled_fixes(doc: &Document) -> Vec<String> {
    info_text(doc, FIX_JOURNAL_KEY)
        .map(|journal| {
            journal
                .split(',')
                .filter(|token| !token.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Stamp the canonical producer and creator, filling missing descriptive
/// fields and refreshing the modification date.
pub fn stamp_canonical(doc: &mut Document, at: DateTime<Utc>) -> Result<()> {
    let date = pdf_date(at);
    for (key, fallback) in [("Title", "Untitled"), ("Author", "Unknown"), ("CreationDate", date.as_str())] {
        if info_text(doc, key).is_none_or(|value| value.trim().is_empty()) {
            set_info_text(doc, key, fallback)?;
        }
    }
    set_info_text(doc, "Producer", PRODUCER)?;
    set_info_text(doc, "Creator", CREATOR)?;
    set_info_text(doc, "ModDate", &date)
}
