// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Small helpers over `lopdf` objects: reference resolution, typed accessors,
// page-tree inheritance, stream decoding and text strings.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::warn;

/// Page trees deeper than this are treated as malformed.
pub(crate) const MAX_TREE_DEPTH: usize = 64;

/// Follow references until a direct object is reached.
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    let mut current = object;
    for _ in 0..MAX_TREE_DEPTH {
        match current {
            Object::Reference(id) => current = doc.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

/// Resolve to a dictionary. Streams yield their dictionary.
pub(crate) fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, object)? {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

pub(crate) fn resolve_stream<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Stream> {
    match resolve(doc, object)? {
        Object::Stream(stream) => Some(stream),
        _ => None,
    }
}

/// Look up `key` and resolve the value.
pub(crate) fn entry<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().and_then(|value| resolve(doc, value))
}

pub(crate) fn entry_dict<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Dictionary> {
    dict.get(key).ok().and_then(|value| resolve_dict(doc, value))
}

pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

pub(crate) fn name(object: &Object) -> Option<String> {
    match object {
        Object::Name(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

pub(crate) fn entry_name(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    entry(doc, dict, key).and_then(name)
}

pub(crate) fn entry_number(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f32> {
    entry(doc, dict, key).and_then(number)
}

/// Walk the page tree upwards looking for an inheritable attribute.
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return resolve(doc, value);
        }
        let parent = current.get(b"Parent").ok()?;
        current = resolve_dict(doc, parent)?;
    }
    None
}

/// Decoded stream content, `None` when a filter cannot be undone.
pub(crate) fn stream_bytes(stream: &Stream) -> Option<Vec<u8>> {
    if stream.dict.get(b"Filter").is_ok() {
        stream.decompressed_content().ok()
    } else {
        Some(stream.content.clone())
    }
}

/// Concatenate every content stream of a page. `None` if any part is
/// undecodable.
pub(crate) fn page_content(doc: &Document, page_id: ObjectId) -> Option<Vec<u8>> {
    let page = doc.get_dictionary(page_id).ok()?;
    let mut bytes = Vec::new();
    let Some(contents) = page.get(b"Contents").ok().and_then(|c| resolve(doc, c)) else {
        return Some(bytes);
    };
    let parts: Vec<&Object> = match contents {
        Object::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    for part in parts {
        if let Some(stream) = resolve_stream(doc, part) {
            bytes.extend_from_slice(&stream_bytes(stream)?);
            bytes.push(b'\n');
        }
    }
    Some(bytes)
}

/// Decode a PDF text string (UTF-16BE with BOM, else PDFDocEncoding treated
/// as Latin-1).
pub(crate) fn text(object: &Object) -> Option<String> {
    let Object::String(bytes, _) = object else {
        return None;
    };
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&units));
    }
    Some(bytes.iter().map(|&b| b as char).collect())
}

/// Encode a text string, using UTF-16BE only when Latin-1 cannot hold it.
pub(crate) fn text_object(value: &str) -> Object {
    if value.chars().all(|ch| (ch as u32) < 0x80) {
        return Object::string_literal(value);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Object id of the document catalog.
pub(crate) fn catalog_id(doc: &Document) -> Option<ObjectId> {
    match doc.trailer.get(b"Root").ok()? {
        Object::Reference(id) => Some(*id),
        _ => None,
    }
}

/// Flate-compress `stream` in place. A stream that cannot be compressed is
/// left as it was; it is still valid uncompressed.
pub(crate) fn compress_stream(stream: &mut Stream) {
    if let Err(err) = stream.compress() {
        warn!(%err, len = stream.content.len(), "Stream left uncompressed");
    }
}
