// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-stream decoding shared by the analyzers and the rewriting fixes.

use lopdf::Object;
use lopdf::content::{Content, Operation};

use crate::pdf::objects::number;

/// Decode a content stream into operations.
pub(crate) fn decode(bytes: &[u8]) -> Result<Vec<Operation>, String> {
    Content::decode(bytes)
        .map(|content| content.operations)
        .map_err(|err| format!("content stream cannot be parsed: {}", err))
}

/// Numeric operands as f64, skipping names (e.g. a trailing pattern name).
pub(crate) fn numbers(operands: &[Object]) -> Vec<f64> {
    operands
        .iter()
        .filter_map(number)
        .map(f64::from)
        .collect()
}

/// First operand as a name.
pub(crate) fn name_operand(operands: &[Object]) -> Option<String> {
    match operands.first()? {
        Object::Name(raw) => Some(String::from_utf8_lossy(raw).into_owned()),
        _ => None,
    }
}
