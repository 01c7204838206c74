// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Preflight analyzers. Each is a pure function of a `DocumentSnapshot`;
// `report` fans out to all of them and derives the findings.

pub mod boxes;
pub mod color_space;
pub(crate) mod content;
pub mod fonts;
pub mod images;
pub mod pdfx;
pub mod report;
pub mod transparency;

pub use report::{build_report, build_report_since};

/// Result of an analyzer that may fall back to a conservative default.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis<T> {
    Clean(T),
    Degraded { value: T, reason: String },
}

impl<T> Analysis<T> {
    pub fn value(&self) -> &T {
        match self {
            Self::Clean(value) | Self::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Clean(value) | Self::Degraded { value, .. } => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Clean(_) => None,
            Self::Degraded { reason, .. } => Some(reason),
        }
    }

    /// Split into the value and the degradation reason, if any.
    pub fn into_parts(self) -> (T, Option<String>) {
        match self {
            Self::Clean(value) => (value, None),
            Self::Degraded { value, reason } => (value, Some(reason)),
        }
    }
}
