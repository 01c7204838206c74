// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: object helpers, geometry, the analysis snapshot, page copying
// and document metadata.

pub mod copy;
pub mod geometry;
pub mod metadata;
pub(crate) mod objects;
pub mod snapshot;

pub use geometry::{Matrix, POINTS_PER_INCH, Rect};
pub use snapshot::{DocumentSnapshot, load_document};
