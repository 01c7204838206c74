// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page-box rectangles and content-stream transformation matrices, in points.

use lopdf::{Document, Object};
use preflight_core::BoxRect;

use super::objects::{number, resolve};

/// Points per inch.
pub const POINTS_PER_INCH: f32 = 72.0;

/// Axis-aligned rectangle with normalized corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl Rect {
    /// Build from any two corners.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            llx: x0.min(x1),
            lly: y0.min(y1),
            urx: x0.max(x1),
            ury: y0.max(y1),
        }
    }

    pub fn from_size(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    /// Read a `[llx lly urx ury]` array, resolving references.
    pub(crate) fn from_object(doc: &Document, object: &Object) -> Option<Self> {
        let Object::Array(items) = resolve(doc, object)? else {
            return None;
        };
        if items.len() != 4 {
            return None;
        }
        let mut values = [0.0f32; 4];
        for (slot, item) in values.iter_mut().zip(items) {
            *slot = number(resolve(doc, item)?)?;
        }
        Some(Self::new(values[0], values[1], values[2], values[3]))
    }

    pub(crate) fn to_object(self) -> Object {
        Object::Array(vec![
            self.llx.into(),
            self.lly.into(),
            self.urx.into(),
            self.ury.into(),
        ])
    }

    pub fn width(&self) -> f32 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f32 {
        self.ury - self.lly
    }

    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Grow outwards by `amount` on every side.
    pub fn grow(&self, amount: f32) -> Self {
        Self::new(
            self.llx - amount,
            self.lly - amount,
            self.urx + amount,
            self.ury + amount,
        )
    }

    /// Shrink inwards by `amount`; `None` if nothing would remain.
    pub fn inset(&self, amount: f32) -> Option<Self> {
        if self.width() <= amount * 2.0 || self.height() <= amount * 2.0 {
            return None;
        }
        Some(Self::new(
            self.llx + amount,
            self.lly + amount,
            self.urx - amount,
            self.ury - amount,
        ))
    }

    pub fn union(&self, other: &Rect) -> Self {
        Self::new(
            self.llx.min(other.llx),
            self.lly.min(other.lly),
            self.urx.max(other.urx),
            self.ury.max(other.ury),
        )
    }

    /// Whether `other` lies inside this rectangle, allowing `tolerance`.
    pub fn contains(&self, other: &Rect, tolerance: f32) -> bool {
        other.llx >= self.llx - tolerance
            && other.lly >= self.lly - tolerance
            && other.urx <= self.urx + tolerance
            && other.ury <= self.ury + tolerance
    }

    /// Smallest distance by which this rectangle extends beyond `inner` on
    /// any side. Negative when `inner` pokes out.
    pub fn min_extension_beyond(&self, inner: &Rect) -> f32 {
        [
            inner.llx - self.llx,
            inner.lly - self.lly,
            self.urx - inner.urx,
            self.ury - inner.ury,
        ]
        .into_iter()
        .fold(f32::INFINITY, f32::min)
    }

    pub fn to_array(self) -> BoxRect {
        [self.llx, self.lly, self.urx, self.ury]
    }
}

/// Affine matrix `[a b c d e f]` using PDF's row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// Build from six numeric operands or array items.
    pub(crate) fn from_objects(items: &[Object]) -> Option<Self> {
        if items.len() != 6 {
            return None;
        }
        let mut v = [0.0f32; 6];
        for (slot, item) in v.iter_mut().zip(items) {
            *slot = number(item)?;
        }
        Some(Self::new(v[0], v[1], v[2], v[3], v[4], v[5]))
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    /// Length of the transformed unit x vector.
    pub fn x_extent(&self) -> f32 {
        self.a.hypot(self.b)
    }

    /// Length of the transformed unit y vector.
    pub fn y_extent(&self) -> f32 {
        self.c.hypot(self.d)
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}
