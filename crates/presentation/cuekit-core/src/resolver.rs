//! Placement resolution.
//!
//! Turns the user-supplied geometry parameters and fractional hints of an
//! element into a [`PlacementSpec`] that fixes both axes:
//!
//! 1. Combined keys expand: `pos` supplies x/y, `size` supplies width/height,
//!    `center` supplies center_x/center_y.
//! 2. An axis with two or more of {low edge, high edge, center, extent}
//!    supplied is pinned: all four count as resolved. The redundant values are
//!    not checked against each other.
//! 3. An axis without any absolute position component and without a position
//!    hint gets a centered hint (0.5).
//! 4. Without a combined size hint, both per-axis size hints default to
//!    [`SizeHint::Unset`] so absolute sizes are not stretched to the parent.

use serde::Serialize;

use crate::params::{Hints, PlacementKey, SizeHint};
use crate::value::PropertyMap;

/// Which absolute components of one axis are known.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AxisBasis {
    /// x (horizontal) or y (vertical)
    pub low: bool,
    /// right or top
    pub high: bool,
    pub center: bool,
    /// width or height
    pub extent: bool,
}

impl AxisBasis {
    pub const PINNED: AxisBasis = AxisBasis {
        low: true,
        high: true,
        center: true,
        extent: true,
    };

    #[inline]
    pub fn count(&self) -> usize {
        [self.low, self.high, self.center, self.extent]
            .into_iter()
            .filter(|b| *b)
            .count()
    }

    /// Two or more components determine the whole axis.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.count() >= 2
    }

    #[inline]
    pub fn has_position(&self) -> bool {
        self.low || self.high || self.center
    }
}

/// Fully resolved geometry description handed to the toolkit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlacementSpec {
    pub horizontal: AxisBasis,
    pub vertical: AxisBasis,
    pub hints: Hints,
    /// Every resolved parameter, geometry keys included.
    pub properties: PropertyMap,
}

/// Resolve resolved parameter values and hints into a placement spec.
pub fn resolve(properties: &PropertyMap, hints: &Hints) -> PlacementSpec {
    let has = |key: PlacementKey| properties.contains_key(key.name());

    let mut horizontal = AxisBasis {
        low: has(PlacementKey::Pos) || has(PlacementKey::X),
        high: has(PlacementKey::Right),
        center: has(PlacementKey::Center) || has(PlacementKey::CenterX),
        extent: has(PlacementKey::Size) || has(PlacementKey::Width),
    };
    let mut vertical = AxisBasis {
        low: has(PlacementKey::Pos) || has(PlacementKey::Y),
        high: has(PlacementKey::Top),
        center: has(PlacementKey::Center) || has(PlacementKey::CenterY),
        extent: has(PlacementKey::Size) || has(PlacementKey::Height),
    };

    if horizontal.is_pinned() {
        horizontal = AxisBasis::PINNED;
    }
    if vertical.is_pinned() {
        vertical = AxisBasis::PINNED;
    }

    let mut hints = *hints;
    if !(hints.pos_hint.has_horizontal() || horizontal.has_position()) {
        hints.pos_hint.center_x = Some(0.5);
    }
    if !(hints.pos_hint.has_vertical() || vertical.has_position()) {
        hints.pos_hint.center_y = Some(0.5);
    }

    if hints.size_hint.is_none() {
        hints.size_hint_x.get_or_insert(SizeHint::Unset);
        hints.size_hint_y.get_or_insert(SizeHint::Unset);
    }

    PlacementSpec {
        horizontal,
        vertical,
        hints,
        properties: properties.clone(),
    }
}
