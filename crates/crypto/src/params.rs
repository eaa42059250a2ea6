// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use once_cell::sync::Lazy;

use crate::{hash_to_point, Point};

/// Public system parameters: the group generator `g` and a second generator `u` whose discrete
/// log relative to `g` is unknown to everyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameters {
    pub g: Point,
    pub u: Point,
}

static PARAMETERS: Lazy<Parameters> = Lazy::new(|| Parameters {
    g: Point::generator(),
    u: hash_to_point(b"TPRE/PARAMETERS", b"U"),
});

pub fn parameters() -> &'static Parameters {
    &PARAMETERS
}
