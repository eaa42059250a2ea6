// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Curve arithmetic and symmetric primitives shared by every TPRE component.
//!
//! All group operations happen in the prime order group G1 of BN254. The crate exposes thin
//! wrappers ([`Scalar`], [`Point`]) with a fixed wire encoding so that relays, grantors and
//! grantees agree on bytes regardless of the arkworks version in use.

mod curve;
mod dem;
mod errors;
mod hashing;
mod keys;
mod params;

pub use curve::*;
pub use dem::*;
pub use errors::*;
pub use hashing::*;
pub use keys::*;
pub use params::*;
