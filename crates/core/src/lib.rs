// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Threshold proxy re-encryption.
//!
//! A grantor encrypts to their own key, then [`split`]s a re-encryption key into `n` kfrags
//! for a grantee. Each relay holding a kfrag turns a [`Capsule`] into a [`CapsuleFrag`] with
//! [`reencrypt`]; the grantee checks every fragment with [`verify`] and combines any `t` of
//! them with [`aggregate`].

mod aggregate;
mod capsule;
mod capsule_frag;
mod errors;
mod hrac;
mod key_frag;
mod revocation;
mod treasure_map;
mod wire;
mod work_order;

pub use aggregate::*;
pub use capsule::*;
pub use capsule_frag::*;
pub use errors::*;
pub use hrac::*;
pub use key_frag::*;
pub use revocation::*;
pub use treasure_map::*;
pub use wire::*;
pub use work_order::*;
