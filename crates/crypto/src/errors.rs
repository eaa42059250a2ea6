// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use thiserror::Error;

/// Errors raised by the curve and symmetric primitives.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// Malformed point or scalar bytes: wrong length, unknown tag or unreduced value.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(&'static str),

    /// The encoded x coordinate does not lie on the curve.
    #[error("point is not on the curve")]
    PointNotOnCurve,

    /// A zero scalar was supplied where an invertible one is required.
    #[error("scalar is zero")]
    ZeroScalar,

    #[error("key derivation failed")]
    Kdf,

    #[error("encryption failed")]
    Encryption,

    /// Authentication tag mismatch, wrong key or truncated ciphertext.
    #[error("decryption failed")]
    Decryption,
}
