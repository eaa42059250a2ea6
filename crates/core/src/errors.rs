// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use thiserror::Error;
use tpre_crypto::CryptoError;

use crate::KeyFragId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PreError {
    /// Bad point or scalar bytes, or a malformed object frame.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("object major version {major}.{minor} is not supported")]
    UnsupportedVersion { major: u16, minor: u16 },

    #[error("invalid threshold {threshold} of {shares}")]
    InvalidThreshold { threshold: usize, shares: usize },

    /// The capsule fails its encapsulation check.
    #[error("malformed capsule")]
    MalformedCapsule,

    #[error("invalid key fragment signature")]
    InvalidKeyFragSignature,

    #[error("capsule fragment proof does not verify")]
    ProofVerificationFailed,

    #[error("insufficient fragments: need {needed}, got {got}")]
    InsufficientFragments { needed: usize, got: usize },

    #[error("duplicate fragment index {0}")]
    DuplicateFragmentIndex(KeyFragId),

    /// Fragments were produced from different delegations.
    #[error("fragments do not share a precursor")]
    InconsistentFragments,

    /// The combined fragments do not open the capsule for this grantee.
    #[error("decapsulation failed")]
    DecapsulationFailed,

    #[error("treasure map is not signed by the expected publisher")]
    InvalidTreasureMapSignature,

    /// Fewer destinations than the threshold, or a threshold out of range.
    #[error("treasure map needs {threshold} relays but lists {destinations}")]
    DisorientingTreasureMap {
        threshold: usize,
        destinations: usize,
    },

    /// The map's contents belong to another policy or another grantor.
    #[error("treasure map does not match its policy")]
    TreasureMapMismatch,
}
