// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use thiserror::Error;
use tpre_core::{Hrac, PreError};

/// Reasons a relay refuses a work order or a revocation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayServiceError {
    #[error("work order is not signed by the grantee for this relay")]
    InvalidWorkOrderSignature,

    #[error("work order grantee does not match the kfrag's grantee")]
    GranteeMismatch,

    #[error("policy grant signature does not verify")]
    InvalidGrant,

    #[error("invalid kfrag: {0}")]
    InvalidKeyFrag(PreError),

    #[error("policy {0} has been revoked")]
    Revoked(Hrac),

    #[error("policy {hrac} expired at {expired_at}")]
    PolicyExpired { hrac: Hrac, expired_at: u64 },

    #[error("revocation signature does not verify")]
    InvalidRevocation,

    /// Re-encryption refused the input, typically [`PreError::MalformedCapsule`].
    #[error(transparent)]
    Reencryption(#[from] PreError),

    #[error("re-encryption worker failed: {0}")]
    Worker(String),
}
