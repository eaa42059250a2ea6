// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use thiserror::Error;
use tpre_core::{Hrac, PreError};

use crate::{AbandonReason, FailureTally};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoordinatorError {
    #[error(transparent)]
    Pre(#[from] PreError),

    #[error("policy {hrac} expired ({tally})")]
    PolicyExpired { hrac: Hrac, tally: FailureTally },

    #[error("policy abandoned: {0}")]
    Abandoned(AbandonReason),

    #[error("cannot {operation} while the policy is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("secret key does not belong to the policy's delegator")]
    DelegatorMismatch,

    #[error("secret key does not belong to the policy's grantee")]
    GranteeMismatch,
}
