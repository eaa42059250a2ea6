// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use async_trait::async_trait;
use thiserror::Error;
use tpre_core::{Revocation, WorkOrder, WorkOrderResponse};

use crate::{RelayAddress, RelayRecord};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("relay {0} is unreachable")]
    Unreachable(RelayAddress),

    #[error("relay {relay} sent a malformed response: {reason}")]
    Malformed { relay: RelayAddress, reason: String },

    /// The relay answered but declined the request (revoked, expired, bad order).
    #[error("relay {relay} refused the request: {reason}")]
    Refused { relay: RelayAddress, reason: String },
}

/// How a coordinator talks to relays. Implementations own framing and delivery.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn send_work_order(
        &self,
        relay: &RelayRecord,
        order: WorkOrder,
    ) -> Result<WorkOrderResponse, RelayError>;

    async fn send_revocation(
        &self,
        relay: &RelayRecord,
        revocation: Revocation,
    ) -> Result<(), RelayError>;
}
