// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tpre_core::{Hrac, KeyFragId};

use crate::{AbandonReason, FailureTally, RelayAddress, RelayFailure};

pub type PolicyEventSender = mpsc::UnboundedSender<PolicyEvent>;
pub type PolicyEventReceiver = mpsc::UnboundedReceiver<PolicyEvent>;

pub fn policy_event_channel() -> (PolicyEventSender, PolicyEventReceiver) {
    mpsc::unbounded_channel()
}

/// Progress notifications published by a coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PolicyEvent {
    StateChanged {
        hrac: Hrac,
        from: String,
        to: String,
    },
    WorkOrderDispatched {
        hrac: Hrac,
        relay: RelayAddress,
        kfrag: KeyFragId,
    },
    CfragVerified {
        hrac: Hrac,
        relay: RelayAddress,
        kfrag: KeyFragId,
    },
    RelayFailed {
        hrac: Hrac,
        relay: RelayAddress,
        failure: RelayFailure,
    },
    Completed {
        hrac: Hrac,
        tally: FailureTally,
    },
    Abandoned {
        hrac: Hrac,
        reason: AbandonReason,
    },
    Revoked {
        hrac: Hrac,
        relays: usize,
    },
}

impl PolicyEvent {
    pub fn hrac(&self) -> &Hrac {
        match self {
            PolicyEvent::StateChanged { hrac, .. }
            | PolicyEvent::WorkOrderDispatched { hrac, .. }
            | PolicyEvent::CfragVerified { hrac, .. }
            | PolicyEvent::RelayFailed { hrac, .. }
            | PolicyEvent::Completed { hrac, .. }
            | PolicyEvent::Abandoned { hrac, .. }
            | PolicyEvent::Revoked { hrac, .. } => hrac,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            PolicyEvent::StateChanged { .. } => "StateChanged",
            PolicyEvent::WorkOrderDispatched { .. } => "WorkOrderDispatched",
            PolicyEvent::CfragVerified { .. } => "CfragVerified",
            PolicyEvent::RelayFailed { .. } => "RelayFailed",
            PolicyEvent::Completed { .. } => "Completed",
            PolicyEvent::Abandoned { .. } => "Abandoned",
            PolicyEvent::Revoked { .. } => "Revoked",
        }
    }
}

impl fmt::Display for PolicyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyEvent::StateChanged { hrac, from, to } => {
                write!(f, "StateChanged(hrac={hrac}, {from} -> {to})")
            }
            PolicyEvent::WorkOrderDispatched { hrac, relay, kfrag } => {
                write!(f, "WorkOrderDispatched(hrac={hrac}, relay={relay}, kfrag={kfrag})")
            }
            PolicyEvent::CfragVerified { hrac, relay, kfrag } => {
                write!(f, "CfragVerified(hrac={hrac}, relay={relay}, kfrag={kfrag})")
            }
            PolicyEvent::RelayFailed {
                hrac,
                relay,
                failure,
            } => write!(f, "RelayFailed(hrac={hrac}, relay={relay}, failure={failure})"),
            PolicyEvent::Completed { hrac, tally } => {
                write!(f, "Completed(hrac={hrac}, {tally})")
            }
            PolicyEvent::Abandoned { hrac, reason } => {
                write!(f, "Abandoned(hrac={hrac}, {reason})")
            }
            PolicyEvent::Revoked { hrac, relays } => {
                write!(f, "Revoked(hrac={hrac}, relays={relays})")
            }
        }
    }
}
