// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use tokio::{sync::mpsc::UnboundedReceiver, task::JoinHandle};
use tpre_coordinator::{PolicyEvent, PolicyEventReceiver};
use tracing::{error, info, warn, Instrument};

pub trait EventLogging {
    fn log(&self, logger_name: &str);
}

/// Drains a coordinator's event channel into `tracing`.
pub struct PolicyEventLogger;

impl PolicyEventLogger {
    /// Spawn the drain. The handle resolves to the number of events logged once every
    /// sender is gone.
    pub fn attach<E>(name: &str, mut events: UnboundedReceiver<E>) -> JoinHandle<usize>
    where
        E: EventLogging + Send + 'static,
    {
        let name = name.to_owned();
        info!(node=%name, "READY!");
        tokio::spawn(
            async move {
                let mut logged = 0;
                while let Some(event) = events.recv().await {
                    event.log(&name);
                    logged += 1;
                }
                logged
            }
            .in_current_span(),
        )
    }

    pub fn attach_policy(name: &str, events: PolicyEventReceiver) -> JoinHandle<usize> {
        Self::attach(name, events)
    }
}

impl EventLogging for PolicyEvent {
    fn log(&self, logger_name: &str) {
        let hrac = self.hrac();
        match self {
            PolicyEvent::Abandoned { .. } => {
                error!(me = logger_name, evt = %self, hrac = %hrac, "Policy abandoned")
            }
            PolicyEvent::RelayFailed { .. } => {
                warn!(me = logger_name, evt = %self, hrac = %hrac, "Relay failed")
            }
            _ => info!(me = logger_name, evt = %self, hrac = %hrac, "Event Broadcasted"),
        }
    }
}
