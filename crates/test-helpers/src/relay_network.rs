// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use rand::rngs::OsRng;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tpre_coordinator::{RelayAddress, RelayError, RelayRecord, RelayTransport};
use tpre_core::{
    reencrypt, Capsule, CapsuleFrag, PreError, ProtocolObject, Revocation, WorkOrder,
    WorkOrderResponse, HEADER_SIZE, KEY_FRAG_ID_SIZE,
};
use tpre_crypto::{Point, Signer, POINT_SIZE};
use tpre_relay::RelayService;
use tpre_utils::ArcBytes;
use tracing::{debug, error};

/// How a simulated relay answers work orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayBehaviour {
    Honest,
    /// Re-encrypts a decoy capsule with the right kfrag, so the proof does not verify.
    CorruptProof,
    /// Answers honestly but signs the response with a key that is not its identity.
    ForgedSignature,
    /// Answers with bytes that do not decode.
    Malformed,
    /// Answers with its honest cfrag under a different precursor, signed with its own key.
    SwappedPrecursor,
    /// The task carrying the work order panics.
    Panics,
    Unreachable,
    /// Answers honestly after a delay.
    Slow(Duration),
}

#[derive(Clone)]
struct SimulatedRelay {
    signer: Signer,
    service: RelayService,
    behaviour: RelayBehaviour,
    work_orders: Arc<AtomicUsize>,
}

/// In-process stand-in for the relay network. Every message crosses a bincode round trip
/// and travels as an [`ArcBytes`] frame.
#[derive(Clone)]
pub struct RelayNetworkMock {
    relays: Arc<RwLock<HashMap<RelayAddress, SimulatedRelay>>>,
    max_tasks: usize,
}

impl Default for RelayNetworkMock {
    fn default() -> Self {
        Self::new(4)
    }
}

impl RelayNetworkMock {
    pub fn new(max_tasks: usize) -> Self {
        Self {
            relays: Arc::new(RwLock::new(HashMap::new())),
            max_tasks,
        }
    }

    /// Start a relay with a fresh identity and return its roster entry.
    pub async fn add_relay(&self, behaviour: RelayBehaviour, stake: u64) -> RelayRecord {
        let signer = Signer::random();
        let record = RelayRecord::new(signer.verifying_key(), stake);
        let relay = SimulatedRelay {
            service: RelayService::new(signer.clone(), self.max_tasks),
            signer,
            behaviour,
            work_orders: Arc::new(AtomicUsize::new(0)),
        };
        self.relays.write().await.insert(record.address, relay);
        record
    }

    pub async fn set_behaviour(&self, address: &RelayAddress, behaviour: RelayBehaviour) {
        if let Some(relay) = self.relays.write().await.get_mut(address) {
            relay.behaviour = behaviour;
        }
    }

    /// Work orders delivered to a relay, whatever it did with them.
    pub async fn work_orders_received(&self, address: &RelayAddress) -> usize {
        self.relays
            .read()
            .await
            .get(address)
            .map(|relay| relay.work_orders.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub async fn service(&self, address: &RelayAddress) -> Option<RelayService> {
        self.relays
            .read()
            .await
            .get(address)
            .map(|relay| relay.service.clone())
    }

    async fn reach(&self, address: &RelayAddress) -> Result<SimulatedRelay, RelayError> {
        let relay = self
            .relays
            .read()
            .await
            .get(address)
            .cloned()
            .ok_or(RelayError::Unreachable(*address))?;
        if relay.behaviour == RelayBehaviour::Unreachable {
            return Err(RelayError::Unreachable(*address));
        }
        Ok(relay)
    }
}

impl SimulatedRelay {
    async fn answer(
        &self,
        address: RelayAddress,
        order: WorkOrder,
    ) -> Result<WorkOrderResponse, RelayError> {
        match self.behaviour {
            RelayBehaviour::Honest | RelayBehaviour::Unreachable => {
                self.honest(address, order).await
            }
            RelayBehaviour::Slow(delay) => {
                tokio::time::sleep(delay).await;
                self.honest(address, order).await
            }
            RelayBehaviour::ForgedSignature => {
                let response = self.honest(address, order).await?;
                Ok(WorkOrderResponse::new(&Signer::random(), response.into_cfrag()))
            }
            RelayBehaviour::SwappedPrecursor => {
                let response = self.honest(address, order).await?;
                let cfrag = swap_precursor(&response.into_cfrag(), &Point::generator())
                    .map_err(|err| refused(address, err))?;
                Ok(WorkOrderResponse::new(&self.signer, cfrag))
            }
            RelayBehaviour::Panics => panic!("relay {address} crashed mid-order"),
            RelayBehaviour::CorruptProof => self.corrupt(address, order),
            RelayBehaviour::Malformed => decode(address, b"\x00\x01 not a response"),
        }
    }

    async fn honest(
        &self,
        address: RelayAddress,
        order: WorkOrder,
    ) -> Result<WorkOrderResponse, RelayError> {
        self.service
            .handle_work_order(order)
            .await
            .map_err(|err| refused(address, err))
    }

    fn corrupt(
        &self,
        address: RelayAddress,
        order: WorkOrder,
    ) -> Result<WorkOrderResponse, RelayError> {
        let grant = order.grant();
        let kfrag = grant
            .kfrag()
            .clone()
            .verify(grant.grantor())
            .map_err(|(err, _)| refused(address, err))?;
        let (decoy, _) = Capsule::encapsulate(&mut OsRng, kfrag.delegating_pk())
            .map_err(|err| refused(address, err))?;
        let cfrag = reencrypt(&mut OsRng, &decoy, &kfrag).map_err(|err| refused(address, err))?;
        Ok(WorkOrderResponse::new(&self.signer, cfrag))
    }
}

#[async_trait]
impl RelayTransport for RelayNetworkMock {
    async fn send_work_order(
        &self,
        relay: &RelayRecord,
        order: WorkOrder,
    ) -> Result<WorkOrderResponse, RelayError> {
        let node = self.reach(&relay.address).await?;
        node.work_orders.fetch_add(1, Ordering::SeqCst);

        let order: WorkOrder = through_wire(relay.address, &order)?;
        let response = node.answer(relay.address, order).await?;
        debug!(relay = %relay.address, "relay answered");
        through_wire(relay.address, &response)
    }

    async fn send_revocation(
        &self,
        relay: &RelayRecord,
        revocation: Revocation,
    ) -> Result<(), RelayError> {
        let node = self.reach(&relay.address).await?;
        let revocation: Revocation = through_wire(relay.address, &revocation)?;
        node.service
            .revoke(&revocation)
            .map_err(|err| refused(relay.address, err))
    }
}

/// Re-encode `cfrag` with another precursor, leaving the proof untouched.
pub fn swap_precursor(cfrag: &CapsuleFrag, precursor: &Point) -> Result<CapsuleFrag, PreError> {
    let mut bytes = cfrag.to_bytes();
    let at = HEADER_SIZE + 2 * POINT_SIZE + KEY_FRAG_ID_SIZE;
    bytes[at..at + POINT_SIZE].copy_from_slice(&precursor.to_bytes());
    CapsuleFrag::from_bytes(&bytes)
}

fn through_wire<T: Serialize + DeserializeOwned>(
    relay: RelayAddress,
    value: &T,
) -> Result<T, RelayError> {
    let frame = bincode::serialize(value)
        .map(ArcBytes::from_bytes)
        .map_err(|err| {
            error!(error = %err, "could not encode message");
            RelayError::Malformed {
                relay,
                reason: err.to_string(),
            }
        })?;
    decode(relay, &frame)
}

fn decode<T: DeserializeOwned>(relay: RelayAddress, bytes: &[u8]) -> Result<T, RelayError> {
    bincode::deserialize(bytes).map_err(|err| RelayError::Malformed {
        relay,
        reason: err.to_string(),
    })
}

fn refused(relay: RelayAddress, err: impl ToString) -> RelayError {
    RelayError::Refused {
        relay,
        reason: err.to_string(),
    }
}
