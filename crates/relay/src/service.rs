// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use tokio::sync::Semaphore;
use tpre_core::{reencrypt, Hrac, Revocation, WorkOrder, WorkOrderResponse};
use tpre_crypto::{PublicKey, Signer};
use tracing::{info, instrument, warn};

use crate::RelayServiceError;

/// Executes work orders for one relay identity.
///
/// Relays hold no long-lived kfrag state: each work order carries its grantor-signed kfrag.
/// What they do remember is which policies were revoked, and by whom.
#[derive(Clone)]
pub struct RelayService {
    identity: Arc<Signer>,
    /// Grantors that revoked each policy. Entries are never removed.
    revoked: Arc<RwLock<HashMap<Hrac, Vec<PublicKey>>>>,
    semaphore: Arc<Semaphore>,
}

impl RelayService {
    /// `max_tasks` bounds the number of re-encryptions running on blocking threads at once.
    pub fn new(identity: Signer, max_tasks: usize) -> Self {
        Self {
            identity: Arc::new(identity),
            revoked: Arc::new(RwLock::new(HashMap::new())),
            semaphore: Arc::new(Semaphore::new(max_tasks.max(1))),
        }
    }

    pub fn identity(&self) -> PublicKey {
        self.identity.verifying_key()
    }

    pub async fn handle_work_order(
        &self,
        order: WorkOrder,
    ) -> Result<WorkOrderResponse, RelayServiceError> {
        self.handle_work_order_at(order, Utc::now()).await
    }

    #[instrument(skip_all, fields(hrac = %order.grant().hrac()))]
    pub async fn handle_work_order_at(
        &self,
        order: WorkOrder,
        now: DateTime<Utc>,
    ) -> Result<WorkOrderResponse, RelayServiceError> {
        let grant = order.grant();
        let hrac = *grant.hrac();

        if !order.verify(&self.identity()) {
            warn!("rejecting work order with bad grantee signature");
            return Err(RelayServiceError::InvalidWorkOrderSignature);
        }
        if order.grantee() != grant.kfrag().receiving_pk() {
            return Err(RelayServiceError::GranteeMismatch);
        }
        if !grant.verify() {
            return Err(RelayServiceError::InvalidGrant);
        }
        if self.is_revoked(&hrac, grant.grantor()) {
            info!("refusing work order for revoked policy");
            return Err(RelayServiceError::Revoked(hrac));
        }
        // A deadline past i64::MAX seconds never arrives.
        let expired = i64::try_from(grant.expires_at()).is_ok_and(|at| now.timestamp() >= at);
        if expired {
            info!("refusing work order for expired policy");
            return Err(RelayServiceError::PolicyExpired {
                hrac,
                expired_at: grant.expires_at(),
            });
        }

        let kfrag = grant
            .kfrag()
            .clone()
            .verify(grant.grantor())
            .map_err(|(err, _)| RelayServiceError::InvalidKeyFrag(err))?;
        let capsule = *order.capsule();

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| RelayServiceError::Worker(e.to_string()))?;
        let cfrag = tokio::task::spawn_blocking(move || reencrypt(&mut OsRng, &capsule, &kfrag))
            .await
            .map_err(|e| RelayServiceError::Worker(e.to_string()))??;

        info!(kfrag = %cfrag.kfrag_id(), "work order complete");
        Ok(WorkOrderResponse::new(&self.identity, cfrag))
    }

    /// Record a grantor's revocation. Later work orders for the policy that carry a grant from
    /// the same grantor are refused.
    pub fn revoke(&self, revocation: &Revocation) -> Result<(), RelayServiceError> {
        if !revocation.verify() {
            return Err(RelayServiceError::InvalidRevocation);
        }
        info!(hrac = %revocation.hrac(), "policy revoked");
        let mut revoked = self
            .revoked
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let revokers = revoked.entry(*revocation.hrac()).or_default();
        if !revokers.contains(revocation.grantor()) {
            revokers.push(*revocation.grantor());
        }
        Ok(())
    }

    pub fn is_revoked(&self, hrac: &Hrac, grantor: &PublicKey) -> bool {
        self.revoked
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(hrac)
            .is_some_and(|revokers| revokers.contains(grantor))
    }
}

impl std::fmt::Debug for RelayService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayService")
            .field("identity", &self.identity())
            .finish_non_exhaustive()
    }
}
