// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    sync::Arc,
    time::Duration,
};

use chrono::Utc;
use futures::future::join_all;
use tokio::{
    task::{Id, JoinSet},
    time::{sleep_until, timeout, Instant},
};
use tpre_config::TpreConfig;
use tpre_core::{
    aggregate, split, Capsule, Destination, EncryptedTreasureMap, PolicyGrant, PreError,
    ProtocolObject, Revocation, TreasureMap, VerifiedCapsuleFrag, WorkOrder, WorkOrderResponse,
};
use tpre_crypto::{PublicKey, SecretKey, Signer, SymmetricKey};
use tpre_utils::{create_shared_rng, rand_array, to_ordered_vec, with_rng, SharedRng};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    AbandonCause, AbandonReason, Aggregating, AwaitingCfrags, Complete, CoordinatorError,
    Distributing, FailureTally, Policy, PolicyEvent, PolicyEventSender, PolicyState,
    RelayAddress, RelayError, RelayFailure, RelayRecord, RelayTransport,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub work_order_timeout: Duration,
    /// Work orders kept in flight. Never below the threshold, never above the share count.
    pub fan_out: Option<usize>,
    pub min_stake: u64,
    pub selection_seed: Option<u64>,
}

impl From<&TpreConfig> for CoordinatorConfig {
    fn from(config: &TpreConfig) -> Self {
        Self {
            work_order_timeout: config.work_order_timeout(),
            fan_out: config.fan_out,
            min_stake: config.min_stake,
            selection_seed: config.selection_seed,
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from(&TpreConfig::default())
    }
}

enum Outcome {
    Response(WorkOrderResponse),
    Failed(RelayError),
    Timeout,
    /// The task running the order panicked.
    Crashed,
}

/// Verified cfrags of one capsule, keyed by grant slot.
type CfragSet = HashMap<usize, VerifiedCapsuleFrag>;

/// Drives a single policy from key splitting to recovered symmetric keys.
///
/// The grantor side starts with [`PolicyCoordinator::distribute`]; a grantee holding only the
/// published treasure map starts with [`PolicyCoordinator::open_treasure_map`]. Either way
/// any number of capsules can then be retrieved until the policy expires.
pub struct PolicyCoordinator {
    policy: Policy,
    transport: Arc<dyn RelayTransport>,
    config: CoordinatorConfig,
    state: PolicyState,
    rng: SharedRng,
    events: Option<PolicyEventSender>,
    /// Relays that were given, or may have been given, a kfrag of this policy.
    assigned: BTreeMap<RelayAddress, RelayRecord>,
    delegation: Option<Distributing>,
    treasure_map: Option<EncryptedTreasureMap>,
    /// Cfrags already verified, per capsule wire encoding.
    history: HashMap<Vec<u8>, CfragSet>,
}

impl PolicyCoordinator {
    pub fn new(
        policy: Policy,
        transport: Arc<dyn RelayTransport>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            policy,
            transport,
            config,
            state: PolicyState::Created,
            rng: create_shared_rng(),
            events: None,
            assigned: BTreeMap::new(),
            delegation: None,
            treasure_map: None,
            history: HashMap::new(),
        }
    }

    pub fn with_rng(mut self, rng: SharedRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_events(mut self, events: PolicyEventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn state(&self) -> &PolicyState {
        &self.state
    }

    /// Outcome of the last retrieval, once it completed.
    pub fn completion(&self) -> Result<Complete, CoordinatorError> {
        Complete::try_from(&self.state)
    }

    /// Relays holding a kfrag of this policy, ordered by address.
    pub fn assigned_relays(&self) -> impl Iterator<Item = &RelayRecord> {
        self.assigned.values()
    }

    /// The map to publish for the grantee, available once the policy is distributed.
    pub fn treasure_map(&self) -> Option<&EncryptedTreasureMap> {
        self.treasure_map.as_ref()
    }

    /// Split the delegating key, sign a grant per kfrag, rank the eligible relays and seal
    /// the treasure map for the grantee.
    #[instrument(skip_all, fields(hrac = %self.policy.hrac()))]
    pub fn distribute(
        &mut self,
        delegating_sk: &SecretKey,
        grantor: &Signer,
    ) -> Result<(), CoordinatorError> {
        self.require_created("distribute")?;
        if delegating_sk.public_key() != *self.policy.delegating_pk() {
            return Err(CoordinatorError::DelegatorMismatch);
        }
        if self.policy.is_expired_at(Utc::now()) {
            return Err(self.expire(FailureTally::default()));
        }

        let threshold = self.policy.threshold();
        let shares = self.policy.shares();
        let candidates = self
            .policy
            .roster()
            .select(self.selection_seed(), self.config.min_stake);
        if candidates.len() < threshold {
            warn!(
                eligible = candidates.len(),
                threshold, "not enough eligible relays for the policy"
            );
            let reason = self.abandon(AbandonCause::RelayShortage, FailureTally::default());
            return Err(CoordinatorError::Abandoned(reason));
        }

        let kfrags = with_rng(&self.rng, |rng| {
            split(
                rng,
                delegating_sk,
                self.policy.grantee_pk(),
                grantor,
                threshold,
                shares,
            )
        })?;

        let hrac = *self.policy.hrac();
        // Grants carry whole seconds; round up so relays never expire a policy early.
        let expiration = self.policy.expiration();
        let rounding = i64::from(expiration.timestamp_subsec_nanos() > 0);
        let expires_at = (expiration.timestamp() + rounding).max(0) as u64;
        let grants: Vec<PolicyGrant> = kfrags
            .into_iter()
            .map(|kfrag| PolicyGrant::new(grantor, hrac, expires_at, kfrag.unverify()))
            .collect();

        let destinations = grants
            .iter()
            .zip(&candidates)
            .map(|(grant, relay)| Destination {
                relay: relay.identity,
                grant: grant.clone(),
            })
            .collect();
        let map = TreasureMap::new(hrac, threshold, destinations)?;
        let sealed = with_rng(&self.rng, |rng| {
            map.encrypt(rng, grantor, self.policy.grantee_pk())
        })?;

        for relay in candidates.iter().take(shares) {
            self.assigned.insert(relay.address, relay.clone());
        }
        debug!(
            candidates = candidates.len(),
            grants = grants.len(),
            "kfrags ready for dispatch"
        );
        self.treasure_map = Some(sealed);
        self.enter_distributing(Distributing { grants, candidates });
        Ok(())
    }

    /// Grantee side: take the grants and relays from the grantor's published treasure map.
    ///
    /// The listed relays keep their slots; the rest of the eligible roster, ranked by the
    /// selection seed, stands by as substitutes.
    #[instrument(skip_all, fields(hrac = %self.policy.hrac()))]
    pub fn open_treasure_map(
        &mut self,
        map: &EncryptedTreasureMap,
        grantee_sk: &SecretKey,
        publisher: &PublicKey,
    ) -> Result<(), CoordinatorError> {
        self.require_created("open treasure map")?;
        if grantee_sk.public_key() != *self.policy.grantee_pk() {
            return Err(CoordinatorError::GranteeMismatch);
        }
        if map.hrac() != self.policy.hrac() {
            return Err(PreError::TreasureMapMismatch.into());
        }
        let opened = map.decrypt(grantee_sk, publisher)?;
        if opened.threshold() != self.policy.threshold() {
            warn!(
                listed = opened.threshold(),
                expected = self.policy.threshold(),
                "treasure map threshold differs from the policy"
            );
            return Err(PreError::TreasureMapMismatch.into());
        }

        let roster = self.policy.roster();
        let (grants, mut candidates): (Vec<_>, Vec<_>) = opened
            .destinations()
            .iter()
            .map(|destination| {
                let address = RelayAddress::from_identity(&destination.relay);
                let relay = roster
                    .get(&address)
                    .cloned()
                    .unwrap_or_else(|| RelayRecord::new(destination.relay, 0));
                (destination.grant.clone(), relay)
            })
            .unzip();
        let listed: HashSet<RelayAddress> = candidates.iter().map(|r| r.address).collect();
        let spares: Vec<RelayRecord> = roster
            .select(self.selection_seed(), self.config.min_stake)
            .into_iter()
            .filter(|relay| !listed.contains(&relay.address))
            .collect();

        for relay in &candidates {
            self.assigned.insert(relay.address, relay.clone());
        }
        candidates.extend(spares);
        info!(
            destinations = grants.len(),
            candidates = candidates.len(),
            "treasure map opened"
        );
        self.treasure_map = Some(map.clone());
        self.enter_distributing(Distributing { grants, candidates });
        Ok(())
    }

    /// Fan work orders out, collect `threshold` verified cfrags and open the capsule.
    ///
    /// A relay that times out, cannot be reached, answers with a malformed or unsigned
    /// response or a cfrag that fails its proof is replaced by the next ranked relay, which
    /// receives the same grant. Outstanding orders are aborted once the threshold is met.
    /// Cfrags verified for a capsule are kept, so retrieving it again does not go back to
    /// the relays.
    #[instrument(skip_all, fields(hrac = %self.policy.hrac()))]
    pub async fn retrieve(
        &mut self,
        capsule: &Capsule,
        grantee_sk: &SecretKey,
    ) -> Result<SymmetricKey, CoordinatorError> {
        let delegation = self.delegation("retrieve")?.clone();
        if grantee_sk.public_key() != *self.policy.grantee_pk() {
            return Err(CoordinatorError::GranteeMismatch);
        }

        let mut tally = FailureTally::default();
        let now = Utc::now();
        if self.policy.is_expired_at(now) {
            return Err(self.expire(tally));
        }
        let deadline = Instant::now() + self.policy.remaining(now);

        let threshold = self.policy.threshold();
        let capsule_id = capsule.to_bytes();
        let mut verified = self.history.get(&capsule_id).cloned().unwrap_or_default();
        if verified.len() < threshold {
            let grantee = Signer::new(grantee_sk.clone());
            self.collect(
                capsule,
                &grantee,
                &delegation,
                deadline,
                &mut verified,
                &mut tally,
            )
            .await?;
            self.history.insert(capsule_id, verified.clone());
        } else {
            debug!(cached = verified.len(), "reusing verified cfrags");
        }

        self.transition(PolicyState::Aggregating(Aggregating {
            verified: verified.len(),
            tally,
        }));
        let cfrags = to_ordered_vec(verified);
        match aggregate(
            capsule,
            &cfrags,
            threshold,
            grantee_sk,
            self.policy.delegating_pk(),
        ) {
            Ok(key) => {
                self.transition(PolicyState::Complete(Complete { tally }));
                self.emit(PolicyEvent::Completed {
                    hrac: *self.policy.hrac(),
                    tally,
                });
                Ok(key)
            }
            Err(err) => {
                error!(error = %err, "verified cfrags did not aggregate");
                self.abandon(AbandonCause::AggregationFailed, tally);
                Err(err.into())
            }
        }
    }

    /// Send a signed revocation to every assigned relay. Returns each relay's answer.
    #[instrument(skip_all, fields(hrac = %self.policy.hrac()))]
    pub async fn revoke(
        &mut self,
        grantor: &Signer,
    ) -> Result<Vec<(RelayAddress, Result<(), RelayError>)>, CoordinatorError> {
        self.delegation("revoke")?;

        let revocation = Revocation::new(grantor, *self.policy.hrac());
        let sends = self.assigned.values().map(|relay| {
            let transport = Arc::clone(&self.transport);
            async move {
                let result = transport.send_revocation(relay, revocation).await;
                (relay.address, result)
            }
        });
        let results = join_all(sends).await;

        let accepted = results.iter().filter(|(_, r)| r.is_ok()).count();
        for (relay, result) in &results {
            if let Err(err) = result {
                warn!(%relay, error = %err, "revocation not delivered");
            }
        }
        info!(accepted, relays = results.len(), "policy revoked");
        self.emit(PolicyEvent::Revoked {
            hrac: *self.policy.hrac(),
            relays: accepted,
        });
        Ok(results)
    }

    /// Dispatch work orders for the slots without a verified cfrag and gather responses until
    /// `verified` reaches the threshold.
    async fn collect(
        &mut self,
        capsule: &Capsule,
        grantee: &Signer,
        delegation: &Distributing,
        deadline: Instant,
        verified: &mut CfragSet,
        tally: &mut FailureTally,
    ) -> Result<(), CoordinatorError> {
        let Distributing { grants, candidates } = delegation;
        let threshold = self.policy.threshold();
        let width = self
            .config
            .fan_out
            .unwrap_or(grants.len())
            .clamp(threshold, grants.len());

        // Slot i goes to candidate i while the fan-out allows; everything after waits as a
        // substitute.
        let mut spare = VecDeque::new();
        let mut tasks = JoinSet::new();
        let mut in_flight: HashMap<Id, (usize, RelayRecord)> = HashMap::new();
        for slot in (0..grants.len()).filter(|slot| !verified.contains_key(slot)) {
            let Some(relay) = candidates.get(slot) else {
                break;
            };
            if verified.len() + in_flight.len() < width {
                let id = self.dispatch(&mut tasks, slot, relay, &grants[slot], capsule, grantee);
                in_flight.insert(id, (slot, relay.clone()));
            } else {
                spare.push_back(relay.clone());
            }
        }
        spare.extend(candidates.iter().skip(grants.len()).cloned());
        self.transition(PolicyState::AwaitingCfrags(AwaitingCfrags {
            in_flight: in_flight.len(),
            verified: verified.len(),
            tally: *tally,
        }));

        let expiry = sleep_until(deadline);
        tokio::pin!(expiry);

        while verified.len() < threshold {
            if tasks.is_empty() {
                warn!(verified = verified.len(), threshold, "relay roster exhausted");
                let reason = self.abandon(AbandonCause::RosterExhausted, *tally);
                return Err(CoordinatorError::Abandoned(reason));
            }

            let joined = tokio::select! {
                _ = &mut expiry => None,
                joined = tasks.join_next_with_id() => Some(joined),
            };
            let Some(joined) = joined else {
                tasks.abort_all();
                return Err(self.expire(*tally));
            };
            let (id, outcome) = match joined {
                Some(Ok(done)) => done,
                Some(Err(err)) => {
                    error!(error = %err, "work order task did not finish");
                    (err.id(), Outcome::Crashed)
                }
                None => continue,
            };
            let Some((slot, relay)) = in_flight.remove(&id) else {
                continue;
            };

            let grant = &grants[slot];
            match check_outcome(capsule, grant, &relay, outcome) {
                Ok(cfrag) => {
                    info!(relay = %relay.address, kfrag = %cfrag.kfrag_id(), "cfrag verified");
                    self.emit(PolicyEvent::CfragVerified {
                        hrac: *self.policy.hrac(),
                        relay: relay.address,
                        kfrag: *cfrag.kfrag_id(),
                    });
                    verified.insert(slot, cfrag);
                }
                Err(failure) => {
                    warn!(relay = %relay.address, %failure, "relay failed");
                    tally.record(failure);
                    self.emit(PolicyEvent::RelayFailed {
                        hrac: *self.policy.hrac(),
                        relay: relay.address,
                        failure,
                    });
                    if let Some(next) = spare.pop_front() {
                        debug!(from = %relay.address, to = %next.address, "substituting relay");
                        let id = self.dispatch(&mut tasks, slot, &next, grant, capsule, grantee);
                        in_flight.insert(id, (slot, next));
                    }
                }
            }
            self.state = PolicyState::AwaitingCfrags(AwaitingCfrags {
                in_flight: in_flight.len(),
                verified: verified.len(),
                tally: *tally,
            });
        }
        tasks.abort_all();
        Ok(())
    }

    fn dispatch(
        &mut self,
        tasks: &mut JoinSet<Outcome>,
        slot: usize,
        relay: &RelayRecord,
        grant: &PolicyGrant,
        capsule: &Capsule,
        grantee: &Signer,
    ) -> Id {
        let order = WorkOrder::new(grantee, grant.clone(), *capsule, &relay.identity);
        self.assigned.insert(relay.address, relay.clone());
        self.emit(PolicyEvent::WorkOrderDispatched {
            hrac: *self.policy.hrac(),
            relay: relay.address,
            kfrag: *grant.kfrag().id(),
        });
        debug!(slot, relay = %relay.address, "work order dispatched");

        let transport = Arc::clone(&self.transport);
        let limit = self.config.work_order_timeout;
        let relay = relay.clone();
        tasks
            .spawn(async move {
                match timeout(limit, transport.send_work_order(&relay, order)).await {
                    Ok(Ok(response)) => Outcome::Response(response),
                    Ok(Err(err)) => Outcome::Failed(err),
                    Err(_) => Outcome::Timeout,
                }
            })
            .id()
    }

    fn selection_seed(&self) -> u64 {
        self.config
            .selection_seed
            .unwrap_or_else(|| u64::from_be_bytes(rand_array(&self.rng)))
    }

    fn require_created(&self, operation: &'static str) -> Result<(), CoordinatorError> {
        match self.state {
            PolicyState::Created => Ok(()),
            ref other => Err(CoordinatorError::InvalidState {
                operation,
                state: other.name(),
            }),
        }
    }

    /// The grants and ranked relays, for any state after distribution that is not abandoned.
    fn delegation(&self, operation: &'static str) -> Result<&Distributing, CoordinatorError> {
        match (&self.state, &self.delegation) {
            (PolicyState::Abandoned(_), _) | (_, None) => Err(CoordinatorError::InvalidState {
                operation,
                state: self.state.name(),
            }),
            (_, Some(delegation)) => Ok(delegation),
        }
    }

    fn enter_distributing(&mut self, delegation: Distributing) {
        self.delegation = Some(delegation.clone());
        self.transition(PolicyState::Distributing(delegation));
    }

    fn transition(&mut self, next: PolicyState) {
        let from = self.state.name();
        let to = next.name();
        info!(hrac = %self.policy.hrac(), from, to, "policy state changed");
        self.state = next;
        self.emit(PolicyEvent::StateChanged {
            hrac: *self.policy.hrac(),
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    fn abandon(&mut self, cause: AbandonCause, tally: FailureTally) -> AbandonReason {
        let reason = AbandonReason { cause, tally };
        self.transition(PolicyState::Abandoned(reason));
        self.emit(PolicyEvent::Abandoned {
            hrac: *self.policy.hrac(),
            reason,
        });
        reason
    }

    fn expire(&mut self, tally: FailureTally) -> CoordinatorError {
        self.abandon(AbandonCause::Expired, tally);
        CoordinatorError::PolicyExpired {
            hrac: *self.policy.hrac(),
            tally,
        }
    }

    fn emit(&self, event: PolicyEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is listening.
            let _ = events.send(event);
        }
    }
}

/// Relay signature first, then the binding to the grant that was sent (kfrag id and
/// precursor), then the proof against the grant's commitment.
fn check_outcome(
    capsule: &Capsule,
    grant: &PolicyGrant,
    relay: &RelayRecord,
    outcome: Outcome,
) -> Result<VerifiedCapsuleFrag, RelayFailure> {
    let response = match outcome {
        Outcome::Response(response) => response,
        Outcome::Timeout => return Err(RelayFailure::Timeout),
        Outcome::Failed(RelayError::Unreachable(_)) | Outcome::Crashed => {
            return Err(RelayFailure::Unreachable)
        }
        Outcome::Failed(RelayError::Malformed { .. }) => return Err(RelayFailure::Malformed),
        Outcome::Failed(RelayError::Refused { .. }) => return Err(RelayFailure::Refused),
    };
    if !response.verify(&relay.identity) {
        return Err(RelayFailure::Malformed);
    }
    let cfrag = response.into_cfrag();
    let kfrag = grant.kfrag();
    if cfrag.kfrag_id() != kfrag.id() || cfrag.precursor() != kfrag.precursor() {
        return Err(RelayFailure::ProofFailed);
    }
    cfrag
        .verify(capsule, kfrag.commitment())
        .map_err(|_| RelayFailure::ProofFailed)
}
