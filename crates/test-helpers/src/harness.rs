// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use tpre_config::TpreConfig;
use tpre_coordinator::{CoordinatorConfig, Policy, PolicyCoordinator, RelayRecord, RelayRoster};
use tpre_core::{encrypt, Capsule};
use tpre_crypto::{SecretKey, Signer};
use tpre_utils::{create_shared_rng_from_u64, with_rng, SharedRng};

use crate::{RelayBehaviour, RelayNetworkMock};

pub const DEFAULT_STAKE: u64 = 100;

/// Alice delegates to Bob over a simulated relay network.
pub struct PolicyHarness {
    pub alice: SecretKey,
    pub alice_signer: Signer,
    pub bob: SecretKey,
    pub network: RelayNetworkMock,
    pub relays: Vec<RelayRecord>,
    pub rng: SharedRng,
}

impl PolicyHarness {
    /// One relay per entry of `behaviours`, all staking [`DEFAULT_STAKE`].
    pub async fn new(seed: u64, behaviours: &[RelayBehaviour]) -> Self {
        let rng = create_shared_rng_from_u64(seed);
        let (alice, signing_key, bob) = with_rng(&rng, |r| {
            (
                SecretKey::random_with(r),
                SecretKey::random_with(r),
                SecretKey::random_with(r),
            )
        });
        let network = RelayNetworkMock::default();
        let mut relays = Vec::with_capacity(behaviours.len());
        for behaviour in behaviours {
            relays.push(network.add_relay(*behaviour, DEFAULT_STAKE).await);
        }

        Self {
            alice,
            alice_signer: Signer::new(signing_key),
            bob,
            network,
            relays,
            rng,
        }
    }

    pub fn roster(&self) -> RelayRoster {
        RelayRoster::new(self.relays.clone())
    }

    pub fn policy(&self, threshold: usize, shares: usize, lifetime: Duration) -> Result<Policy> {
        Ok(Policy::new(
            "test-policy",
            self.alice.public_key(),
            self.bob.public_key(),
            threshold,
            shares,
            self.roster(),
            Utc::now() + lifetime,
        )?)
    }

    pub fn policy_from_config(&self, config: &TpreConfig) -> Result<Policy> {
        Ok(Policy::from_config(
            "test-policy",
            self.alice.public_key(),
            self.bob.public_key(),
            self.roster(),
            config,
        )?)
    }

    pub fn coordinator(&self, policy: Policy, config: CoordinatorConfig) -> PolicyCoordinator {
        PolicyCoordinator::new(policy, Arc::new(self.network.clone()), config)
            .with_rng(self.rng.clone())
    }

    /// Encrypt to Alice. Returns the capsule and the DEM ciphertext.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<(Capsule, Vec<u8>)> {
        Ok(encrypt(&self.alice.public_key(), plaintext)?)
    }
}

/// Coordinator settings for tests: a fixed selection seed and the given timeout.
pub fn test_config(work_order_timeout: std::time::Duration) -> CoordinatorConfig {
    CoordinatorConfig {
        work_order_timeout,
        selection_seed: Some(7),
        ..CoordinatorConfig::default()
    }
}
