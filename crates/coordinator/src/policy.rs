// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use chrono::{DateTime, Utc};
use tpre_config::TpreConfig;
use tpre_core::{Hrac, PreError};
use tpre_crypto::PublicKey;

use crate::{CoordinatorError, RelayRoster};

/// A delegation from one key pair to another, served by `shares` relays of which any
/// `threshold` suffice.
#[derive(Debug, Clone)]
pub struct Policy {
    label: String,
    hrac: Hrac,
    delegating_pk: PublicKey,
    grantee_pk: PublicKey,
    threshold: usize,
    shares: usize,
    roster: RelayRoster,
    expiration: DateTime<Utc>,
}

impl Policy {
    pub fn new(
        label: impl Into<String>,
        delegating_pk: PublicKey,
        grantee_pk: PublicKey,
        threshold: usize,
        shares: usize,
        roster: RelayRoster,
        expiration: DateTime<Utc>,
    ) -> Result<Self, CoordinatorError> {
        if threshold == 0 || threshold > shares {
            return Err(PreError::InvalidThreshold { threshold, shares }.into());
        }
        let label = label.into();
        Ok(Self {
            hrac: Hrac::new(&delegating_pk, &grantee_pk, label.as_bytes()),
            label,
            delegating_pk,
            grantee_pk,
            threshold,
            shares,
            roster,
            expiration,
        })
    }

    /// Threshold, share count and lifetime taken from configuration.
    pub fn from_config(
        label: impl Into<String>,
        delegating_pk: PublicKey,
        grantee_pk: PublicKey,
        roster: RelayRoster,
        config: &TpreConfig,
    ) -> Result<Self, CoordinatorError> {
        let lifetime = chrono::Duration::seconds(config.policy_duration_secs as i64);
        Self::new(
            label,
            delegating_pk,
            grantee_pk,
            config.default_threshold,
            config.default_shares,
            roster,
            Utc::now() + lifetime,
        )
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn hrac(&self) -> &Hrac {
        &self.hrac
    }

    pub fn delegating_pk(&self) -> &PublicKey {
        &self.delegating_pk
    }

    pub fn grantee_pk(&self) -> &PublicKey {
        &self.grantee_pk
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn shares(&self) -> usize {
        self.shares
    }

    pub fn roster(&self) -> &RelayRoster {
        &self.roster
    }

    pub fn expiration(&self) -> DateTime<Utc> {
        self.expiration
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiration
    }

    /// Time left before expiration, zero once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.expiration - now).to_std().unwrap_or_default()
    }
}
