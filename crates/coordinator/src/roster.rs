// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::fmt;

use num::{bigint::Sign, BigInt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tpre_crypto::PublicKey;

pub const RELAY_ADDRESS_SIZE: usize = 20;

/// Stable roster handle of a relay, independent of its signing key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelayAddress([u8; RELAY_ADDRESS_SIZE]);

impl RelayAddress {
    pub fn from_bytes(bytes: [u8; RELAY_ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    /// Derive an address from the relay's identity key: the low 20 bytes of its SHA-256.
    pub fn from_identity(identity: &PublicKey) -> Self {
        let digest = Sha256::digest(identity.to_bytes());
        let mut out = [0u8; RELAY_ADDRESS_SIZE];
        out.copy_from_slice(&digest[32 - RELAY_ADDRESS_SIZE..]);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; RELAY_ADDRESS_SIZE] {
        &self.0
    }
}

impl fmt::Display for RelayAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for RelayAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelayAddress({self})")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRecord {
    pub address: RelayAddress,
    pub identity: PublicKey,
    pub stake: u64,
    pub live: bool,
}

impl RelayRecord {
    pub fn new(identity: PublicKey, stake: u64) -> Self {
        Self {
            address: RelayAddress::from_identity(&identity),
            identity,
            stake,
            live: true,
        }
    }

    pub fn is_eligible(&self, min_stake: u64) -> bool {
        self.live && self.stake >= min_stake
    }
}

/// The relays a policy may draw from. Read-only once handed to a policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRoster {
    relays: Vec<RelayRecord>,
}

impl RelayRoster {
    pub fn new(relays: Vec<RelayRecord>) -> Self {
        Self { relays }
    }

    pub fn len(&self) -> usize {
        self.relays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relays.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RelayRecord> {
        self.relays.iter()
    }

    pub fn get(&self, address: &RelayAddress) -> Option<&RelayRecord> {
        self.relays.iter().find(|r| &r.address == address)
    }

    /// Live relays staking at least `min_stake`, in roster order.
    pub fn eligible(&self, min_stake: u64) -> impl Iterator<Item = &RelayRecord> {
        self.relays.iter().filter(move |r| r.is_eligible(min_stake))
    }

    /// Every eligible relay, ranked by the distance between `H(address ‖ seed)` and the seed.
    ///
    /// The ranking is deterministic for a given seed, so the first `n` entries are the
    /// primary assignment and the remainder is the substitution order.
    pub fn select(&self, seed: u64, min_stake: u64) -> Vec<RelayRecord> {
        let mut scored: Vec<_> = self
            .eligible(min_stake)
            .map(|relay| (distance(&relay.address, seed), relay.clone()))
            .collect();
        scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.address.cmp(&b.1.address)));
        scored.into_iter().map(|(_, relay)| relay).collect()
    }
}

/// `H(address ‖ seed) - seed`, read as a signed integer.
fn distance(address: &RelayAddress, seed: u64) -> BigInt {
    let mut hasher = Sha256::new();
    hasher.update(address.as_bytes());
    hasher.update(seed.to_be_bytes());
    let z = BigInt::from_bytes_be(Sign::Plus, &hasher.finalize());
    z - BigInt::from(seed)
}
