// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use core::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tpre_crypto::PublicKey;
use tpre_utils::hexf;

pub const HRAC_SIZE: usize = 16;

/// Hashed resource access code: names a policy to relays without revealing its label.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hrac([u8; HRAC_SIZE]);

impl Hrac {
    pub fn new(delegating_pk: &PublicKey, receiving_pk: &PublicKey, label: &[u8]) -> Self {
        let digest = Sha256::new()
            .chain_update(delegating_pk.to_bytes())
            .chain_update(receiving_pk.to_bytes())
            .chain_update(label)
            .finalize();
        let mut out = [0u8; HRAC_SIZE];
        out.copy_from_slice(&digest[..HRAC_SIZE]);
        Self(out)
    }

    pub fn from_bytes(bytes: [u8; HRAC_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HRAC_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Hrac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hrac(")?;
        hexf(&self.0, f)?;
        write!(f, ")")
    }
}

impl fmt::Display for Hrac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
