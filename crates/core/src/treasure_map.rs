// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use rand::{CryptoRng, RngCore};
use tpre_crypto::{Dem, PublicKey, SecretKey, Signature, Signer};
use tracing::{debug, instrument};

use crate::{
    wire::{encoding, impl_serde_via_wire, put_object, put_var, Reader},
    Capsule, Hrac, PolicyGrant, PreError, ProtocolObject,
};

const PUBLIC_SIGNATURE_PREFIX: &[u8] = b"tmap:";

/// Largest threshold a map can carry.
pub const MAX_MAP_THRESHOLD: usize = u8::MAX as usize;

/// One relay of the policy and the grant it is expected to serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub relay: PublicKey,
    pub grant: PolicyGrant,
}

/// Where a grantee finds the relays of a policy, and how many of them it needs.
///
/// Destinations are in slot order: the i-th destination holds the i-th grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreasureMap {
    hrac: Hrac,
    threshold: u8,
    destinations: Vec<Destination>,
}

impl TreasureMap {
    pub fn new(
        hrac: Hrac,
        threshold: usize,
        destinations: Vec<Destination>,
    ) -> Result<Self, PreError> {
        let disorienting = PreError::DisorientingTreasureMap {
            threshold,
            destinations: destinations.len(),
        };
        let threshold = u8::try_from(threshold).map_err(|_| disorienting.clone())?;
        if threshold == 0 || destinations.len() < threshold as usize {
            return Err(disorienting);
        }
        if destinations.iter().any(|d| d.grant.hrac() != &hrac) {
            return Err(PreError::TreasureMapMismatch);
        }
        Ok(Self {
            hrac,
            threshold,
            destinations,
        })
    }

    pub fn hrac(&self) -> &Hrac {
        &self.hrac
    }

    pub fn threshold(&self) -> usize {
        self.threshold as usize
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    /// Encrypt the map to the grantee and sign it publicly as `publisher`.
    #[instrument(skip_all, fields(hrac = %self.hrac))]
    pub fn encrypt<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        publisher: &Signer,
        grantee_pk: &PublicKey,
    ) -> Result<EncryptedTreasureMap, PreError> {
        let (capsule, key) = Capsule::encapsulate(rng, grantee_pk)?;
        let ciphertext = Dem::new(&key)?.encrypt(&self.to_bytes(), &capsule.to_bytes())?;
        let publisher_pk = publisher.verifying_key();
        let signature = publisher.sign(&public_message(
            &self.hrac,
            &publisher_pk,
            &capsule,
            &ciphertext,
        ));
        debug!(destinations = self.destinations.len(), "treasure map sealed");
        Ok(EncryptedTreasureMap {
            hrac: self.hrac,
            publisher: publisher_pk,
            capsule,
            ciphertext,
            signature,
        })
    }
}

impl ProtocolObject for TreasureMap {
    const BRAND: [u8; 4] = *b"TMAP";

    fn write_body(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.hrac.as_bytes());
        out.push(self.threshold);
        out.extend_from_slice(&(self.destinations.len() as u32).to_be_bytes());
        for destination in &self.destinations {
            out.extend_from_slice(&destination.relay.to_bytes());
            put_object(out, &destination.grant);
        }
    }

    fn read_body(reader: &mut Reader<'_>, _minor: u16) -> Result<Self, PreError> {
        let hrac = Hrac::from_bytes(reader.array()?);
        let [threshold] = reader.array::<1>()?;
        let count = reader.u32()? as usize;
        // Each destination takes well over one byte, so a count past the input is garbage.
        if count > reader.remaining() {
            return Err(encoding("destination count exceeds input"));
        }
        let destinations = (0..count)
            .map(|_| {
                Ok(Destination {
                    relay: reader.public_key()?,
                    grant: reader.object()?,
                })
            })
            .collect::<Result<Vec<_>, PreError>>()?;
        TreasureMap::new(hrac, threshold as usize, destinations)
    }
}

impl_serde_via_wire!(TreasureMap);

/// A [`TreasureMap`] sealed for its grantee. Anyone can check the publisher's signature; only
/// the grantee can read the destinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedTreasureMap {
    hrac: Hrac,
    publisher: PublicKey,
    capsule: Capsule,
    ciphertext: Vec<u8>,
    signature: Signature,
}

impl EncryptedTreasureMap {
    pub fn hrac(&self) -> &Hrac {
        &self.hrac
    }

    pub fn publisher(&self) -> &PublicKey {
        &self.publisher
    }

    pub fn verify(&self) -> bool {
        self.signature.verify(
            &self.publisher,
            &public_message(&self.hrac, &self.publisher, &self.capsule, &self.ciphertext),
        )
    }

    /// Open the map as the grantee, accepting it only from `publisher`.
    ///
    /// Every grant must be signed by the publisher and belong to the map's policy.
    #[instrument(skip_all, fields(hrac = %self.hrac))]
    pub fn decrypt(
        &self,
        grantee_sk: &SecretKey,
        publisher: &PublicKey,
    ) -> Result<TreasureMap, PreError> {
        if &self.publisher != publisher || !self.verify() {
            return Err(PreError::InvalidTreasureMapSignature);
        }
        let key = self.capsule.open_original(grantee_sk)?;
        let plaintext = Dem::new(&key)?.decrypt(&self.ciphertext, &self.capsule.to_bytes())?;
        let map = TreasureMap::from_bytes(&plaintext)?;

        let foreign = map
            .destinations
            .iter()
            .any(|d| d.grant.grantor() != publisher || !d.grant.verify());
        if map.hrac != self.hrac || foreign {
            return Err(PreError::TreasureMapMismatch);
        }
        Ok(map)
    }
}

fn public_message(
    hrac: &Hrac,
    publisher: &PublicKey,
    capsule: &Capsule,
    ciphertext: &[u8],
) -> Vec<u8> {
    let mut msg = PUBLIC_SIGNATURE_PREFIX.to_vec();
    msg.extend_from_slice(&publisher.to_bytes());
    msg.extend_from_slice(hrac.as_bytes());
    msg.extend_from_slice(&capsule.to_bytes());
    msg.extend_from_slice(ciphertext);
    msg
}

impl ProtocolObject for EncryptedTreasureMap {
    const BRAND: [u8; 4] = *b"EMAP";

    fn write_body(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.hrac.as_bytes());
        out.extend_from_slice(&self.publisher.to_bytes());
        put_object(out, &self.capsule);
        put_var(out, &self.ciphertext);
        out.extend_from_slice(&self.signature.to_bytes());
    }

    fn read_body(reader: &mut Reader<'_>, _minor: u16) -> Result<Self, PreError> {
        Ok(EncryptedTreasureMap {
            hrac: Hrac::from_bytes(reader.array()?),
            publisher: reader.public_key()?,
            capsule: reader.object()?,
            ciphertext: reader.var_bytes()?.to_vec(),
            signature: reader.signature()?,
        })
    }
}

impl_serde_via_wire!(EncryptedTreasureMap);
