// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use rand::{CryptoRng, RngCore};
use tpre_crypto::{kdf, parameters, Point, PublicKey, Scalar, ScalarDigest, SecretKey, SymmetricKey};

use crate::{
    wire::{impl_serde_via_wire, Reader},
    PreError, ProtocolObject,
};

const CAPSULE_DST: &[u8] = b"CAPSULE";

/// Encapsulated symmetric key: two ephemeral points and the tag binding them.
///
/// Decoding only checks that the points and scalar are well formed; the encapsulation check
/// runs in [`Capsule::check`] so that relays can report a malformed capsule explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capsule {
    pub(crate) e: Point,
    pub(crate) v: Point,
    pub(crate) s: Scalar,
}

impl Capsule {
    /// Encapsulate a fresh symmetric key to `delegating_pk`.
    pub fn encapsulate<R: RngCore + CryptoRng>(
        rng: &mut R,
        delegating_pk: &PublicKey,
    ) -> Result<(Capsule, SymmetricKey), PreError> {
        let g = parameters().g;
        let r = Scalar::random_nonzero(rng);
        let u = Scalar::random_nonzero(rng);
        let e = g * r;
        let v = g * u;
        let h = capsule_challenge(&e, &v);
        let capsule = Capsule { e, v, s: u + r * h };
        let key = kdf(&(*delegating_pk.point() * (r + u)))?;
        Ok((capsule, key))
    }

    pub(crate) fn challenge(&self) -> Scalar {
        capsule_challenge(&self.e, &self.v)
    }

    /// `g·s == V + E·H(E, V)`
    pub fn check(&self) -> Result<(), PreError> {
        if parameters().g * self.s == self.v + self.e * self.challenge() {
            Ok(())
        } else {
            Err(PreError::MalformedCapsule)
        }
    }

    /// Recover the encapsulated key with the grantor's own secret key.
    pub fn open_original(&self, delegating_sk: &SecretKey) -> Result<SymmetricKey, PreError> {
        self.check()?;
        Ok(kdf(&((self.e + self.v) * *delegating_sk.scalar()))?)
    }

    pub fn e(&self) -> &Point {
        &self.e
    }

    pub fn v(&self) -> &Point {
        &self.v
    }
}

fn capsule_challenge(e: &Point, v: &Point) -> Scalar {
    ScalarDigest::new(CAPSULE_DST)
        .chain_point(e)
        .chain_point(v)
        .finalize()
}

impl ProtocolObject for Capsule {
    const BRAND: [u8; 4] = *b"CAPS";

    fn write_body(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.e.to_bytes());
        out.extend_from_slice(&self.v.to_bytes());
        out.extend_from_slice(&self.s.to_bytes());
    }

    fn read_body(reader: &mut Reader<'_>, _minor: u16) -> Result<Self, PreError> {
        Ok(Capsule {
            e: reader.point()?,
            v: reader.point()?,
            s: reader.scalar()?,
        })
    }
}

impl_serde_via_wire!(Capsule);
