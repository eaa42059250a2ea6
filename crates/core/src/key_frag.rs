// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use core::fmt;
use std::ops::Deref;

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tpre_crypto::{
    parameters, Point, PublicKey, Scalar, ScalarDigest, SecretKey, Signature, Signer,
};
use tpre_utils::hexf;
use tracing::instrument;
use zeroize::{Zeroize, Zeroizing};

use crate::{
    wire::{impl_serde_via_wire, Reader},
    PreError, ProtocolObject,
};

pub(crate) const NON_INTERACTIVE_DST: &[u8] = b"NON_INTERACTIVE";
pub(crate) const X_COORDINATE_DST: &[u8] = b"X_COORDINATE";

pub const KEY_FRAG_ID_SIZE: usize = 32;

/// Random identifier of a key fragment. Also determines the fragment's evaluation point.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyFragId([u8; KEY_FRAG_ID_SIZE]);

impl KeyFragId {
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut id = [0u8; KEY_FRAG_ID_SIZE];
        rng.fill_bytes(&mut id);
        Self(id)
    }

    pub fn from_bytes(bytes: [u8; KEY_FRAG_ID_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_FRAG_ID_SIZE] {
        &self.0
    }
}

impl fmt::Debug for KeyFragId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyFragId(")?;
        hexf(&self.0, f)?;
        write!(f, ")")
    }
}

impl fmt::Display for KeyFragId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", tpre_utils::short_hex(&self.0))
    }
}

/// `d = H(X_A, pk_B, dh)`, the secret shared between grantor and grantee for one delegation.
pub(crate) fn delegation_secret(precursor: &Point, receiving_pk: &PublicKey, dh: &Point) -> Scalar {
    ScalarDigest::new(NON_INTERACTIVE_DST)
        .chain_point(precursor)
        .chain_point(receiving_pk.point())
        .chain_point(dh)
        .finalize()
}

/// Evaluation point of the share with the given id.
pub(crate) fn share_index(
    precursor: &Point,
    receiving_pk: &PublicKey,
    dh: &Point,
    id: &KeyFragId,
) -> Scalar {
    ScalarDigest::new(X_COORDINATE_DST)
        .chain_point(precursor)
        .chain_point(receiving_pk.point())
        .chain_point(dh)
        .chain_bytes(id.as_bytes())
        .finalize()
}

/// Message signed by the grantor for every key fragment.
pub(crate) fn kfrag_signature_message(
    id: &KeyFragId,
    commitment: &Point,
    precursor: &Point,
    delegating_pk: &PublicKey,
    receiving_pk: &PublicKey,
) -> Vec<u8> {
    let mut msg = Vec::with_capacity(32 + 4 * 33);
    msg.extend_from_slice(id.as_bytes());
    msg.extend_from_slice(&commitment.to_bytes());
    msg.extend_from_slice(&precursor.to_bytes());
    msg.extend_from_slice(&delegating_pk.to_bytes());
    msg.extend_from_slice(&receiving_pk.to_bytes());
    msg
}

/// One share of a re-encryption key, bound to a single grantee.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyFrag {
    pub(crate) id: KeyFragId,
    pub(crate) key: Scalar,
    pub(crate) precursor: Point,
    pub(crate) commitment: Point,
    pub(crate) delegating_pk: PublicKey,
    pub(crate) receiving_pk: PublicKey,
    pub(crate) signature: Signature,
}

impl KeyFrag {
    pub fn id(&self) -> &KeyFragId {
        &self.id
    }

    /// `U1 = U·rk`, the public commitment to the share recorded at dispatch.
    pub fn commitment(&self) -> &Point {
        &self.commitment
    }

    pub fn precursor(&self) -> &Point {
        &self.precursor
    }

    pub fn delegating_pk(&self) -> &PublicKey {
        &self.delegating_pk
    }

    pub fn receiving_pk(&self) -> &PublicKey {
        &self.receiving_pk
    }

    /// Check the grantor's signature. The caller supplies the grantor's verifying key from a
    /// trusted source.
    pub fn verify(self, verifying_pk: &PublicKey) -> Result<VerifiedKeyFrag, (PreError, KeyFrag)> {
        let msg = kfrag_signature_message(
            &self.id,
            &self.commitment,
            &self.precursor,
            &self.delegating_pk,
            &self.receiving_pk,
        );
        if self.signature.verify(verifying_pk, &msg) {
            Ok(VerifiedKeyFrag(self))
        } else {
            Err((PreError::InvalidKeyFragSignature, self))
        }
    }
}

impl Drop for KeyFrag {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl fmt::Debug for KeyFrag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyFrag")
            .field("id", &self.id)
            .field("commitment", &self.commitment)
            .field("precursor", &self.precursor)
            .finish_non_exhaustive()
    }
}

impl ProtocolObject for KeyFrag {
    const BRAND: [u8; 4] = *b"KFRG";

    fn write_body(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.id.as_bytes());
        out.extend_from_slice(&self.key.to_bytes());
        out.extend_from_slice(&self.precursor.to_bytes());
        out.extend_from_slice(&self.commitment.to_bytes());
        out.extend_from_slice(&self.delegating_pk.to_bytes());
        out.extend_from_slice(&self.receiving_pk.to_bytes());
        out.extend_from_slice(&self.signature.to_bytes());
    }

    fn read_body(reader: &mut Reader<'_>, _minor: u16) -> Result<Self, PreError> {
        Ok(KeyFrag {
            id: KeyFragId(reader.array()?),
            key: reader.scalar()?,
            precursor: reader.point()?,
            commitment: reader.point()?,
            delegating_pk: reader.public_key()?,
            receiving_pk: reader.public_key()?,
            signature: reader.signature()?,
        })
    }
}

impl_serde_via_wire!(KeyFrag);

/// A key fragment whose grantor signature has been checked, or which was produced locally
/// by [`split`]. Only verified fragments can be re-encrypted with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedKeyFrag(KeyFrag);

impl VerifiedKeyFrag {
    pub fn unverify(self) -> KeyFrag {
        self.0
    }

    pub(crate) fn key(&self) -> &Scalar {
        &self.0.key
    }
}

impl Deref for VerifiedKeyFrag {
    type Target = KeyFrag;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Split the grantor's key into `shares` fragments, any `threshold` of which let `receiving_pk`
/// open capsules encapsulated to the grantor.
#[instrument(skip(rng, delegating_sk, receiving_pk, signer))]
pub fn split<R: RngCore + CryptoRng>(
    rng: &mut R,
    delegating_sk: &SecretKey,
    receiving_pk: &PublicKey,
    signer: &Signer,
    threshold: usize,
    shares: usize,
) -> Result<Vec<VerifiedKeyFrag>, PreError> {
    if threshold < 1 || shares < 1 || threshold > shares {
        return Err(PreError::InvalidThreshold { threshold, shares });
    }

    let params = parameters();
    let delegating_pk = delegating_sk.public_key();

    let precursor_sk = SecretKey::random_with(rng);
    let precursor = *precursor_sk.public_key().point();
    let dh = *receiving_pk.point() * *precursor_sk.scalar();
    let d = delegation_secret(&precursor, receiving_pk, &dh);

    let mut coefficients = Zeroizing::new(Vec::with_capacity(threshold));
    coefficients.push(*delegating_sk.scalar() * d.invert()?);
    for _ in 1..threshold {
        coefficients.push(Scalar::random(rng));
    }

    let kfrags = (0..shares)
        .map(|_| {
            let id = KeyFragId::random(rng);
            let x = share_index(&precursor, receiving_pk, &dh, &id);
            let key = evaluate(&coefficients, &x);
            let commitment = params.u * key;
            let msg =
                kfrag_signature_message(&id, &commitment, &precursor, &delegating_pk, receiving_pk);
            VerifiedKeyFrag(KeyFrag {
                id,
                key,
                precursor,
                commitment,
                delegating_pk,
                receiving_pk: *receiving_pk,
                signature: signer.sign(&msg),
            })
        })
        .collect();

    Ok(kfrags)
}

/// Horner evaluation of the polynomial with the given coefficients (lowest degree first).
fn evaluate(coefficients: &[Scalar], x: &Scalar) -> Scalar {
    coefficients
        .iter()
        .rev()
        .fold(Scalar::zero(), |acc, c| acc * *x + *c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn split_validates_threshold() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let sk = SecretKey::random_with(&mut rng);
        let bob = SecretKey::random_with(&mut rng).public_key();
        let signer = Signer::random();

        for (t, n) in [(0, 3), (4, 3), (1, 0), (0, 0)] {
            assert_eq!(
                split(&mut rng, &sk, &bob, &signer, t, n).unwrap_err(),
                PreError::InvalidThreshold {
                    threshold: t,
                    shares: n
                }
            );
        }
        assert_eq!(split(&mut rng, &sk, &bob, &signer, 1, 1).unwrap().len(), 1);
        assert_eq!(split(&mut rng, &sk, &bob, &signer, 3, 5).unwrap().len(), 5);
    }

    #[test]
    fn fragments_share_precursor_and_have_distinct_ids() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let sk = SecretKey::random_with(&mut rng);
        let bob = SecretKey::random_with(&mut rng).public_key();
        let kfrags = split(&mut rng, &sk, &bob, &Signer::random(), 2, 4).unwrap();

        let precursor = kfrags[0].precursor();
        assert!(kfrags.iter().all(|k| k.precursor() == precursor));
        let mut ids: Vec<_> = kfrags.iter().map(|k| *k.id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn signature_check_binds_grantor_key() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let sk = SecretKey::random_with(&mut rng);
        let bob = SecretKey::random_with(&mut rng).public_key();
        let signer = Signer::random();
        let kfrag = split(&mut rng, &sk, &bob, &signer, 1, 1)
            .unwrap()
            .remove(0)
            .unverify();

        let (err, kfrag) = kfrag.verify(&Signer::random().verifying_key()).unwrap_err();
        assert_eq!(err, PreError::InvalidKeyFragSignature);
        assert!(kfrag.verify(&signer.verifying_key()).is_ok());
    }

    #[test]
    fn wire_roundtrip_keeps_signature_valid() -> anyhow::Result<()> {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let sk = SecretKey::random_with(&mut rng);
        let bob = SecretKey::random_with(&mut rng).public_key();
        let signer = Signer::random();
        let kfrag = split(&mut rng, &sk, &bob, &signer, 2, 2)?.remove(0);

        let decoded = KeyFrag::from_bytes(&kfrag.to_bytes())?;
        assert_eq!(&decoded, &*kfrag);
        assert!(decoded.verify(&signer.verifying_key()).is_ok());
        assert!(!format!("{kfrag:?}").contains("key:"));
        Ok(())
    }

    #[test]
    fn horner_matches_naive_evaluation() {
        let coeffs = [Scalar::from_u64(3), Scalar::from_u64(5), Scalar::from_u64(7)];
        let x = Scalar::from_u64(2);
        assert_eq!(evaluate(&coeffs, &x), Scalar::from_u64(3 + 10 + 28));
    }
}
