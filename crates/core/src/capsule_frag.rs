// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::ops::Deref;

use rand::{CryptoRng, RngCore};
use subtle::ConstantTimeEq;
use tpre_crypto::{parameters, Point, PublicKey, Scalar, ScalarDigest, Signature};
use tracing::instrument;

use crate::{
    key_frag::kfrag_signature_message,
    wire::{impl_serde_via_wire, Reader},
    Capsule, KeyFragId, PreError, ProtocolObject, VerifiedKeyFrag,
};

const CFRAG_VERIFICATION_DST: &[u8] = b"CFRAG_VERIFICATION";

/// Non-interactive proof that `E1`, `V1` and the kfrag commitment `U1` share one discrete log
/// relative to `E`, `V` and `U`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrectnessProof {
    pub(crate) e2: Point,
    pub(crate) v2: Point,
    pub(crate) u2: Point,
    pub(crate) u1: Point,
    pub(crate) z: Scalar,
    pub(crate) kfrag_signature: Signature,
}

impl CorrectnessProof {
    /// The kfrag commitment the proof was produced against.
    pub fn commitment(&self) -> &Point {
        &self.u1
    }

    pub fn kfrag_signature(&self) -> &Signature {
        &self.kfrag_signature
    }
}

/// A relay's re-encryption of one capsule under one key fragment. Untrusted until verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapsuleFrag {
    pub(crate) e1: Point,
    pub(crate) v1: Point,
    pub(crate) kfrag_id: KeyFragId,
    pub(crate) precursor: Point,
    pub(crate) proof: CorrectnessProof,
}

impl CapsuleFrag {
    pub fn kfrag_id(&self) -> &KeyFragId {
        &self.kfrag_id
    }

    pub fn precursor(&self) -> &Point {
        &self.precursor
    }

    pub fn proof(&self) -> &CorrectnessProof {
        &self.proof
    }

    /// Check the proof against the commitment recorded when the kfrag was dispatched.
    pub fn verify(
        self,
        capsule: &Capsule,
        expected_commitment: &Point,
    ) -> Result<VerifiedCapsuleFrag, (PreError, CapsuleFrag)> {
        if verify(capsule, &self, expected_commitment) {
            Ok(VerifiedCapsuleFrag(self))
        } else {
            Err((PreError::ProofVerificationFailed, self))
        }
    }

    /// Check the grantor's kfrag signature carried in the proof, then the proof against the
    /// commitment it signs. For grantees that never saw the kfrags.
    pub fn verify_with_keys(
        self,
        capsule: &Capsule,
        verifying_pk: &PublicKey,
        delegating_pk: &PublicKey,
        receiving_pk: &PublicKey,
    ) -> Result<VerifiedCapsuleFrag, (PreError, CapsuleFrag)> {
        let msg = kfrag_signature_message(
            &self.kfrag_id,
            &self.proof.u1,
            &self.precursor,
            delegating_pk,
            receiving_pk,
        );
        if !self.proof.kfrag_signature.verify(verifying_pk, &msg) {
            return Err((PreError::InvalidKeyFragSignature, self));
        }
        let commitment = self.proof.u1;
        self.verify(capsule, &commitment)
    }
}

impl ProtocolObject for CapsuleFrag {
    const BRAND: [u8; 4] = *b"CFRG";

    fn write_body(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.e1.to_bytes());
        out.extend_from_slice(&self.v1.to_bytes());
        out.extend_from_slice(self.kfrag_id.as_bytes());
        out.extend_from_slice(&self.precursor.to_bytes());
        out.extend_from_slice(&self.proof.e2.to_bytes());
        out.extend_from_slice(&self.proof.v2.to_bytes());
        out.extend_from_slice(&self.proof.u2.to_bytes());
        out.extend_from_slice(&self.proof.u1.to_bytes());
        out.extend_from_slice(&self.proof.z.to_bytes());
        out.extend_from_slice(&self.proof.kfrag_signature.to_bytes());
    }

    fn read_body(reader: &mut Reader<'_>, _minor: u16) -> Result<Self, PreError> {
        Ok(CapsuleFrag {
            e1: reader.point()?,
            v1: reader.point()?,
            kfrag_id: KeyFragId::from_bytes(reader.array()?),
            precursor: reader.point()?,
            proof: CorrectnessProof {
                e2: reader.point()?,
                v2: reader.point()?,
                u2: reader.point()?,
                u1: reader.point()?,
                z: reader.scalar()?,
                kfrag_signature: reader.signature()?,
            },
        })
    }
}

impl_serde_via_wire!(CapsuleFrag);

/// A capsule fragment that passed verification. The aggregator accepts nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedCapsuleFrag(CapsuleFrag);

impl VerifiedCapsuleFrag {
    pub fn unverify(self) -> CapsuleFrag {
        self.0
    }
}

impl Deref for VerifiedCapsuleFrag {
    type Target = CapsuleFrag;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Everything in the cfrag except the response `z` and the kfrag signature goes into the
/// transcript, so the kfrag id and precursor cannot be swapped either.
fn proof_challenge(capsule: &Capsule, cfrag: &CapsuleFrag) -> Scalar {
    let proof = &cfrag.proof;
    ScalarDigest::new(CFRAG_VERIFICATION_DST)
        .chain_points(&[
            capsule.e,
            cfrag.e1,
            proof.e2,
            capsule.v,
            cfrag.v1,
            proof.v2,
            parameters().u,
            proof.u1,
            proof.u2,
        ])
        .chain_bytes(cfrag.kfrag_id.as_bytes())
        .chain_point(&cfrag.precursor)
        .finalize()
}

/// Re-encrypt `capsule` under `kfrag` and prove the result correct.
///
/// The output points depend only on the capsule and the kfrag; the proof is freshly randomized
/// on every call.
#[instrument(skip_all, fields(kfrag = %kfrag.id()))]
pub fn reencrypt<R: RngCore + CryptoRng>(
    rng: &mut R,
    capsule: &Capsule,
    kfrag: &VerifiedKeyFrag,
) -> Result<CapsuleFrag, PreError> {
    capsule.check()?;

    let rk = *kfrag.key();
    let t = Scalar::random_nonzero(rng);
    let mut cfrag = CapsuleFrag {
        e1: capsule.e * rk,
        v1: capsule.v * rk,
        kfrag_id: *kfrag.id(),
        precursor: *kfrag.precursor(),
        proof: CorrectnessProof {
            e2: capsule.e * t,
            v2: capsule.v * t,
            u2: parameters().u * t,
            u1: *kfrag.commitment(),
            z: Scalar::zero(),
            kfrag_signature: kfrag.signature,
        },
    };
    let h = proof_challenge(capsule, &cfrag);
    cfrag.proof.z = t + h * rk;
    Ok(cfrag)
}

/// Whether `cfrag` is a correct re-encryption of `capsule` under the kfrag whose commitment is
/// `expected_commitment`.
pub fn verify(capsule: &Capsule, cfrag: &CapsuleFrag, expected_commitment: &Point) -> bool {
    let proof = &cfrag.proof;
    let u = parameters().u;
    let h = proof_challenge(capsule, cfrag);

    let commitment_matches: bool = proof.u1.ct_eq(expected_commitment).into();
    let e_ok = capsule.e * proof.z == proof.e2 + cfrag.e1 * h;
    let v_ok = capsule.v * proof.z == proof.v2 + cfrag.v1 * h;
    let u_ok = u * proof.z == proof.u2 + proof.u1 * h;

    commitment_matches & e_ok & v_ok & u_ok
}
