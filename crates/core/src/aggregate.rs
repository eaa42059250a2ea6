// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::collections::HashSet;

use rand::rngs::OsRng;
use tpre_crypto::{kdf, CryptoError, Dem, Point, PublicKey, Scalar, SecretKey, SymmetricKey};
use tracing::{debug, instrument};

use crate::{
    key_frag::{delegation_secret, share_index},
    Capsule, PreError, ProtocolObject, VerifiedCapsuleFrag,
};

/// Lagrange coefficients at zero for the given evaluation points.
fn lagrange_at_zero(xs: &[Scalar]) -> Result<Vec<Scalar>, CryptoError> {
    xs.iter()
        .enumerate()
        .map(|(i, xi)| {
            xs.iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .try_fold(Scalar::one(), |acc, (_, xj)| {
                    Ok::<_, CryptoError>(acc * *xj * (*xj - *xi).invert()?)
                })
        })
        .collect()
}

/// Combine at least `threshold` verified capsule fragments into the grantor's symmetric key.
///
/// Any subset of the right size works and the order of `cfrags` does not matter. The combined
/// capsule is checked against the grantor's public key, so fragments addressed to another
/// grantee fail with [`PreError::DecapsulationFailed`].
#[instrument(skip_all, fields(threshold = threshold, cfrags = cfrags.len()))]
pub fn aggregate(
    capsule: &Capsule,
    cfrags: &[VerifiedCapsuleFrag],
    threshold: usize,
    receiving_sk: &SecretKey,
    delegating_pk: &PublicKey,
) -> Result<SymmetricKey, PreError> {
    let mut seen = HashSet::with_capacity(cfrags.len());
    for cfrag in cfrags {
        if !seen.insert(*cfrag.kfrag_id()) {
            return Err(PreError::DuplicateFragmentIndex(*cfrag.kfrag_id()));
        }
    }

    if threshold == 0 || cfrags.len() < threshold {
        return Err(PreError::InsufficientFragments {
            needed: threshold,
            got: cfrags.len(),
        });
    }

    let precursor = *cfrags[0].precursor();
    if cfrags.iter().any(|c| *c.precursor() != precursor) {
        return Err(PreError::InconsistentFragments);
    }

    let receiving_pk = receiving_sk.public_key();
    let dh = precursor * *receiving_sk.scalar();
    let d = delegation_secret(&precursor, &receiving_pk, &dh);

    let xs: Vec<Scalar> = cfrags
        .iter()
        .map(|c| share_index(&precursor, &receiving_pk, &dh, c.kfrag_id()))
        .collect();
    let lambdas = lagrange_at_zero(&xs).map_err(|_| PreError::DecapsulationFailed)?;

    let e_prime: Point = cfrags.iter().zip(&lambdas).map(|(c, l)| c.e1 * *l).sum();
    let v_prime: Point = cfrags.iter().zip(&lambdas).map(|(c, l)| c.v1 * *l).sum();

    let d_inv = d.invert()?;
    if *delegating_pk.point() * (capsule.s * d_inv) != e_prime * capsule.challenge() + v_prime {
        debug!("combined capsule check failed");
        return Err(PreError::DecapsulationFailed);
    }

    Ok(kdf(&((e_prime + v_prime) * d))?)
}

/// The key a grantor recovers directly. Reference value for [`aggregate`].
pub fn decrypt_original(
    delegating_sk: &SecretKey,
    capsule: &Capsule,
) -> Result<SymmetricKey, PreError> {
    capsule.open_original(delegating_sk)
}

/// Encapsulate a fresh key to `delegating_pk` and encrypt `plaintext` under it. The capsule
/// bytes are bound to the ciphertext as associated data.
pub fn encrypt(
    delegating_pk: &PublicKey,
    plaintext: &[u8],
) -> Result<(Capsule, Vec<u8>), PreError> {
    let (capsule, key) = Capsule::encapsulate(&mut OsRng, delegating_pk)?;
    let ciphertext = Dem::new(&key)?.encrypt(plaintext, &capsule.to_bytes())?;
    Ok((capsule, ciphertext))
}

pub fn decrypt_with_key(
    key: &SymmetricKey,
    capsule: &Capsule,
    ciphertext: &[u8],
) -> Result<Vec<u8>, PreError> {
    Ok(Dem::new(key)?.decrypt(ciphertext, &capsule.to_bytes())?)
}

/// Grantee side decryption from verified capsule fragments.
pub fn decrypt_reencrypted(
    receiving_sk: &SecretKey,
    delegating_pk: &PublicKey,
    capsule: &Capsule,
    cfrags: &[VerifiedCapsuleFrag],
    threshold: usize,
    ciphertext: &[u8],
) -> Result<Vec<u8>, PreError> {
    let key = aggregate(capsule, cfrags, threshold, receiving_sk, delegating_pk)?;
    decrypt_with_key(&key, capsule, ciphertext)
}
