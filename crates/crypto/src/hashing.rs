// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use ark_bn254::Fq;
use ark_ff::PrimeField;
use sha2::{Digest, Sha512};

use crate::{Point, Scalar};

/// Domain separated hash onto the non-zero scalars.
///
/// Every input is length prefixed so that `("ab", "c")` and `("a", "bc")` never collide.
#[derive(Clone)]
pub struct ScalarDigest {
    hasher: Sha512,
}

impl ScalarDigest {
    pub fn new(dst: &[u8]) -> Self {
        let mut hasher = Sha512::new();
        hasher.update((dst.len() as u32).to_be_bytes());
        hasher.update(dst);
        Self { hasher }
    }

    pub fn chain_bytes(mut self, bytes: &[u8]) -> Self {
        self.hasher.update((bytes.len() as u32).to_be_bytes());
        self.hasher.update(bytes);
        self
    }

    pub fn chain_point(self, point: &Point) -> Self {
        self.chain_bytes(&point.to_bytes())
    }

    pub fn chain_points(self, points: &[Point]) -> Self {
        points.iter().fold(self, |digest, p| digest.chain_point(p))
    }

    pub fn chain_scalar(self, scalar: &Scalar) -> Self {
        self.chain_bytes(&scalar.to_bytes())
    }

    /// Finish the digest. A zero result is astronomically unlikely; when it happens the digest is
    /// re-run with a counter appended until the output is non-zero.
    pub fn finalize(self) -> Scalar {
        let mut counter: u32 = 0;
        loop {
            let mut hasher = self.hasher.clone();
            if counter > 0 {
                hasher.update(counter.to_be_bytes());
            }
            let candidate = Scalar::from_be_bytes_mod_order(&hasher.finalize());
            if !candidate.is_zero() {
                return candidate;
            }
            counter += 1;
        }
    }
}

/// Deterministically map a label to a curve point with unknown discrete log, by try-and-increment
/// over SHA-512 outputs reduced into the base field.
pub fn hash_to_point(dst: &[u8], label: &[u8]) -> Point {
    let mut counter: u32 = 0;
    loop {
        let digest = Sha512::new()
            .chain_update((dst.len() as u32).to_be_bytes())
            .chain_update(dst)
            .chain_update((label.len() as u32).to_be_bytes())
            .chain_update(label)
            .chain_update(counter.to_be_bytes())
            .finalize();
        let x = Fq::from_be_bytes_mod_order(&digest[..32]);
        let larger = digest[32] & 1 == 1;
        if let Some(point) = Point::from_x(x, larger) {
            if !point.is_identity() {
                return point;
            }
        }
        counter += 1;
    }
}
