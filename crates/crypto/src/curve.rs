// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use core::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Neg, Sub};

use ark_bn254::{Fq, Fr, G1Affine, G1Projective};
use ark_ec::{AffineRepr, CurveGroup, PrimeGroup};
use ark_ff::{BigInt, Field, PrimeField, Zero};
use ark_std::UniformRand;
use rand::{CryptoRng, RngCore};
use subtle::{Choice, ConstantTimeEq};
use tpre_utils::hexf;
use zeroize::Zeroize;

use crate::CryptoError;

/// Encoded size of a [`Scalar`]: 32 bytes, big-endian.
pub const SCALAR_SIZE: usize = 32;

/// Encoded size of a [`Point`]: one tag byte followed by the big-endian x coordinate.
pub const POINT_SIZE: usize = 33;

const TAG_IDENTITY: u8 = 0x00;
const TAG_Y_SMALLER: u8 = 0x02;
const TAG_Y_LARGER: u8 = 0x03;

/// An element of the scalar field of BN254 (integers modulo the group order `r`).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Scalar(pub(crate) Fr);

impl Scalar {
    pub fn zero() -> Self {
        Scalar(Fr::zero())
    }

    pub fn one() -> Self {
        Scalar(Fr::from(1u64))
    }

    pub fn from_u64(value: u64) -> Self {
        Scalar(Fr::from(value))
    }

    /// Uniformly random scalar, possibly zero.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Scalar(Fr::rand(rng))
    }

    /// Uniformly random non-zero scalar.
    pub fn random_nonzero<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        loop {
            let candidate = Fr::rand(rng);
            if !candidate.is_zero() {
                return Scalar(candidate);
            }
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn invert(&self) -> Result<Self, CryptoError> {
        self.0.inverse().map(Scalar).ok_or(CryptoError::ZeroScalar)
    }

    /// Reduce an arbitrary big-endian byte string modulo `r`.
    pub(crate) fn from_be_bytes_mod_order(bytes: &[u8]) -> Self {
        Scalar(Fr::from_be_bytes_mod_order(bytes))
    }

    pub fn to_bytes(&self) -> [u8; SCALAR_SIZE] {
        limbs_to_be_bytes(&self.0.into_bigint().0)
    }

    /// Decode a canonical big-endian scalar. Values `>= r` are rejected rather than reduced.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let limbs = be_bytes_to_limbs(bytes)?;
        Fr::from_bigint(BigInt::new(limbs))
            .map(Scalar)
            .ok_or(CryptoError::InvalidEncoding("scalar is not reduced modulo the group order"))
    }
}

impl Add for Scalar {
    type Output = Scalar;

    fn add(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 + rhs.0)
    }
}

impl Sub for Scalar {
    type Output = Scalar;

    fn sub(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 - rhs.0)
    }
}

impl Mul for Scalar {
    type Output = Scalar;

    fn mul(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 * rhs.0)
    }
}

impl Neg for Scalar {
    type Output = Scalar;

    fn neg(self) -> Scalar {
        Scalar(-self.0)
    }
}

impl ConstantTimeEq for Scalar {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.to_bytes()[..].ct_eq(&other.to_bytes()[..])
    }
}

impl Zeroize for Scalar {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scalar(")?;
        hexf(&self.to_bytes(), f)?;
        write!(f, ")")
    }
}

/// A point of the BN254 G1 group. The group has prime order and cofactor one, so every
/// point that satisfies the curve equation is a valid group element.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Point(pub(crate) G1Projective);

impl Point {
    pub fn generator() -> Self {
        Point(G1Projective::generator())
    }

    pub fn identity() -> Self {
        Point(G1Projective::zero())
    }

    pub fn is_identity(&self) -> bool {
        self.0.is_zero()
    }

    /// Lift an x coordinate to a point, choosing the larger of `±y` when `larger` is set.
    pub(crate) fn from_x(x: Fq, larger: bool) -> Option<Self> {
        G1Affine::get_point_from_x_unchecked(x, larger)
            .filter(|p| p.is_on_curve() && p.is_in_correct_subgroup_assuming_on_curve())
            .map(|p| Point(p.into_group()))
    }

    /// Encoding layout:
    ///
    /// ```text
    /// ┌──────────┬──────────────────────────────┐
    /// │ tag (u8) │  x coordinate, big-endian    │
    /// │ byte 0   │  bytes 1..33                 │
    /// └──────────┴──────────────────────────────┘
    /// ```
    ///
    /// `0x00` marks the identity (x must be all zeros), `0x02`/`0x03` select the smaller or the
    /// larger of the two candidate y coordinates.
    pub fn to_bytes(&self) -> [u8; POINT_SIZE] {
        let mut out = [0u8; POINT_SIZE];
        let affine = self.0.into_affine();
        if affine.infinity {
            return out;
        }
        out[0] = if affine.y > -affine.y {
            TAG_Y_LARGER
        } else {
            TAG_Y_SMALLER
        };
        out[1..].copy_from_slice(&limbs_to_be_bytes(&affine.x.into_bigint().0));
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != POINT_SIZE {
            return Err(CryptoError::InvalidEncoding("point must be 33 bytes"));
        }
        let limbs = be_bytes_to_limbs(&bytes[1..])?;
        match bytes[0] {
            TAG_IDENTITY if limbs.iter().all(|l| *l == 0) => Ok(Point::identity()),
            TAG_IDENTITY => Err(CryptoError::InvalidEncoding(
                "identity point must have a zero x coordinate",
            )),
            tag @ (TAG_Y_SMALLER | TAG_Y_LARGER) => {
                let x = Fq::from_bigint(BigInt::new(limbs)).ok_or(
                    CryptoError::InvalidEncoding("x coordinate is not a canonical field element"),
                )?;
                Point::from_x(x, tag == TAG_Y_LARGER).ok_or(CryptoError::PointNotOnCurve)
            }
            _ => Err(CryptoError::InvalidEncoding("unknown point tag")),
        }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point(self.0 + rhs.0)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point(self.0 - rhs.0)
    }
}

impl Neg for Point {
    type Output = Point;

    fn neg(self) -> Point {
        Point(-self.0)
    }
}

impl Mul<Scalar> for Point {
    type Output = Point;

    fn mul(self, rhs: Scalar) -> Point {
        Point(self.0 * rhs.0)
    }
}

impl Mul<&Scalar> for &Point {
    type Output = Point;

    fn mul(self, rhs: &Scalar) -> Point {
        Point(self.0 * rhs.0)
    }
}

impl Sum for Point {
    fn sum<I: Iterator<Item = Point>>(iter: I) -> Point {
        iter.fold(Point::identity(), |acc, p| acc + p)
    }
}

impl ConstantTimeEq for Point {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.to_bytes()[..].ct_eq(&other.to_bytes()[..])
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point(")?;
        hexf(&self.to_bytes(), f)?;
        write!(f, ")")
    }
}

/// Constant time equality for byte strings of equal length.
pub fn ct_eq_bytes(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

fn limbs_to_be_bytes(limbs: &[u64; 4]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (i, limb) in limbs.iter().rev().enumerate() {
        out[i * 8..(i + 1) * 8].copy_from_slice(&limb.to_be_bytes());
    }
    out
}

fn be_bytes_to_limbs(bytes: &[u8]) -> Result<[u64; 4], CryptoError> {
    if bytes.len() != 32 {
        return Err(CryptoError::InvalidEncoding("field element must be 32 bytes"));
    }
    let mut limbs = [0u64; 4];
    for (i, chunk) in bytes.chunks_exact(8).enumerate() {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        limbs[3 - i] = u64::from_be_bytes(word);
    }
    Ok(limbs)
}
