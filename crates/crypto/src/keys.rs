// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use core::fmt;

use rand::{rngs::OsRng, CryptoRng, RngCore};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use tpre_utils::hexf;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::{parameters, CryptoError, Point, Scalar, ScalarDigest, POINT_SIZE, SCALAR_SIZE};

const NONCE_DST: &[u8] = b"TPRE/SIG/NONCE";
const CHALLENGE_DST: &[u8] = b"TPRE/SIG/CHALLENGE";

/// Encoded size of a [`Signature`]: the commitment point followed by the response scalar.
pub const SIGNATURE_SIZE: usize = POINT_SIZE + SCALAR_SIZE;

/// A non-zero secret scalar. Wiped from memory when dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Scalar);

impl SecretKey {
    pub fn random() -> Self {
        Self::random_with(&mut OsRng)
    }

    pub fn random_with<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(Scalar::random_nonzero(rng))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let scalar = Scalar::from_bytes(bytes)?;
        if scalar.is_zero() {
            return Err(CryptoError::ZeroScalar);
        }
        Ok(Self(scalar))
    }

    pub fn to_secret_bytes(&self) -> Zeroizing<[u8; SCALAR_SIZE]> {
        Zeroizing::new(self.0.to_bytes())
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(parameters().g * self.0)
    }

    pub fn scalar(&self) -> &Scalar {
        &self.0
    }
}

impl Zeroize for SecretKey {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for SecretKey {}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// A public key `g^sk`. The identity point is never a valid key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(Point);

impl PublicKey {
    pub fn from_point(point: Point) -> Result<Self, CryptoError> {
        if point.is_identity() {
            return Err(CryptoError::InvalidEncoding("public key is the identity"));
        }
        Ok(Self(point))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        Self::from_point(Point::from_bytes(bytes)?)
    }

    pub fn to_bytes(&self) -> [u8; POINT_SIZE] {
        self.0.to_bytes()
    }

    pub fn point(&self) -> &Point {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey(")?;
        hexf(&self.to_bytes(), f)?;
        write!(f, ")")
    }
}

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes: Vec<u8> = Vec::deserialize(deserializer)?;
        PublicKey::from_bytes(&bytes).map_err(de::Error::custom)
    }
}

/// A Schnorr signature `(R, s)` over G1 with `g^s == R + pk^e`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    commitment: Point,
    response: Scalar,
}

impl Signature {
    pub fn verify(&self, public_key: &PublicKey, message: &[u8]) -> bool {
        let e = challenge(&self.commitment, public_key, message);
        parameters().g * self.response == self.commitment + *public_key.point() * e
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE] {
        let mut out = [0u8; SIGNATURE_SIZE];
        out[..POINT_SIZE].copy_from_slice(&self.commitment.to_bytes());
        out[POINT_SIZE..].copy_from_slice(&self.response.to_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != SIGNATURE_SIZE {
            return Err(CryptoError::InvalidEncoding("signature must be 65 bytes"));
        }
        Ok(Self {
            commitment: Point::from_bytes(&bytes[..POINT_SIZE])?,
            response: Scalar::from_bytes(&bytes[POINT_SIZE..])?,
        })
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(")?;
        hexf(&self.to_bytes(), f)?;
        write!(f, ")")
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes: Vec<u8> = Vec::deserialize(deserializer)?;
        Signature::from_bytes(&bytes).map_err(de::Error::custom)
    }
}

/// Holds a signing key. Used by grantors to authenticate key fragments, by grantees to
/// authenticate work orders and by relays to authenticate their responses.
#[derive(Clone)]
pub struct Signer {
    secret: SecretKey,
    public: PublicKey,
}

impl Signer {
    pub fn new(secret: SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    pub fn random() -> Self {
        Self::new(SecretKey::random())
    }

    pub fn verifying_key(&self) -> PublicKey {
        self.public
    }

    /// Nonces are hedged: derived from the secret, the message and fresh randomness, so a
    /// broken rng alone cannot leak the key.
    pub fn sign(&self, message: &[u8]) -> Signature {
        let mut entropy = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut entropy[..]);
        let secret_bytes = self.secret.to_secret_bytes();
        let nonce = ScalarDigest::new(NONCE_DST)
            .chain_bytes(&secret_bytes[..])
            .chain_bytes(message)
            .chain_bytes(&entropy[..])
            .finalize();
        let commitment = parameters().g * nonce;
        let e = challenge(&commitment, &self.public, message);
        Signature {
            commitment,
            response: nonce + e * *self.secret.scalar(),
        }
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

fn challenge(commitment: &Point, public_key: &PublicKey, message: &[u8]) -> Scalar {
    ScalarDigest::new(CHALLENGE_DST)
        .chain_point(commitment)
        .chain_point(public_key.point())
        .chain_bytes(message)
        .finalize()
}
