// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use core::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::{CryptoError, Point};

pub const SYMMETRIC_KEY_SIZE: usize = 32;
const NONCE_LEN: usize = 12;
const KDF_INFO: &[u8] = b"TPRE/KDF/SYMMETRIC_KEY";

/// The 256-bit key recovered by decapsulation. Compared in constant time and wiped on drop.
#[derive(Clone)]
pub struct SymmetricKey(Zeroizing<[u8; SYMMETRIC_KEY_SIZE]>);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; SYMMETRIC_KEY_SIZE]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_SIZE] {
        &self.0
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for SymmetricKey {}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// HKDF-SHA256 over the encoding of a shared point.
pub fn kdf(shared: &Point) -> Result<SymmetricKey, CryptoError> {
    let ikm = Zeroizing::new(shared.to_bytes());
    let hk = Hkdf::<Sha256>::new(None, &ikm[..]);
    let mut okm = Zeroizing::new([0u8; SYMMETRIC_KEY_SIZE]);
    hk.expand(KDF_INFO, &mut okm[..])
        .map_err(|_| CryptoError::Kdf)?;
    Ok(SymmetricKey(okm))
}

/// AES-256-GCM with a random nonce. Output layout is `[nonce(12)][ciphertext+tag]`.
pub struct Dem {
    cipher: Aes256Gcm,
}

impl Dem {
    pub fn new(key: &SymmetricKey) -> Result<Self, CryptoError> {
        let cipher =
            Aes256Gcm::new_from_slice(&key.as_bytes()[..]).map_err(|_| CryptoError::Encryption)?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| CryptoError::Encryption)?;

        let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    pub fn decrypt(&self, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < NONCE_LEN {
            return Err(CryptoError::Decryption);
        }
        let (nonce, body) = ciphertext.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), Payload { msg: body, aad })
            .map_err(|_| CryptoError::Decryption)
    }
}
