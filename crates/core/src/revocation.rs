// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use tpre_crypto::{PublicKey, Signature, Signer};

use crate::{
    wire::{impl_serde_via_wire, Reader},
    Hrac, PreError, ProtocolObject,
};

const REVOKE_PREFIX: &[u8] = b"REVOKE-";

/// Grantor instruction to drop every kfrag of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revocation {
    hrac: Hrac,
    grantor: PublicKey,
    signature: Signature,
}

impl Revocation {
    pub fn new(signer: &Signer, hrac: Hrac) -> Self {
        Self {
            hrac,
            grantor: signer.verifying_key(),
            signature: signer.sign(&revocation_message(&hrac)),
        }
    }

    pub fn hrac(&self) -> &Hrac {
        &self.hrac
    }

    pub fn grantor(&self) -> &PublicKey {
        &self.grantor
    }

    pub fn verify(&self) -> bool {
        self.signature
            .verify(&self.grantor, &revocation_message(&self.hrac))
    }
}

fn revocation_message(hrac: &Hrac) -> Vec<u8> {
    let mut msg = REVOKE_PREFIX.to_vec();
    msg.extend_from_slice(hrac.as_bytes());
    msg
}

impl ProtocolObject for Revocation {
    const BRAND: [u8; 4] = *b"RVKE";

    fn write_body(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.hrac.as_bytes());
        out.extend_from_slice(&self.grantor.to_bytes());
        out.extend_from_slice(&self.signature.to_bytes());
    }

    fn read_body(reader: &mut Reader<'_>, _minor: u16) -> Result<Self, PreError> {
        Ok(Revocation {
            hrac: Hrac::from_bytes(reader.array()?),
            grantor: reader.public_key()?,
            signature: reader.signature()?,
        })
    }
}

impl_serde_via_wire!(Revocation);
