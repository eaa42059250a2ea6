// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use tpre_crypto::{PublicKey, Signature, Signer};

use crate::{
    wire::{impl_serde_via_wire, put_object, Reader},
    Capsule, CapsuleFrag, Hrac, KeyFrag, PreError, ProtocolObject,
};

const GRANT_PREFIX: &[u8] = b"grant:";
const WORK_ORDER_PREFIX: &[u8] = b"wo:";
const RESPONSE_PREFIX: &[u8] = b"wr:";

/// A kfrag as handed out by the grantor: tied to a policy and an expiry, signed by the grantor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyGrant {
    hrac: Hrac,
    expires_at: u64,
    kfrag: KeyFrag,
    grantor: PublicKey,
    signature: Signature,
}

impl PolicyGrant {
    /// `expires_at` is a unix timestamp in seconds.
    pub fn new(signer: &Signer, hrac: Hrac, expires_at: u64, kfrag: KeyFrag) -> Self {
        let signature = signer.sign(&grant_message(&hrac, expires_at, &kfrag));
        Self {
            hrac,
            expires_at,
            kfrag,
            grantor: signer.verifying_key(),
            signature,
        }
    }

    pub fn hrac(&self) -> &Hrac {
        &self.hrac
    }

    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    pub fn kfrag(&self) -> &KeyFrag {
        &self.kfrag
    }

    pub fn grantor(&self) -> &PublicKey {
        &self.grantor
    }

    pub fn verify(&self) -> bool {
        self.signature.verify(
            &self.grantor,
            &grant_message(&self.hrac, self.expires_at, &self.kfrag),
        )
    }
}

fn grant_message(hrac: &Hrac, expires_at: u64, kfrag: &KeyFrag) -> Vec<u8> {
    let mut msg = Vec::with_capacity(GRANT_PREFIX.len() + 16 + 8 + 32 + 33);
    msg.extend_from_slice(GRANT_PREFIX);
    msg.extend_from_slice(hrac.as_bytes());
    msg.extend_from_slice(&expires_at.to_be_bytes());
    msg.extend_from_slice(kfrag.id().as_bytes());
    msg.extend_from_slice(&kfrag.commitment().to_bytes());
    msg
}

impl ProtocolObject for PolicyGrant {
    const BRAND: [u8; 4] = *b"GRNT";

    fn write_body(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.hrac.as_bytes());
        out.extend_from_slice(&self.expires_at.to_be_bytes());
        put_object(out, &self.kfrag);
        out.extend_from_slice(&self.grantor.to_bytes());
        out.extend_from_slice(&self.signature.to_bytes());
    }

    fn read_body(reader: &mut Reader<'_>, _minor: u16) -> Result<Self, PreError> {
        Ok(PolicyGrant {
            hrac: Hrac::from_bytes(reader.array()?),
            expires_at: reader.u64()?,
            kfrag: reader.object()?,
            grantor: reader.public_key()?,
            signature: reader.signature()?,
        })
    }
}

impl_serde_via_wire!(PolicyGrant);

/// A grantee's request that one relay re-encrypt one capsule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkOrder {
    grant: PolicyGrant,
    capsule: Capsule,
    grantee: PublicKey,
    signature: Signature,
}

impl WorkOrder {
    pub fn new(
        grantee: &Signer,
        grant: PolicyGrant,
        capsule: Capsule,
        relay_identity: &PublicKey,
    ) -> Self {
        let signature = grantee.sign(&work_order_message(grant.hrac(), relay_identity, &capsule));
        Self {
            grant,
            capsule,
            grantee: grantee.verifying_key(),
            signature,
        }
    }

    pub fn grant(&self) -> &PolicyGrant {
        &self.grant
    }

    pub fn capsule(&self) -> &Capsule {
        &self.capsule
    }

    pub fn grantee(&self) -> &PublicKey {
        &self.grantee
    }

    /// Whether the order was signed by the grantee for the relay with `relay_identity`.
    pub fn verify(&self, relay_identity: &PublicKey) -> bool {
        self.signature.verify(
            &self.grantee,
            &work_order_message(self.grant.hrac(), relay_identity, &self.capsule),
        )
    }
}

fn work_order_message(hrac: &Hrac, relay_identity: &PublicKey, capsule: &Capsule) -> Vec<u8> {
    let mut msg = Vec::with_capacity(WORK_ORDER_PREFIX.len() + 16 + 33 + 106);
    msg.extend_from_slice(WORK_ORDER_PREFIX);
    msg.extend_from_slice(hrac.as_bytes());
    msg.extend_from_slice(&relay_identity.to_bytes());
    msg.extend_from_slice(&capsule.to_bytes());
    msg
}

impl ProtocolObject for WorkOrder {
    const BRAND: [u8; 4] = *b"WORD";

    fn write_body(&self, out: &mut Vec<u8>) {
        put_object(out, &self.grant);
        put_object(out, &self.capsule);
        out.extend_from_slice(&self.grantee.to_bytes());
        out.extend_from_slice(&self.signature.to_bytes());
    }

    fn read_body(reader: &mut Reader<'_>, _minor: u16) -> Result<Self, PreError> {
        Ok(WorkOrder {
            grant: reader.object()?,
            capsule: reader.object()?,
            grantee: reader.public_key()?,
            signature: reader.signature()?,
        })
    }
}

impl_serde_via_wire!(WorkOrder);

/// A relay's answer to a work order: the cfrag, signed with the relay's identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkOrderResponse {
    cfrag: CapsuleFrag,
    signature: Signature,
}

impl WorkOrderResponse {
    pub fn new(relay: &Signer, cfrag: CapsuleFrag) -> Self {
        let signature = relay.sign(&response_message(&cfrag));
        Self { cfrag, signature }
    }

    pub fn cfrag(&self) -> &CapsuleFrag {
        &self.cfrag
    }

    pub fn verify(&self, relay_identity: &PublicKey) -> bool {
        self.signature
            .verify(relay_identity, &response_message(&self.cfrag))
    }

    pub fn into_cfrag(self) -> CapsuleFrag {
        self.cfrag
    }
}

fn response_message(cfrag: &CapsuleFrag) -> Vec<u8> {
    let mut msg = RESPONSE_PREFIX.to_vec();
    msg.extend_from_slice(&cfrag.to_bytes());
    msg
}

impl ProtocolObject for WorkOrderResponse {
    const BRAND: [u8; 4] = *b"WRES";

    fn write_body(&self, out: &mut Vec<u8>) {
        put_object(out, &self.cfrag);
        out.extend_from_slice(&self.signature.to_bytes());
    }

    fn read_body(reader: &mut Reader<'_>, _minor: u16) -> Result<Self, PreError> {
        Ok(WorkOrderResponse {
            cfrag: reader.object()?,
            signature: reader.signature()?,
        })
    }
}

impl_serde_via_wire!(WorkOrderResponse);
