// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::Result;
use chrono::{Duration, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tpre_core::{split, Capsule, Hrac, PolicyGrant, PreError, Revocation, WorkOrder};
use tpre_crypto::{SecretKey, Signer};
use tpre_relay::{RelayService, RelayServiceError};
use tracing_test::traced_test;

struct Setup {
    alice_signer: Signer,
    bob: Signer,
    relay: RelayService,
    capsule: Capsule,
    grant: PolicyGrant,
    hrac: Hrac,
}

fn setup(seed: u64, expires_in: Duration) -> Setup {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let alice = SecretKey::random_with(&mut rng);
    let alice_signer = Signer::random();
    let bob = Signer::random();
    let relay = RelayService::new(Signer::random(), 2);
    let hrac = Hrac::new(&alice.public_key(), &bob.verifying_key(), b"medical-records");

    let kfrag = split(&mut rng, &alice, &bob.verifying_key(), &alice_signer, 1, 2)
        .unwrap()
        .remove(0);
    let (capsule, _) = Capsule::encapsulate(&mut rng, &alice.public_key()).unwrap();
    let expires_at = (Utc::now() + expires_in).timestamp() as u64;
    let grant = PolicyGrant::new(&alice_signer, hrac, expires_at, kfrag.unverify());

    Setup {
        alice_signer,
        bob,
        relay,
        capsule,
        grant,
        hrac,
    }
}

impl Setup {
    fn order(&self) -> WorkOrder {
        WorkOrder::new(
            &self.bob,
            self.grant.clone(),
            self.capsule,
            &self.relay.identity(),
        )
    }
}

#[tokio::test]
#[traced_test]
async fn honest_order_yields_signed_verifiable_cfrag() -> Result<()> {
    let s = setup(1, Duration::hours(1));
    let response = s.relay.handle_work_order(s.order()).await?;

    assert!(response.verify(&s.relay.identity()));
    let cfrag = response.into_cfrag();
    assert!(tpre_core::verify(
        &s.capsule,
        &cfrag,
        s.grant.kfrag().commitment()
    ));
    assert_eq!(cfrag.kfrag_id(), s.grant.kfrag().id());
    assert!(logs_contain("work order complete"));
    Ok(())
}

#[tokio::test]
async fn order_for_another_relay_is_rejected() {
    let s = setup(2, Duration::hours(1));
    let other = RelayService::new(Signer::random(), 1);
    assert_eq!(
        other.handle_work_order(s.order()).await.unwrap_err(),
        RelayServiceError::InvalidWorkOrderSignature
    );
}

#[tokio::test]
async fn stranger_cannot_use_the_grant() {
    let s = setup(3, Duration::hours(1));
    let mallory = Signer::random();
    let order = WorkOrder::new(&mallory, s.grant.clone(), s.capsule, &s.relay.identity());
    assert_eq!(
        s.relay.handle_work_order(order).await.unwrap_err(),
        RelayServiceError::GranteeMismatch
    );
}

#[tokio::test]
async fn expired_policy_is_refused() {
    let s = setup(4, Duration::hours(1));
    let later = Utc::now() + Duration::hours(2);
    assert!(matches!(
        s.relay.handle_work_order_at(s.order(), later).await,
        Err(RelayServiceError::PolicyExpired { hrac, .. }) if hrac == s.hrac
    ));
}

#[tokio::test]
#[traced_test]
async fn revoked_policy_is_refused() -> Result<()> {
    let s = setup(5, Duration::hours(1));
    s.relay.handle_work_order(s.order()).await?;

    s.relay.revoke(&Revocation::new(&s.alice_signer, s.hrac))?;
    assert_eq!(
        s.relay.handle_work_order(s.order()).await.unwrap_err(),
        RelayServiceError::Revoked(s.hrac)
    );
    assert!(logs_contain("policy revoked"));
    Ok(())
}

#[tokio::test]
async fn revocation_by_someone_else_has_no_effect() -> Result<()> {
    let s = setup(6, Duration::hours(1));
    s.relay.revoke(&Revocation::new(&Signer::random(), s.hrac))?;
    assert!(s.relay.handle_work_order(s.order()).await.is_ok());
    assert!(!s.relay.is_revoked(&s.hrac, &s.alice_signer.verifying_key()));
    Ok(())
}

#[tokio::test]
async fn later_revocations_do_not_lift_an_earlier_one() -> Result<()> {
    let s = setup(9, Duration::hours(1));
    s.relay.revoke(&Revocation::new(&s.alice_signer, s.hrac))?;
    s.relay.revoke(&Revocation::new(&Signer::random(), s.hrac))?;
    s.relay.revoke(&Revocation::new(&s.alice_signer, s.hrac))?;

    assert!(s.relay.is_revoked(&s.hrac, &s.alice_signer.verifying_key()));
    assert_eq!(
        s.relay.handle_work_order(s.order()).await.unwrap_err(),
        RelayServiceError::Revoked(s.hrac)
    );
    Ok(())
}

#[tokio::test]
async fn far_future_expiry_never_lapses() -> Result<()> {
    let s = setup(10, Duration::hours(1));
    let grant = PolicyGrant::new(
        &s.alice_signer,
        s.hrac,
        u64::MAX,
        s.grant.kfrag().clone(),
    );
    let order = WorkOrder::new(&s.bob, grant, s.capsule, &s.relay.identity());
    let response = s
        .relay
        .handle_work_order_at(order, Utc::now() + Duration::days(365 * 100))
        .await?;
    assert!(response.verify(&s.relay.identity()));
    Ok(())
}

#[tokio::test]
async fn malformed_capsule_aborts_the_order() {
    let s = setup(7, Duration::hours(1));
    let mut bytes = tpre_core::ProtocolObject::to_bytes(&s.capsule);
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    let bad: Capsule = tpre_core::ProtocolObject::from_bytes(&bytes).unwrap();

    let order = WorkOrder::new(&s.bob, s.grant.clone(), bad, &s.relay.identity());
    assert_eq!(
        s.relay.handle_work_order(order).await.unwrap_err(),
        RelayServiceError::Reencryption(PreError::MalformedCapsule)
    );
}

#[tokio::test]
async fn grant_signed_with_wrong_key_is_refused() {
    let s = setup(8, Duration::hours(1));
    // A grant re-signed by a key that did not sign the kfrag.
    let forged = PolicyGrant::new(
        &Signer::random(),
        s.hrac,
        s.grant.expires_at(),
        s.grant.kfrag().clone(),
    );
    let order = WorkOrder::new(&s.bob, forged, s.capsule, &s.relay.identity());
    assert!(matches!(
        s.relay.handle_work_order(order).await,
        Err(RelayServiceError::InvalidKeyFrag(PreError::InvalidKeyFragSignature))
    ));
}
