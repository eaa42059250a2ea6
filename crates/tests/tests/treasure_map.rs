// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tpre_coordinator::{CoordinatorError, Policy, PolicyCoordinator, PolicyState};
use tpre_core::{decrypt_original, EncryptedTreasureMap, PreError, ProtocolObject};
use tpre_crypto::SecretKey;
use tpre_test_helpers::{test_config, PolicyHarness, RelayBehaviour};

/// Alice distributes and publishes the map; returns it as the bytes Bob would fetch.
fn publish(h: &PolicyHarness) -> Result<(PolicyCoordinator, Vec<u8>)> {
    let policy = h.policy(2, 3, chrono::Duration::hours(1))?;
    let mut alice = h.coordinator(policy, test_config(Duration::from_secs(10)));
    alice.distribute(&h.alice, &h.alice_signer)?;
    let map = alice
        .treasure_map()
        .map(|map| map.to_bytes())
        .ok_or_else(|| anyhow::anyhow!("no treasure map after distribution"))?;
    Ok((alice, map))
}

fn grantee(h: &PolicyHarness) -> Result<PolicyCoordinator> {
    let policy = h.policy(2, 3, chrono::Duration::hours(1))?;
    Ok(h.coordinator(policy, test_config(Duration::from_secs(10))))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn grantee_retrieves_from_the_published_map() -> Result<()> {
    let h = PolicyHarness::new(30, &[RelayBehaviour::Honest; 4]).await;
    let (capsule, _) = h.encrypt(b"payload")?;
    let (alice, bytes) = publish(&h)?;

    let map = EncryptedTreasureMap::from_bytes(&bytes)?;
    let mut bob = grantee(&h)?;
    bob.open_treasure_map(&map, &h.bob, &h.alice_signer.verifying_key())?;
    assert!(matches!(bob.state(), PolicyState::Distributing(_)));

    let listed: Vec<_> = bob.assigned_relays().map(|r| r.address).collect();
    let assigned: Vec<_> = alice.assigned_relays().map(|r| r.address).collect();
    assert_eq!(listed, assigned);

    let key = bob.retrieve(&capsule, &h.bob).await?;
    assert_eq!(key, decrypt_original(&h.alice, &capsule)?);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn grantee_substitutes_from_the_roster() -> Result<()> {
    let h = PolicyHarness::new(31, &[RelayBehaviour::Honest; 4]).await;
    let (capsule, _) = h.encrypt(b"payload")?;
    let (alice, bytes) = publish(&h)?;
    let down: Vec<_> = alice.assigned_relays().take(2).map(|r| r.address).collect();
    for address in &down {
        h.network
            .set_behaviour(address, RelayBehaviour::Unreachable)
            .await;
    }

    let mut bob = grantee(&h)?;
    bob.open_treasure_map(
        &EncryptedTreasureMap::from_bytes(&bytes)?,
        &h.bob,
        &h.alice_signer.verifying_key(),
    )?;
    let key = bob.retrieve(&capsule, &h.bob).await?;
    assert_eq!(key, decrypt_original(&h.alice, &capsule)?);
    assert_eq!(bob.completion()?.tally.unreachable, 2);
    Ok(())
}

#[tokio::test]
async fn map_is_checked_before_use() -> Result<()> {
    let h = PolicyHarness::new(32, &[RelayBehaviour::Honest; 3]).await;
    let (_, bytes) = publish(&h)?;
    let map = EncryptedTreasureMap::from_bytes(&bytes)?;

    let mut bob = grantee(&h)?;
    assert_eq!(
        bob.open_treasure_map(&map, &h.bob, &SecretKey::random().public_key())
            .unwrap_err(),
        CoordinatorError::Pre(PreError::InvalidTreasureMapSignature)
    );
    assert_eq!(
        bob.open_treasure_map(&map, &SecretKey::random(), &h.alice_signer.verifying_key())
            .unwrap_err(),
        CoordinatorError::GranteeMismatch
    );
    assert_eq!(bob.state().name(), "Created");

    let other = Policy::new(
        "another-policy",
        h.alice.public_key(),
        h.bob.public_key(),
        2,
        3,
        h.roster(),
        Utc::now() + chrono::Duration::hours(1),
    )?;
    let mut carol = h.coordinator(other, test_config(Duration::from_secs(10)));
    assert_eq!(
        carol
            .open_treasure_map(&map, &h.bob, &h.alice_signer.verifying_key())
            .unwrap_err(),
        CoordinatorError::Pre(PreError::TreasureMapMismatch)
    );
    Ok(())
}
