// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::time::Duration;

use anyhow::Result;
use tpre_coordinator::{policy_event_channel, PolicyEvent, PolicyState};
use tpre_core::{decrypt_original, decrypt_with_key};
use tpre_logger::PolicyEventLogger;
use tpre_test_helpers::{test_config, PolicyHarness, RelayBehaviour};

const HONEST_DELAY: Duration = Duration::from_millis(500);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn three_of_five_with_two_corrupted_relays() -> Result<()> {
    let honest = RelayBehaviour::Slow(HONEST_DELAY);
    let h = PolicyHarness::new(
        1,
        &[
            honest,
            RelayBehaviour::CorruptProof,
            honest,
            RelayBehaviour::CorruptProof,
            honest,
        ],
    )
    .await;
    let (capsule, ciphertext) = h.encrypt(b"the launch codes")?;

    let (tx, mut rx) = policy_event_channel();
    let (log_tx, log_rx) = policy_event_channel();
    let logger = PolicyEventLogger::attach_policy("bob", log_rx);

    let policy = h.policy(3, 5, chrono::Duration::hours(1))?;
    let mut coordinator = h
        .coordinator(policy, test_config(Duration::from_secs(10)))
        .with_events(tx);
    coordinator.distribute(&h.alice, &h.alice_signer)?;
    let key = coordinator.retrieve(&capsule, &h.bob).await?;

    assert_eq!(key, decrypt_original(&h.alice, &capsule)?);
    assert_eq!(
        decrypt_with_key(&key, &capsule, &ciphertext)?,
        b"the launch codes"
    );

    let PolicyState::Complete(complete) = coordinator.state() else {
        panic!("expected Complete, got {}", coordinator.state());
    };
    assert_eq!(complete.tally.proof_failures, 2);
    assert_eq!(complete.tally.total(), 2);

    drop(coordinator);
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        log_tx.send(event.clone())?;
        events.push(event);
    }
    drop(log_tx);

    let verified = events
        .iter()
        .filter(|e| matches!(e, PolicyEvent::CfragVerified { .. }))
        .count();
    let dispatched = events
        .iter()
        .filter(|e| matches!(e, PolicyEvent::WorkOrderDispatched { .. }))
        .count();
    assert_eq!(verified, 3);
    assert_eq!(dispatched, 5);
    assert!(matches!(events.last(), Some(PolicyEvent::Completed { .. })));

    let transitions: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            PolicyEvent::StateChanged { to, .. } => Some(to.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        ["Distributing", "AwaitingCfrags", "Aggregating", "Complete"]
    );

    assert_eq!(logger.await?, events.len());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fan_out_width_does_not_change_the_key() -> Result<()> {
    let h = PolicyHarness::new(2, &[RelayBehaviour::Honest; 4]).await;
    let (capsule, _) = h.encrypt(b"payload")?;
    let expected = decrypt_original(&h.alice, &capsule)?;

    for fan_out in [2, 3, 4] {
        let policy = h.policy(2, 4, chrono::Duration::hours(1))?;
        let mut config = test_config(Duration::from_secs(10));
        config.fan_out = Some(fan_out);
        let mut coordinator = h.coordinator(policy, config);
        coordinator.distribute(&h.alice, &h.alice_signer)?;
        assert_eq!(coordinator.retrieve(&capsule, &h.bob).await?, expected);
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn coordinator_does_not_serve_another_grantee() -> Result<()> {
    let h = PolicyHarness::new(3, &[RelayBehaviour::Honest; 3]).await;
    let (capsule, _) = h.encrypt(b"payload")?;
    let policy = h.policy(2, 3, chrono::Duration::hours(1))?;
    let mut coordinator = h.coordinator(policy, test_config(Duration::from_secs(10)));
    coordinator.distribute(&h.alice, &h.alice_signer)?;

    let mallory = tpre_crypto::SecretKey::random();
    assert_eq!(
        coordinator.retrieve(&capsule, &mallory).await.unwrap_err(),
        tpre_coordinator::CoordinatorError::GranteeMismatch
    );
    assert_eq!(coordinator.state().name(), "Distributing");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn several_capsules_under_one_policy() -> Result<()> {
    let h = PolicyHarness::new(4, &[RelayBehaviour::Honest; 3]).await;
    let (first, first_ct) = h.encrypt(b"first message")?;
    let (second, second_ct) = h.encrypt(b"second message")?;

    let policy = h.policy(2, 3, chrono::Duration::hours(1))?;
    let mut config = test_config(Duration::from_secs(10));
    config.fan_out = Some(2);
    let mut coordinator = h.coordinator(policy, config);
    coordinator.distribute(&h.alice, &h.alice_signer)?;

    let key = coordinator.retrieve(&first, &h.bob).await?;
    assert_eq!(decrypt_with_key(&key, &first, &first_ct)?, b"first message");
    let key = coordinator.retrieve(&second, &h.bob).await?;
    assert_eq!(decrypt_with_key(&key, &second, &second_ct)?, b"second message");
    assert_eq!(coordinator.state().name(), "Complete");

    let mut orders = 0;
    for relay in &h.relays {
        orders += h.network.work_orders_received(&relay.address).await;
    }
    assert_eq!(orders, 4);

    // A capsule seen before is opened from the cfrags already verified.
    assert_eq!(
        coordinator.retrieve(&first, &h.bob).await?,
        decrypt_original(&h.alice, &first)?
    );
    let mut repeated = 0;
    for relay in &h.relays {
        repeated += h.network.work_orders_received(&relay.address).await;
    }
    assert_eq!(repeated, orders);
    Ok(())
}
