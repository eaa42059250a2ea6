// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::time::Duration;

use anyhow::Result;
use tpre_coordinator::{
    AbandonCause, CoordinatorError, PolicyCoordinator, PolicyState, RelayRecord,
};
use tpre_core::decrypt_original;
use tpre_test_helpers::{test_config, PolicyHarness, RelayBehaviour};
use tracing_test::traced_test;

const ORDER_TIMEOUT: Duration = Duration::from_secs(2);
const STALL: Duration = Duration::from_secs(60);

/// Distribute, then return the relays in the order the coordinator will use them.
async fn ranked(
    h: &PolicyHarness,
    threshold: usize,
    shares: usize,
) -> Result<(PolicyCoordinator, Vec<RelayRecord>)> {
    let policy = h.policy(threshold, shares, chrono::Duration::hours(1))?;
    let mut coordinator = h.coordinator(policy, test_config(ORDER_TIMEOUT));
    coordinator.distribute(&h.alice, &h.alice_signer)?;
    let PolicyState::Distributing(state) = coordinator.state() else {
        panic!("expected Distributing");
    };
    let candidates = state.candidates().to_vec();
    Ok((coordinator, candidates))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[traced_test]
async fn timeouts_and_unreachable_relays_are_replaced() -> Result<()> {
    let h = PolicyHarness::new(10, &[RelayBehaviour::Honest; 5]).await;
    let (capsule, _) = h.encrypt(b"payload")?;
    let (mut coordinator, ranked) = ranked(&h, 3, 3).await?;

    h.network
        .set_behaviour(&ranked[0].address, RelayBehaviour::Slow(STALL))
        .await;
    h.network
        .set_behaviour(&ranked[1].address, RelayBehaviour::Unreachable)
        .await;

    let key = coordinator.retrieve(&capsule, &h.bob).await?;
    assert_eq!(key, decrypt_original(&h.alice, &capsule)?);

    let PolicyState::Complete(complete) = coordinator.state() else {
        panic!("expected Complete, got {}", coordinator.state());
    };
    assert_eq!(complete.tally.timeouts, 1);
    assert_eq!(complete.tally.unreachable, 1);

    // The stalled relay is never asked twice; both spares were drafted.
    assert_eq!(h.network.work_orders_received(&ranked[0].address).await, 1);
    assert_eq!(h.network.work_orders_received(&ranked[3].address).await, 1);
    assert_eq!(h.network.work_orders_received(&ranked[4].address).await, 1);
    assert_eq!(coordinator.assigned_relays().count(), 5);
    assert!(logs_contain("relay failed"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bad_signatures_and_garbage_are_replaced() -> Result<()> {
    let h = PolicyHarness::new(11, &[RelayBehaviour::Honest; 4]).await;
    let (capsule, _) = h.encrypt(b"payload")?;
    let (mut coordinator, ranked) = ranked(&h, 2, 2).await?;

    h.network
        .set_behaviour(&ranked[0].address, RelayBehaviour::ForgedSignature)
        .await;
    h.network
        .set_behaviour(&ranked[1].address, RelayBehaviour::Malformed)
        .await;

    let key = coordinator.retrieve(&capsule, &h.bob).await?;
    assert_eq!(key, decrypt_original(&h.alice, &capsule)?);
    let PolicyState::Complete(complete) = coordinator.state() else {
        panic!("expected Complete");
    };
    assert_eq!(complete.tally.malformed, 2);
    assert_eq!(complete.tally.proof_failures, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn exhausting_the_roster_abandons_with_a_tally() -> Result<()> {
    let h = PolicyHarness::new(12, &[RelayBehaviour::Honest; 4]).await;
    let (capsule, _) = h.encrypt(b"payload")?;
    let (mut coordinator, ranked) = ranked(&h, 3, 3).await?;

    for relay in &ranked[..2] {
        h.network
            .set_behaviour(&relay.address, RelayBehaviour::CorruptProof)
            .await;
    }

    let err = coordinator.retrieve(&capsule, &h.bob).await.unwrap_err();
    let CoordinatorError::Abandoned(reason) = err else {
        panic!("expected abandonment, got {err:?}");
    };
    assert_eq!(reason.cause, AbandonCause::RosterExhausted);
    assert_eq!(reason.tally.proof_failures, 2);
    assert_eq!(
        coordinator.state().abandon_reason().map(|r| r.cause),
        Some(AbandonCause::RosterExhausted)
    );
    Ok(())
}

#[tokio::test]
async fn low_stake_relays_are_never_selected() -> Result<()> {
    let h = PolicyHarness::new(13, &[RelayBehaviour::Honest; 2]).await;
    let policy = h.policy(2, 2, chrono::Duration::hours(1))?;
    let mut config = test_config(ORDER_TIMEOUT);
    config.min_stake = tpre_test_helpers::DEFAULT_STAKE + 1;
    let mut coordinator = h.coordinator(policy, config);

    let err = coordinator
        .distribute(&h.alice, &h.alice_signer)
        .unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::Abandoned(reason) if reason.cause == AbandonCause::RelayShortage
    ));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn swapped_precursor_is_a_proof_failure() -> Result<()> {
    let h = PolicyHarness::new(14, &[RelayBehaviour::Honest; 3]).await;
    let (capsule, _) = h.encrypt(b"payload")?;
    let (mut coordinator, ranked) = ranked(&h, 2, 3).await?;

    h.network
        .set_behaviour(&ranked[0].address, RelayBehaviour::SwappedPrecursor)
        .await;
    for relay in &ranked[1..] {
        h.network
            .set_behaviour(&relay.address, RelayBehaviour::Slow(Duration::from_millis(300)))
            .await;
    }

    let key = coordinator.retrieve(&capsule, &h.bob).await?;
    assert_eq!(key, decrypt_original(&h.alice, &capsule)?);
    let complete = coordinator.completion()?;
    assert_eq!(complete.tally.proof_failures, 1);
    assert_eq!(complete.tally.total(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn crashed_order_task_is_substituted() -> Result<()> {
    let h = PolicyHarness::new(15, &[RelayBehaviour::Honest; 4]).await;
    let (capsule, _) = h.encrypt(b"payload")?;
    let (mut coordinator, ranked) = ranked(&h, 2, 2).await?;

    h.network
        .set_behaviour(&ranked[0].address, RelayBehaviour::Panics)
        .await;

    let key = coordinator.retrieve(&capsule, &h.bob).await?;
    assert_eq!(key, decrypt_original(&h.alice, &capsule)?);
    let complete = coordinator.completion()?;
    assert_eq!(complete.tally.unreachable, 1);
    assert_eq!(h.network.work_orders_received(&ranked[2].address).await, 1);
    Ok(())
}
