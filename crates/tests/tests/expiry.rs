// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::time::Duration;

use anyhow::Result;
use tpre_coordinator::{AbandonCause, CoordinatorError, PolicyState};
use tpre_test_helpers::{test_config, PolicyHarness, RelayBehaviour};

const STALL: Duration = Duration::from_secs(60);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn policy_expires_while_waiting_for_cfrags() -> Result<()> {
    let h = PolicyHarness::new(20, &[RelayBehaviour::Slow(STALL); 3]).await;
    let (capsule, _) = h.encrypt(b"payload")?;
    let policy = h.policy(2, 2, chrono::Duration::seconds(3))?;
    let hrac = *policy.hrac();
    let mut coordinator = h.coordinator(policy, test_config(Duration::from_secs(30)));
    coordinator.distribute(&h.alice, &h.alice_signer)?;

    let PolicyState::Distributing(state) = coordinator.state() else {
        panic!("expected Distributing");
    };
    let first = state.candidates()[0].address;
    h.network
        .set_behaviour(&first, RelayBehaviour::Unreachable)
        .await;

    let err = coordinator.retrieve(&capsule, &h.bob).await.unwrap_err();
    let CoordinatorError::PolicyExpired { hrac: expired, tally } = err else {
        panic!("expected expiry, got {err:?}");
    };
    assert_eq!(expired, hrac);
    assert_eq!(tally.unreachable, 1);
    assert_eq!(tally.timeouts, 0);

    let reason = coordinator.state().abandon_reason().copied();
    assert_eq!(reason.map(|r| r.cause), Some(AbandonCause::Expired));
    assert_eq!(reason.map(|r| r.tally), Some(tally));
    Ok(())
}

#[tokio::test]
async fn expired_policy_is_not_distributed() -> Result<()> {
    let h = PolicyHarness::new(21, &[RelayBehaviour::Honest; 2]).await;
    let policy = h.policy(1, 2, chrono::Duration::seconds(-1))?;
    let mut coordinator = h.coordinator(policy, test_config(Duration::from_secs(5)));

    let err = coordinator
        .distribute(&h.alice, &h.alice_signer)
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::PolicyExpired { .. }));
    assert!(coordinator.state().is_terminal());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn abandoned_policy_rejects_further_work() -> Result<()> {
    let h = PolicyHarness::new(22, &[RelayBehaviour::Unreachable; 2]).await;
    let (capsule, _) = h.encrypt(b"payload")?;
    let policy = h.policy(2, 2, chrono::Duration::hours(1))?;
    let mut coordinator = h.coordinator(policy, test_config(Duration::from_secs(5)));
    coordinator.distribute(&h.alice, &h.alice_signer)?;

    assert!(coordinator.retrieve(&capsule, &h.bob).await.is_err());
    assert_eq!(
        coordinator.retrieve(&capsule, &h.bob).await.unwrap_err(),
        CoordinatorError::InvalidState {
            operation: "retrieve",
            state: "Abandoned"
        }
    );
    Ok(())
}
