// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::time::Duration;

use anyhow::Result;
use tpre_coordinator::{AbandonCause, CoordinatorError, RelayError};
use tpre_test_helpers::{test_config, PolicyHarness, RelayBehaviour};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn revoked_policy_is_refused_by_every_relay() -> Result<()> {
    let h = PolicyHarness::new(30, &[RelayBehaviour::Honest; 3]).await;
    let (capsule, _) = h.encrypt(b"payload")?;

    let policy = h.policy(2, 3, chrono::Duration::hours(1))?;
    let mut coordinator = h.coordinator(policy.clone(), test_config(Duration::from_secs(5)));
    coordinator.distribute(&h.alice, &h.alice_signer)?;
    coordinator.retrieve(&capsule, &h.bob).await?;

    let outcomes = coordinator.revoke(&h.alice_signer).await?;
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|(_, result)| result.is_ok()));
    for relay in &h.relays {
        let service = h.network.service(&relay.address).await.unwrap();
        assert!(service.is_revoked(policy.hrac(), &h.alice_signer.verifying_key()));
    }

    // Fresh kfrags for the same policy are still refused.
    let mut again = h.coordinator(policy, test_config(Duration::from_secs(5)));
    again.distribute(&h.alice, &h.alice_signer)?;
    let err = again.retrieve(&capsule, &h.bob).await.unwrap_err();
    let CoordinatorError::Abandoned(reason) = err else {
        panic!("expected abandonment, got {err:?}");
    };
    assert_eq!(reason.cause, AbandonCause::RosterExhausted);
    assert_eq!(reason.tally.refused, 3);
    Ok(())
}

#[tokio::test]
async fn revocation_reports_unreachable_relays() -> Result<()> {
    let h = PolicyHarness::new(
        31,
        &[
            RelayBehaviour::Honest,
            RelayBehaviour::Honest,
            RelayBehaviour::Unreachable,
        ],
    )
    .await;
    let policy = h.policy(2, 3, chrono::Duration::hours(1))?;
    let mut coordinator = h.coordinator(policy, test_config(Duration::from_secs(5)));

    assert!(matches!(
        coordinator.revoke(&h.alice_signer).await,
        Err(CoordinatorError::InvalidState { .. })
    ));

    coordinator.distribute(&h.alice, &h.alice_signer)?;
    let outcomes = coordinator.revoke(&h.alice_signer).await?;
    let failed: Vec<_> = outcomes
        .iter()
        .filter_map(|(address, result)| result.as_ref().err().map(|e| (*address, e.clone())))
        .collect();
    assert_eq!(
        failed,
        vec![(h.relays[2].address, RelayError::Unreachable(h.relays[2].address))]
    );
    Ok(())
}
