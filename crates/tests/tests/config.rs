// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::time::Duration;

use anyhow::Result;
use figment::Jail;
use tpre_config::{load_config, TpreConfig, DEFAULT_CONFIG_NAME};
use tpre_coordinator::{CoordinatorConfig, PolicyState};
use tpre_core::decrypt_original;
use tpre_test_helpers::{PolicyHarness, RelayBehaviour};

fn load_from_jail() -> TpreConfig {
    let mut loaded = None;
    Jail::expect_with(|jail| {
        jail.create_file(
            DEFAULT_CONFIG_NAME,
            r#"
work_order_timeout_ms: 4000
default_threshold: 2
default_shares: 3
selection_seed: 99
"#,
        )?;
        jail.set_env("TPRE_DEFAULT_SHARES", "4");
        loaded = Some(load_config(None).map_err(|e| e.to_string())?);
        Ok(())
    });
    loaded.expect("configuration loaded")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn policy_runs_from_loaded_configuration() -> Result<()> {
    let config = load_from_jail();
    assert_eq!(config.default_shares, 4);

    let h = PolicyHarness::new(40, &[RelayBehaviour::Honest; 5]).await;
    let (capsule, _) = h.encrypt(b"payload")?;
    let policy = h.policy_from_config(&config)?;
    assert_eq!((policy.threshold(), policy.shares()), (2, 4));

    let coordinator_config = CoordinatorConfig::from(&config);
    assert_eq!(coordinator_config.work_order_timeout, Duration::from_secs(4));
    assert_eq!(coordinator_config.selection_seed, Some(99));

    let mut coordinator = h.coordinator(policy, coordinator_config);
    coordinator.distribute(&h.alice, &h.alice_signer)?;
    let PolicyState::Distributing(state) = coordinator.state() else {
        panic!("expected Distributing");
    };
    assert_eq!(state.grants().len(), 4);

    let key = coordinator.retrieve(&capsule, &h.bob).await?;
    assert_eq!(key, decrypt_original(&h.alice, &capsule)?);
    Ok(())
}
