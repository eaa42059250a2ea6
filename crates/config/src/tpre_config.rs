// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::load_config::{find_in_parent, resolve_config_path};

pub const DEFAULT_CONFIG_NAME: &str = "tpre.config.yaml";
pub const ENV_PREFIX: &str = "TPRE_";

/// Tunables shared by coordinators and relays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TpreConfig {
    /// How long a single relay may take to answer a work order.
    pub work_order_timeout_ms: u64,
    /// Work orders in flight at once. Defaults to the number of shares.
    pub fan_out: Option<usize>,
    /// Relays staking less than this are never selected.
    pub min_stake: u64,
    pub default_threshold: usize,
    pub default_shares: usize,
    pub policy_duration_secs: u64,
    /// Concurrent re-encryptions per relay.
    pub relay_max_tasks: usize,
    /// Seed for relay sampling. Random per policy when unset.
    pub selection_seed: Option<u64>,
    pub log_level: String,
}

impl Default for TpreConfig {
    fn default() -> Self {
        Self {
            work_order_timeout_ms: 5_000,
            fan_out: None,
            min_stake: 0,
            default_threshold: 3,
            default_shares: 5,
            policy_duration_secs: 24 * 60 * 60,
            relay_max_tasks: 8,
            selection_seed: None,
            log_level: "info".to_string(),
        }
    }
}

impl TpreConfig {
    pub fn work_order_timeout(&self) -> Duration {
        Duration::from_millis(self.work_order_timeout_ms)
    }

    pub fn policy_duration(&self) -> Duration {
        Duration::from_secs(self.policy_duration_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_threshold == 0 || self.default_threshold > self.default_shares {
            bail!(
                "default_threshold must be between 1 and default_shares ({}), got {}",
                self.default_shares,
                self.default_threshold
            );
        }
        if self.work_order_timeout_ms == 0 {
            bail!("work_order_timeout_ms must be positive");
        }
        if self.fan_out == Some(0) {
            bail!("fan_out must be positive when set");
        }
        if self.relay_max_tasks == 0 {
            bail!("relay_max_tasks must be positive");
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

pub struct OsDirs;

impl OsDirs {
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tpre")
    }
}

/// Defaults, then the YAML file, then `TPRE_`-prefixed environment variables.
///
/// An explicitly named file must exist; the discovered or default file is optional.
pub fn load_config(config_file: Option<&Path>) -> Result<TpreConfig> {
    let cwd = env::current_dir()?;
    let path = resolve_config_path(
        find_in_parent,
        &cwd,
        &OsDirs::config_dir(),
        DEFAULT_CONFIG_NAME,
        config_file,
    );

    let mut figment = Figment::from(Serialized::defaults(TpreConfig::default()));
    if path.is_file() {
        debug!(path = %path.display(), "loading configuration");
        figment = figment.merge(Yaml::file(&path));
    } else if config_file.is_some() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("configuration file {} not found", path.display()),
        )
        .into());
    }

    let config: TpreConfig = figment
        .merge(Env::prefixed(ENV_PREFIX))
        .extract()
        .context("Could not parse configuration")?;
    config.validate()?;
    Ok(config)
}
