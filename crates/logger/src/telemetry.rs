// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use std::str::FromStr;

use anyhow::{Context, Result};
use tpre_config::TpreConfig;
use tracing::Level;
use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

pub fn setup_simple_tracing(log_level: Level) -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(LevelFilter::from_level(log_level))
        .try_init()
        .context("A global subscriber is already installed")?;
    Ok(())
}

/// Install a subscriber driven by an `EnvFilter` directive such as `info,tpre_relay=debug`.
pub fn setup_env_tracing(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(filter).context("Invalid tracing filter")?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .try_init()
        .context("A global subscriber is already installed")?;
    Ok(())
}

/// `log_level` is either a plain level or a full filter directive.
pub fn setup_tracing(config: &TpreConfig) -> Result<()> {
    match parse_level(&config.log_level) {
        Some(level) => setup_simple_tracing(level),
        None => setup_env_tracing(&config.log_level),
    }
}

pub fn parse_level(value: &str) -> Option<Level> {
    Level::from_str(value.trim()).ok()
}
