// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host configuration loaded from TOML.

use crate::AdapterError;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level host configuration.
///
/// ```toml
/// [[listen]]
/// address = "127.0.0.1:8080"
/// pipeline = "inbound"
///
/// [[task]]
/// pipeline = "tick"
/// period_ms = 5000
///
/// [[watch]]
/// path = "config/routes.json"
/// pipeline = "reload"
/// period_ms = 1000
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub listen: Vec<ListenConfig>,
    #[serde(default)]
    pub task: Vec<TaskConfig>,
    #[serde(default)]
    pub watch: Vec<WatchConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    pub address: String,
    /// Named layout handling each accepted connection.
    pub pipeline: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub pipeline: String,
    /// Absent means "fire once".
    #[serde(default)]
    pub period_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    pub path: PathBuf,
    pub pipeline: String,
    #[serde(default = "default_watch_period")]
    pub period_ms: u64,
}

fn default_watch_period() -> u64 {
    1000
}

impl HostConfig {
    pub fn from_toml(text: &str) -> Result<Self, AdapterError> {
        toml::from_str(text).map_err(|e| AdapterError::Config(e.to_string()))
    }

    pub fn load(path: &std::path::Path) -> Result<Self, AdapterError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }
}

impl TaskConfig {
    pub fn period(&self) -> Option<Duration> {
        self.period_ms.map(Duration::from_millis)
    }
}

impl WatchConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
