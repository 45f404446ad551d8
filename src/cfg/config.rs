// SPDX-License-Identifier: AGPL-3.0-or-later

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level process configuration (spec.md §6 "Configuration").
///
/// Loaded once at startup. Mutating the routing table at runtime (via the
/// admin channel) never rewrites this struct or the file it came from.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Address the ingress TCP listener binds to.
    pub listen_addr: String,
    /// Address the admin text control channel binds to.
    pub admin_addr: String,
    /// Default spool directory applied to routes that omit one.
    pub spool_dir: String,
    /// Default `first_only` dispatch mode (spec.md §4.3).
    #[serde(default)]
    pub first_only: bool,
    /// Routing engine tuning knobs.
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Ingress line-framing limits.
    #[serde(default)]
    pub ingress: IngressConfig,
    /// Initial route table, in declaration order.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    /// Telemetry sink configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// One entry of the initial route table (spec.md §3 "Route definition").
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RouteConfig {
    pub key: String,
    #[serde(default)]
    pub pattern: String,
    pub addr: String,
    #[serde(default)]
    pub spool: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RoutingConfig {
    /// Capacity of each route's live-input channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    1000
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct IngressConfig {
    /// Maximum accepted line length, trailing newline included. Longer
    /// lines are discarded as a framing error (spec.md §6).
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

fn default_max_line_bytes() -> usize {
    65536
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub output: TelemetryOutput,
    #[serde(default = "default_level")]
    pub level: String,
    pub file: Option<TelemetryFileConfig>,
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TelemetryFileConfig {
    pub path: String,
    #[serde(default)]
    pub rotation_frequency: Option<RotationFreq>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum RotationFreq {
    Minutely,
    Hourly,
    Daily,
    Never,
}

impl Config {
    /// Loads and parses a YAML config file from disk.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let cfg: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(cfg)
    }
}
