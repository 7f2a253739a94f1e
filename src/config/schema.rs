//! Configuration schema definitions.
//!
//! Configuration is loaded from multiple sources and merged in order:
//!
//! 1. Embedded defaults (`config/default.toml`)
//! 2. System config: `/etc/mitmwrap/config.toml`
//! 3. User config: `~/.config/mitmwrap/config.toml`
//! 4. Additional config file (via `--config` flag)
//! 5. CLI flags (highest priority)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::netconf::CommandPaths;

/// Embedded default configuration.
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Proxy target and wrapped tool settings.
    #[serde(default)]
    pub proxy: ProxySection,

    /// Locations of the OS tools.
    #[serde(default)]
    pub commands: CommandsSection,
}

impl Config {
    /// Merge another config into this one.
    ///
    /// Scalars are overridden when set in `other`.
    pub fn merge(&mut self, other: Config) {
        self.proxy.merge(other.proxy);
        self.commands.merge(other.commands);
    }

    /// Paths for the network configuration layer.
    pub fn command_paths(&self) -> CommandPaths {
        CommandPaths {
            networksetup: PathBuf::from(&self.commands.networksetup),
            scutil: PathBuf::from(&self.commands.scutil),
        }
    }

    /// Elevation program, or `None` when configured empty.
    pub fn elevation_program(&self) -> Option<PathBuf> {
        if self.commands.sudo.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.commands.sudo))
        }
    }
}

/// `[proxy]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProxySection {
    /// Host the system proxy points at.
    #[serde(default)]
    pub host: String,

    /// Default listening port of the wrapped proxy.
    #[serde(default)]
    pub port: u16,

    /// Console proxy binary (`mitmproxy`).
    #[serde(default)]
    pub binary: String,

    /// Web-UI proxy binary (`mitmweb`).
    #[serde(default)]
    pub web_binary: String,
}

impl ProxySection {
    fn merge(&mut self, other: ProxySection) {
        if !other.host.is_empty() {
            self.host = other.host;
        }
        if other.port != 0 {
            self.port = other.port;
        }
        if !other.binary.is_empty() {
            self.binary = other.binary;
        }
        if !other.web_binary.is_empty() {
            self.web_binary = other.web_binary;
        }
    }
}

/// `[commands]` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CommandsSection {
    /// Elevation program prepended to `networksetup` calls.
    #[serde(default)]
    pub sudo: String,

    /// `networksetup` binary.
    #[serde(default)]
    pub networksetup: String,

    /// `scutil` binary.
    #[serde(default)]
    pub scutil: String,
}

impl CommandsSection {
    fn merge(&mut self, other: CommandsSection) {
        if !other.sudo.is_empty() {
            self.sudo = other.sudo;
        }
        if !other.networksetup.is_empty() {
            self.networksetup = other.networksetup;
        }
        if !other.scutil.is_empty() {
            self.scutil = other.scutil;
        }
    }
}
