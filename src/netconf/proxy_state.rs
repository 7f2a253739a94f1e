//! Per-service web proxy state.
//!
//! The plain (HTTP) and secure (HTTPS) web proxies are configured as a pair.
//! State is read from the plain proxy only; writes always touch both.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::error::NetconfError;
use super::runner::{CommandPaths, CommandRunner};
use super::services::NetworkService;

/// Proxy configuration of one service, as last reported by the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyState {
    /// Whether the web proxy is on.
    pub enabled: bool,
    /// Proxy server host (empty when unset).
    pub host: String,
    /// Proxy server port (0 when unset).
    pub port: u16,
}

/// Reads and writes web proxy settings through `networksetup`.
pub struct ProxyStateAccessor<'a, R> {
    runner: &'a R,
    paths: &'a CommandPaths,
}

impl<'a, R: CommandRunner> ProxyStateAccessor<'a, R> {
    /// Create an accessor backed by `runner`.
    pub fn new(runner: &'a R, paths: &'a CommandPaths) -> Self {
        Self { runner, paths }
    }

    /// Query the current state. Never cached.
    ///
    /// # Errors
    ///
    /// `ParseError` if the output has no `Enabled` line.
    pub fn get_state(&self, service: &NetworkService) -> Result<ProxyState, NetconfError> {
        let networksetup = self.paths.networksetup.to_string_lossy();
        let output = self
            .runner
            .run(&[&*networksetup, "-getwebproxy", service.name.as_str()])?;

        parse_proxy_state(&output).ok_or_else(|| NetconfError::Parse {
            cmd: format!("networksetup -getwebproxy {}", service.name),
            expected: "Enabled".to_string(),
        })
    }

    /// Turn both web proxies on (pointing at `host:port`) or off.
    ///
    /// Both commands are issued even if the first fails; the first error is
    /// returned afterwards.
    pub fn set_enabled(
        &self,
        service: &NetworkService,
        enabled: bool,
        host: &str,
        port: u16,
    ) -> Result<(), NetconfError> {
        let networksetup = self.paths.networksetup.to_string_lossy();
        let port = port.to_string();

        let commands: [Vec<&str>; 2] = if enabled {
            info!("Enabling proxy on {} -> {}:{}", service, host, port);
            [
                vec![&*networksetup, "-setwebproxy", service.name.as_str(), host, port.as_str()],
                vec![&*networksetup, "-setsecurewebproxy", service.name.as_str(), host, port.as_str()],
            ]
        } else {
            info!("Disabling proxy on {}", service);
            [
                vec![&*networksetup, "-setwebproxystate", service.name.as_str(), "off"],
                vec![&*networksetup, "-setsecurewebproxystate", service.name.as_str(), "off"],
            ]
        };

        let mut first_error = None;
        for argv in &commands {
            if let Err(e) = self.runner.run(argv) {
                warn!("{} failed for {}: {}", argv[1], service.name, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Parse `networksetup -getwebproxy` output.
///
/// Returns `None` when the `Enabled` key is absent. Unknown keys and lines
/// that are not `Key: Value` are ignored.
pub fn parse_proxy_state(output: &str) -> Option<ProxyState> {
    let fields = parse_fields(output);
    let enabled = fields.get("Enabled")?;

    let state = ProxyState {
        enabled: enabled.eq_ignore_ascii_case("yes"),
        host: fields.get("Server").cloned().unwrap_or_default(),
        port: fields
            .get("Port")
            .and_then(|p| p.parse().ok())
            .unwrap_or_default(),
    };
    debug!("Parsed proxy state: {:?}", state);
    Some(state)
}

fn parse_fields(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}
