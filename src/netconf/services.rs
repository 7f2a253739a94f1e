//! Network service discovery.
//!
//! macOS keeps two independent identifier spaces: the configuration database
//! (`scutil`) knows services by opaque IDs and user-visible names, while the
//! routing table speaks in interface names (`en0`). Resolving the primary
//! service joins the primary interface against the `networksetup` service
//! order listing; services present in only one listing are skipped.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::error::NetconfError;
use super::runner::{CommandPaths, CommandRunner};

static CONNECTED_SERVICE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"State:/Network/Service/([^/\s]+)/IPv4").expect("static regex")
});

static USER_DEFINED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"UserDefinedName\s*:\s*(.+)").expect("static regex"));

static PRIMARY_INTERFACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"PrimaryInterface\s*:\s*(.+)").expect("static regex"));

static SERVICE_ORDER_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\(\d+\)\s(.*)$\n\(.*Device: (.+)\)$").expect("static regex")
});

/// A named network configuration entry (Wi-Fi, Ethernet, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkService {
    /// User-visible service name, as `networksetup` expects it.
    pub name: String,
    /// Interface backing the service, when known.
    pub device: Option<String>,
}

impl NetworkService {
    /// A service known only by name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device: None,
        }
    }

    /// A service with its backing interface.
    pub fn with_device(name: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device: Some(device.into()),
        }
    }
}

impl fmt::Display for NetworkService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.device {
            Some(device) => write!(f, "{} ({})", self.name, device),
            None => f.write_str(&self.name),
        }
    }
}

/// Queries for the set of network services and the primary one.
pub struct ServiceDirectory<'a, R> {
    runner: &'a R,
    paths: &'a CommandPaths,
}

impl<'a, R: CommandRunner> ServiceDirectory<'a, R> {
    /// Create a directory backed by `runner`.
    pub fn new(runner: &'a R, paths: &'a CommandPaths) -> Self {
        Self { runner, paths }
    }

    /// Services that currently hold an IPv4 configuration.
    ///
    /// # Errors
    ///
    /// `ParseError` when a service's setup entry has no `UserDefinedName`.
    pub fn list_connected_services(&self) -> Result<Vec<NetworkService>, NetconfError> {
        let listing = self.scutil("list\n")?;
        let ids = parse_connected_service_ids(&listing);
        debug!("Connected service IDs: {:?}", ids);

        let mut services = Vec::with_capacity(ids.len());
        for id in ids {
            let script = format!("show Setup:/Network/Service/{}\n", id);
            let setup = self.scutil(&script)?;
            let name = parse_user_defined_name(&setup).ok_or_else(|| NetconfError::Parse {
                cmd: format!("scutil: show Setup:/Network/Service/{}", id),
                expected: "UserDefinedName".to_string(),
            })?;
            services.push(NetworkService::new(name));
        }

        Ok(services)
    }

    /// All configured services in priority order, with their devices.
    pub fn configured_services(&self) -> Result<Vec<NetworkService>, NetconfError> {
        let networksetup = self.paths.networksetup.to_string_lossy();
        let order = self
            .runner
            .run(&[&*networksetup, "-listnetworkserviceorder"])?;
        Ok(parse_service_order(&order))
    }

    /// Interface currently carrying the default route.
    ///
    /// # Errors
    ///
    /// `NotFound` when the OS reports no primary interface (offline).
    pub fn primary_interface(&self) -> Result<String, NetconfError> {
        let state = self.scutil("get State:/Network/Global/IPv4\nd.show\n")?;
        parse_primary_interface(&state)
            .ok_or_else(|| NetconfError::NotFound("no primary network interface is set".to_string()))
    }

    /// Name of the service backing the primary interface.
    ///
    /// # Errors
    ///
    /// `NotFound` when there is no primary interface or no configured
    /// service uses it.
    pub fn primary_service_name(&self) -> Result<String, NetconfError> {
        let interface = self.primary_interface()?;
        let services = self.configured_services()?;

        resolve_service_for_interface(&services, &interface)
            .map(|service| service.name.clone())
            .ok_or_else(|| {
                NetconfError::NotFound(format!("no network service uses interface {}", interface))
            })
    }

    fn scutil(&self, script: &str) -> Result<String, NetconfError> {
        self.runner.run_with_input(&self.paths.scutil, script)
    }
}

/// Extract service IDs from `scutil list` output, in order, without repeats.
pub fn parse_connected_service_ids(output: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for caps in CONNECTED_SERVICE_ID.captures_iter(output) {
        let id = &caps[1];
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

/// Extract `UserDefinedName` from a `scutil show Setup:/...` dictionary.
pub fn parse_user_defined_name(output: &str) -> Option<String> {
    first_capture(&USER_DEFINED_NAME, output)
}

/// Extract `PrimaryInterface` from the global IPv4 state dictionary.
pub fn parse_primary_interface(output: &str) -> Option<String> {
    first_capture(&PRIMARY_INTERFACE, output)
}

/// Parse `networksetup -listnetworkserviceorder`.
///
/// Disabled services (`(*)`) and services without a device are left out.
pub fn parse_service_order(output: &str) -> Vec<NetworkService> {
    SERVICE_ORDER_ENTRY
        .captures_iter(output)
        .map(|caps| NetworkService::with_device(caps[1].trim(), caps[2].trim()))
        .collect()
}

/// Highest-priority service whose device is `interface`.
pub fn resolve_service_for_interface<'s>(
    services: &'s [NetworkService],
    interface: &str,
) -> Option<&'s NetworkService> {
    services
        .iter()
        .find(|service| service.device.as_deref() == Some(interface))
}

fn first_capture(re: &Regex, output: &str) -> Option<String> {
    re.captures(output)
        .map(|caps| caps[1].trim().to_string())
        .filter(|value| !value.is_empty())
}
