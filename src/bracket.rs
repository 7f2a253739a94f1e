//! Enable-before / disable-after handling of the system proxy.
//!
//! [`ProxyController::run_bracketed`] points every connected service at the
//! proxy target, runs a block of work, and turns the proxy back off whatever
//! way the work ends. [`ProxyController::toggle`] flips every connected
//! service to the opposite of the primary service's current state.
//!
//! Exit never trusts what entry recorded: each snapshotted service is
//! re-queried and only the ones enabled *now* are disabled. This is what
//! makes the bracket safe to combine with a concurrent interrupt cleanup or
//! with the user changing settings while the proxy runs.

use tracing::{debug, info, warn};

use crate::netconf::{
    CommandPaths, CommandRunner, NetconfError, NetworkService, ProxyState, ProxyStateAccessor,
    ServiceDirectory,
};
use crate::telemetry::{self, AuditEvent};

/// Address the system proxy is pointed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    /// Proxy host.
    pub host: String,
    /// Proxy port.
    pub port: u16,
}

impl ProxyTarget {
    /// Create a target.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Drives proxy state for all connected services.
pub struct ProxyController<R> {
    runner: R,
    paths: CommandPaths,
    target: ProxyTarget,
}

impl<R: CommandRunner> ProxyController<R> {
    /// Create a controller that points services at `target`.
    pub fn new(runner: R, paths: CommandPaths, target: ProxyTarget) -> Self {
        Self {
            runner,
            paths,
            target,
        }
    }

    /// The configured proxy target.
    pub fn target(&self) -> &ProxyTarget {
        &self.target
    }

    /// The underlying command runner.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Service discovery over this controller's runner.
    pub fn directory(&self) -> ServiceDirectory<'_, R> {
        ServiceDirectory::new(&self.runner, &self.paths)
    }

    /// Proxy state access over this controller's runner.
    pub fn accessor(&self) -> ProxyStateAccessor<'_, R> {
        ProxyStateAccessor::new(&self.runner, &self.paths)
    }

    /// Snapshot connected services and enable the proxy where it is off.
    ///
    /// If enabling fails part way, the returned error is produced after the
    /// partially entered session has been restored.
    pub fn enter(&self) -> Result<BracketSession<'_, R>, NetconfError> {
        let accessor = self.accessor();
        let services = self.directory().list_connected_services()?;

        let mut snapshot = Vec::with_capacity(services.len());
        for service in services {
            let state = accessor.get_state(&service)?;
            snapshot.push((service, state));
        }
        debug!("Bracket snapshot: {:?}", snapshot);

        let mut session = BracketSession {
            controller: self,
            snapshot,
            enabled_on_entry: Vec::new(),
            released: false,
        };

        for (service, state) in &session.snapshot {
            if state.enabled {
                debug!("Proxy already enabled on {}", service);
                continue;
            }
            self.apply(service, true)?;
            session.enabled_on_entry.push(service.name.clone());
        }

        Ok(session)
    }

    /// Run `guarded` with the proxy enabled on every connected service.
    ///
    /// The guarded error wins over a cleanup error, which is then only
    /// logged. A cleanup error is returned when `guarded` succeeded.
    pub fn run_bracketed<T, E, F>(&self, guarded: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<NetconfError>,
    {
        let session = self.enter()?;
        let result = guarded();
        let cleanup = session.release();

        match (result, cleanup) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(cleanup_err)) => {
                warn!("Failed to restore proxy settings: {}", cleanup_err);
                Err(e)
            }
        }
    }

    /// Flip every connected service to the opposite of the primary
    /// service's current state. Returns the new state.
    pub fn toggle(&self) -> Result<bool, NetconfError> {
        let directory = self.directory();
        let accessor = self.accessor();

        let primary = NetworkService::new(directory.primary_service_name()?);
        let enable = !accessor.get_state(&primary)?.enabled;
        info!(
            "Primary service {} -> turning proxy {}",
            primary,
            if enable { "on" } else { "off" }
        );

        for service in directory.list_connected_services()? {
            let state = accessor.get_state(&service)?;
            if state.enabled == enable {
                debug!("{} already in target state", service);
                continue;
            }
            self.apply(&service, enable)?;
        }

        Ok(enable)
    }

    /// Cleanup run when an interrupt arrives while the proxy is up.
    ///
    /// Re-derives state through [`toggle`](Self::toggle) rather than using
    /// any bracket snapshot. Returns the state the services were left in.
    pub fn interrupt_cleanup(&self) -> Result<bool, NetconfError> {
        warn!("Cleaning up proxy settings...");
        telemetry::audit().log(AuditEvent::InterruptCleanup);
        let enabled = self.toggle()?;
        info!(
            "Interrupt cleanup left system proxy {}",
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(enabled)
    }

    fn apply(&self, service: &NetworkService, enable: bool) -> Result<(), NetconfError> {
        self.accessor()
            .set_enabled(service, enable, &self.target.host, self.target.port)?;

        let event = if enable {
            AuditEvent::ProxyEnabled {
                service: service.name.clone(),
                host: self.target.host.clone(),
                port: self.target.port,
            }
        } else {
            AuditEvent::ProxyDisabled {
                service: service.name.clone(),
            }
        };
        telemetry::audit().log(event);
        Ok(())
    }
}

/// An entered bracket. Restores on [`release`](Self::release) or on drop.
pub struct BracketSession<'c, R: CommandRunner> {
    controller: &'c ProxyController<R>,
    snapshot: Vec<(NetworkService, ProxyState)>,
    enabled_on_entry: Vec<String>,
    released: bool,
}

impl<R: CommandRunner> BracketSession<'_, R> {
    /// Services and their states as seen before entry.
    pub fn snapshot(&self) -> &[(NetworkService, ProxyState)] {
        &self.snapshot
    }

    /// Names of the services this session turned on.
    pub fn enabled_on_entry(&self) -> &[String] {
        &self.enabled_on_entry
    }

    /// Run the exit phase now and report its outcome.
    pub fn release(mut self) -> Result<(), NetconfError> {
        self.released = true;
        self.restore()
    }

    /// Disable every snapshotted service that is enabled right now.
    ///
    /// All services are attempted; the first failure is returned.
    fn restore(&self) -> Result<(), NetconfError> {
        let accessor = self.controller.accessor();
        let mut first_error = None;

        for (service, _) in &self.snapshot {
            let outcome = accessor.get_state(service).and_then(|current| {
                if current.enabled {
                    self.controller.apply(service, false)
                } else {
                    debug!("Proxy already off on {}", service);
                    Ok(())
                }
            });
            if let Err(e) = outcome {
                warn!("Failed to restore {}: {}", service, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<R: CommandRunner> Drop for BracketSession<'_, R> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        debug!("Bracket dropped without release, restoring");
        if let Err(e) = self.restore() {
            warn!("Failed to restore proxy settings: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::Path;

    /// One service "Wi-Fi" on en0 whose state lives in a cell.
    struct SingleService {
        enabled: RefCell<bool>,
        fail_enable: bool,
        calls: RefCell<Vec<String>>,
    }

    impl SingleService {
        fn new(enabled: bool) -> Self {
            Self {
                enabled: RefCell::new(enabled),
                fail_enable: false,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl CommandRunner for SingleService {
        fn run(&self, argv: &[&str]) -> Result<String, NetconfError> {
            self.calls.borrow_mut().push(argv[1..].join(" "));
            match argv[1] {
                "-getwebproxy" => {
                    let enabled = if *self.enabled.borrow() { "Yes" } else { "No" };
                    Ok(format!("Enabled: {}\nServer: \nPort: 0\n", enabled))
                }
                "-setwebproxy" | "-setsecurewebproxy" if self.fail_enable => {
                    Err(NetconfError::ExecutionError {
                        cmd: argv.join(" "),
                        code: 1,
                        stderr: "denied".to_string(),
                    })
                }
                "-setwebproxy" => {
                    *self.enabled.borrow_mut() = true;
                    Ok(String::new())
                }
                "-listnetworkserviceorder" => Ok(
                    "(1) Wi-Fi\n(Hardware Port: Wi-Fi, Device: en0)\n".to_string(),
                ),
                "-setwebproxystate" => {
                    *self.enabled.borrow_mut() = false;
                    Ok(String::new())
                }
                _ => Ok(String::new()),
            }
        }

        fn run_with_input(&self, _program: &Path, input: &str) -> Result<String, NetconfError> {
            let replies = HashMap::from([
                ("list\n", "subKey [0] = State:/Network/Service/ABC/IPv4\n"),
                ("show Setup:/Network/Service/ABC\n", "UserDefinedName : Wi-Fi\n"),
                ("get State:/Network/Global/IPv4\nd.show\n", "PrimaryInterface : en0\n"),
            ]);
            Ok(replies.get(input).copied().unwrap_or("").to_string())
        }
    }

    fn controller(os: &SingleService) -> ProxyController<&SingleService> {
        ProxyController::new(os, CommandPaths::default(), ProxyTarget::new("127.0.0.1", 8080))
    }

    #[test]
    fn test_enter_records_services_it_enabled() {
        let os = SingleService::new(false);
        let controller = controller(&os);

        let session = controller.enter().unwrap();
        assert_eq!(session.enabled_on_entry(), ["Wi-Fi"]);
        assert!(!session.snapshot()[0].1.enabled);
        assert!(*os.enabled.borrow());

        session.release().unwrap();
        assert!(!*os.enabled.borrow());
    }

    #[test]
    fn test_drop_restores() {
        let os = SingleService::new(false);
        let controller = controller(&os);

        {
            let _session = controller.enter().unwrap();
            assert!(*os.enabled.borrow());
        }

        assert!(!*os.enabled.borrow());
    }

    #[test]
    fn test_failed_entry_still_runs_exit_phase() {
        let mut os = SingleService::new(false);
        os.fail_enable = true;
        let controller = controller(&os);

        let err = controller.enter().err().unwrap();
        assert!(err.is_execution());

        // Exit phase re-queried the service after the failed enable.
        let calls = os.calls.borrow();
        assert_eq!(calls.last().map(String::as_str), Some("-getwebproxy Wi-Fi"));
    }

    #[test]
    fn test_guarded_value_is_returned() {
        let os = SingleService::new(false);
        let controller = controller(&os);

        let value: Result<u32, NetconfError> = controller.run_bracketed(|| {
            assert!(*os.enabled.borrow());
            Ok(7)
        });

        assert_eq!(value.unwrap(), 7);
        assert!(!*os.enabled.borrow());
    }

    #[test]
    fn test_interrupt_cleanup_turns_enabled_proxy_off() {
        let os = SingleService::new(true);
        let controller = controller(&os);

        assert!(!controller.interrupt_cleanup().unwrap());
        assert!(!*os.enabled.borrow());
        assert!(os.calls.borrow().iter().any(|c| c == "-setwebproxystate Wi-Fi off"));
    }
}
