//! Drives the proxy controller against a simulated macOS network stack.

use std::cell::RefCell;
use std::path::Path;

use mitmwrap::bracket::{ProxyController, ProxyTarget};
use mitmwrap::netconf::{CommandPaths, CommandRunner, NetconfError, NetworkService};

#[derive(Debug, Clone, PartialEq, Eq)]
struct SimService {
    id: &'static str,
    name: &'static str,
    device: &'static str,
    connected: bool,
    enabled: bool,
    secure_enabled: bool,
    host: String,
    port: u16,
    report_enabled: bool,
}

impl SimService {
    fn new(id: &'static str, name: &'static str, device: &'static str, enabled: bool) -> Self {
        Self {
            id,
            name,
            device,
            connected: true,
            enabled,
            secure_enabled: enabled,
            host: String::new(),
            port: 0,
            report_enabled: true,
        }
    }
}

/// Answers `scutil` and `networksetup` the way macOS would and applies
/// every mutation to its in-memory service table.
struct SimulatedOs {
    services: RefCell<Vec<SimService>>,
    primary_interface: Option<&'static str>,
    calls: RefCell<Vec<String>>,
    failing: RefCell<Vec<String>>,
}

impl SimulatedOs {
    fn new(services: Vec<SimService>) -> Self {
        Self {
            services: RefCell::new(services),
            primary_interface: Some("en0"),
            calls: RefCell::new(Vec::new()),
            failing: RefCell::new(Vec::new()),
        }
    }

    fn three_services(enabled: bool) -> Self {
        Self::new(vec![
            SimService::new("A1", "Wi-Fi", "en0", enabled),
            SimService::new("B2", "USB 10/100/1000 LAN", "en7", enabled),
            SimService::new("C3", "iPhone USB", "en9", enabled),
        ])
    }

    fn service(&self, name: &str) -> SimService {
        self.services
            .borrow()
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .unwrap()
    }

    fn set_enabled_externally(&self, name: &str, enabled: bool) {
        let mut services = self.services.borrow_mut();
        let service = services.iter_mut().find(|s| s.name == name).unwrap();
        service.enabled = enabled;
        service.secure_enabled = enabled;
    }

    /// Make every networksetup call starting with `prefix` exit non-zero.
    fn fail_calls(&self, prefix: &str) {
        self.failing.borrow_mut().push(prefix.to_string());
    }

    fn calls_matching(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn with_service<T>(&self, name: &str, f: impl FnOnce(&mut SimService) -> T) -> Result<T, NetconfError> {
        let mut services = self.services.borrow_mut();
        match services.iter_mut().find(|s| s.name == name) {
            Some(service) => Ok(f(service)),
            None => Err(NetconfError::ExecutionError {
                cmd: format!("networksetup ... {}", name),
                code: 4,
                stderr: format!("{} is not a recognized network service.", name),
            }),
        }
    }
}

impl CommandRunner for SimulatedOs {
    fn run(&self, argv: &[&str]) -> Result<String, NetconfError> {
        let call = argv[1..].join(" ");
        self.calls.borrow_mut().push(call.clone());
        if self.failing.borrow().iter().any(|prefix| call.starts_with(prefix.as_str())) {
            return Err(NetconfError::ExecutionError {
                cmd: format!("networksetup {}", call),
                code: 4,
                stderr: "** Error: The parameters were not valid.".to_string(),
            });
        }

        match argv[1..] {
            ["-listnetworkserviceorder"] => {
                let mut out =
                    String::from("An asterisk (*) denotes that a network service is disabled.\n");
                for (i, s) in self.services.borrow().iter().enumerate() {
                    out.push_str(&format!(
                        "({}) {}\n(Hardware Port: {}, Device: {})\n\n",
                        i + 1,
                        s.name,
                        s.name,
                        s.device
                    ));
                }
                Ok(out)
            }
            ["-getwebproxy", name] => self.with_service(name, |s| {
                let mut out = String::new();
                if s.report_enabled {
                    out.push_str(if s.enabled { "Enabled: Yes\n" } else { "Enabled: No\n" });
                }
                out.push_str(&format!(
                    "Server: {}\nPort: {}\nAuthenticated Proxy Enabled: 0\n",
                    s.host, s.port
                ));
                out
            }),
            ["-setwebproxy", name, host, port] => self.with_service(name, |s| {
                s.enabled = true;
                s.host = host.to_string();
                s.port = port.parse().unwrap();
                String::new()
            }),
            ["-setsecurewebproxy", name, _, _] => self.with_service(name, |s| {
                s.secure_enabled = true;
                String::new()
            }),
            ["-setwebproxystate", name, "off"] => self.with_service(name, |s| {
                s.enabled = false;
                String::new()
            }),
            ["-setsecurewebproxystate", name, "off"] => self.with_service(name, |s| {
                s.secure_enabled = false;
                String::new()
            }),
            _ => panic!("unexpected networksetup call: {:?}", argv),
        }
    }

    fn run_with_input(&self, _program: &Path, input: &str) -> Result<String, NetconfError> {
        self.calls.borrow_mut().push(format!("scutil {}", input.trim_end()));
        let services = self.services.borrow();

        if input == "list\n" {
            let mut out = String::new();
            for (i, s) in services.iter().filter(|s| s.connected).enumerate() {
                out.push_str(&format!(
                    "  subKey [{}] = State:/Network/Service/{}/IPv4\n",
                    i, s.id
                ));
            }
            return Ok(out);
        }

        if input == "get State:/Network/Global/IPv4\nd.show\n" {
            return Ok(match self.primary_interface {
                Some(dev) => format!("<dictionary> {{\n  PrimaryInterface : {}\n}}\n", dev),
                None => "  No such key\n".to_string(),
            });
        }

        if let Some(id) = input
            .strip_prefix("show Setup:/Network/Service/")
            .map(str::trim_end)
        {
            return Ok(services
                .iter()
                .find(|s| s.id == id)
                .map(|s| format!("<dictionary> {{\n  UserDefinedName : {}\n}}\n", s.name))
                .unwrap_or_else(|| "  No such key\n".to_string()));
        }

        panic!("unexpected scutil script: {:?}", input)
    }
}

fn controller(os: &SimulatedOs) -> ProxyController<&SimulatedOs> {
    ProxyController::new(os, CommandPaths::default(), ProxyTarget::new("127.0.0.1", 8080))
}

fn proxy_table(os: &SimulatedOs) -> Vec<(String, bool, bool, String, u16)> {
    os.services
        .borrow()
        .iter()
        .map(|s| (s.name.to_string(), s.enabled, s.secure_enabled, s.host.clone(), s.port))
        .collect()
}

#[test]
fn test_toggle_off_disables_every_connected_service() {
    let os = SimulatedOs::three_services(true);

    let enabled = controller(&os).toggle().unwrap();

    assert!(!enabled);
    assert_eq!(os.calls_matching("-setwebproxystate"), 3);
    assert_eq!(os.calls_matching("-setsecurewebproxystate"), 3);
    assert_eq!(os.calls_matching("-setwebproxy "), 0);
    assert_eq!(os.calls_matching("-setsecurewebproxy "), 0);
    assert!(proxy_table(&os).iter().all(|(_, on, secure, _, _)| !on && !secure));
}

#[test]
fn test_toggle_on_points_services_at_target() {
    let os = SimulatedOs::three_services(false);

    let enabled = controller(&os).toggle().unwrap();

    assert!(enabled);
    for (name, on, secure, host, port) in proxy_table(&os) {
        assert!(on && secure, "{} should be enabled", name);
        assert_eq!(host, "127.0.0.1");
        assert_eq!(port, 8080);
    }
}

#[test]
fn test_toggle_only_touches_disagreeing_services() {
    let os = SimulatedOs::three_services(false);
    os.set_enabled_externally("iPhone USB", true);

    controller(&os).toggle().unwrap();

    assert_eq!(os.calls_matching("-setwebproxy "), 2);
    assert_eq!(os.calls_matching("-setwebproxy iPhone USB"), 0);
}

#[test]
fn test_bracket_enables_during_and_disables_after() {
    let os = SimulatedOs::three_services(false);
    let controller = controller(&os);

    let seen: Result<usize, NetconfError> = controller.run_bracketed(|| {
        Ok(proxy_table(&os).iter().filter(|(_, on, _, _, _)| *on).count())
    });

    assert_eq!(seen.unwrap(), 3);
    assert!(proxy_table(&os).iter().all(|(_, on, _, _, _)| !on));
}

#[test]
fn test_guarded_error_is_returned_after_cleanup() {
    let os = SimulatedOs::three_services(false);
    let controller = controller(&os);

    let err = controller
        .run_bracketed(|| -> anyhow::Result<()> { anyhow::bail!("proxy crashed") })
        .unwrap_err();

    assert_eq!(err.to_string(), "proxy crashed");
    assert_eq!(os.calls_matching("-setwebproxystate"), 3);
    assert!(proxy_table(&os).iter().all(|(_, on, _, _, _)| !on));
}

#[test]
fn test_bracket_is_idempotent() {
    let once = SimulatedOs::three_services(false);
    let twice = SimulatedOs::three_services(false);

    let ok = || -> Result<(), NetconfError> { Ok(()) };
    controller(&once).run_bracketed(ok).unwrap();
    controller(&twice).run_bracketed(ok).unwrap();
    controller(&twice).run_bracketed(ok).unwrap();

    assert_eq!(proxy_table(&once), proxy_table(&twice));
}

#[test]
fn test_service_disabled_during_run_is_not_disabled_again() {
    let os = SimulatedOs::three_services(false);
    let controller = controller(&os);

    controller
        .run_bracketed(|| -> Result<(), NetconfError> {
            os.set_enabled_externally("USB 10/100/1000 LAN", false);
            Ok(())
        })
        .unwrap();

    assert_eq!(os.calls_matching("-setwebproxystate USB 10/100/1000 LAN"), 0);
    assert_eq!(os.calls_matching("-setwebproxystate Wi-Fi"), 1);
    assert!(!os.service("Wi-Fi").enabled);
}

#[test]
fn test_disconnected_service_is_left_alone() {
    let os = SimulatedOs::three_services(false);
    os.services.borrow_mut()[2].connected = false;

    controller(&os)
        .run_bracketed(|| -> Result<(), NetconfError> { Ok(()) })
        .unwrap();

    assert_eq!(os.calls_matching("-getwebproxy iPhone USB"), 0);
    assert_eq!(os.calls_matching("-setwebproxy iPhone USB"), 0);
}

#[test]
fn test_missing_enabled_field_is_parse_error() {
    let os = SimulatedOs::three_services(true);
    os.services.borrow_mut()[0].report_enabled = false;

    let err = controller(&os)
        .accessor()
        .get_state(&NetworkService::new("Wi-Fi"))
        .unwrap_err();

    assert!(matches!(err, NetconfError::Parse { .. }));
}

#[test]
fn test_toggle_without_primary_interface_is_not_found() {
    let mut os = SimulatedOs::three_services(true);
    os.primary_interface = None;

    let err = controller(&os).toggle().unwrap_err();

    assert!(matches!(err, NetconfError::NotFound(_)));
    assert_eq!(os.calls_matching("-set"), 0);
}

#[test]
fn test_toggle_with_unmapped_primary_interface_is_not_found() {
    let mut os = SimulatedOs::three_services(true);
    os.primary_interface = Some("utun4");

    let err = controller(&os).toggle().unwrap_err();
    assert!(matches!(err, NetconfError::NotFound(_)));
}

#[test]
fn test_primary_service_resolved_through_device() {
    let os = SimulatedOs::three_services(false);
    let directory = controller(&os).directory().primary_service_name().unwrap();
    assert_eq!(directory, "Wi-Fi");
}

#[test]
fn test_service_enabled_before_entry_is_off_after_exit() {
    let os = SimulatedOs::three_services(false);
    os.set_enabled_externally("iPhone USB", true);

    let controller = controller(&os);
    let entered = controller.enter().unwrap();
    assert_eq!(entered.enabled_on_entry(), ["Wi-Fi", "USB 10/100/1000 LAN"]);
    entered.release().unwrap();

    assert!(!os.service("iPhone USB").enabled);
}

#[test]
fn test_panicking_guarded_work_still_restores() {
    let os = SimulatedOs::three_services(false);
    let controller = controller(&os);

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = controller.run_bracketed(|| -> Result<(), NetconfError> { panic!("boom") });
    }));

    assert!(outcome.is_err());
    assert!(proxy_table(&os).iter().all(|(_, on, _, _, _)| !on));
}

#[test]
fn test_exit_failure_after_successful_work_is_returned() {
    let os = SimulatedOs::three_services(false);
    let controller = controller(&os);

    let err = controller
        .run_bracketed(|| -> Result<(), NetconfError> {
            os.fail_calls("-setwebproxystate Wi-Fi");
            Ok(())
        })
        .unwrap_err();

    assert!(err.is_execution());
    assert!(err.to_string().contains("-setwebproxystate Wi-Fi"));
    // The remaining services are still restored, and nothing is retried.
    assert_eq!(os.calls_matching("-setwebproxystate Wi-Fi"), 1);
    assert_eq!(os.calls_matching("-setsecurewebproxystate"), 3);
    assert!(!os.service("USB 10/100/1000 LAN").enabled);
    assert!(!os.service("iPhone USB").enabled);
}

#[test]
fn test_guarded_error_wins_over_exit_failure() {
    let os = SimulatedOs::three_services(false);
    let controller = controller(&os);

    let err = controller
        .run_bracketed(|| -> anyhow::Result<()> {
            os.fail_calls("-getwebproxy USB 10/100/1000 LAN");
            anyhow::bail!("proxy crashed")
        })
        .unwrap_err();

    assert_eq!(err.to_string(), "proxy crashed");
    assert!(err.downcast_ref::<NetconfError>().is_none());
    assert_eq!(os.calls_matching("-setwebproxystate USB 10/100/1000 LAN"), 0);
    assert_eq!(os.calls_matching("-setwebproxystate Wi-Fi"), 1);
    assert_eq!(os.calls_matching("-setwebproxystate iPhone USB"), 1);
}

#[test]
fn test_failed_release_does_not_restore_again_on_drop() {
    let os = SimulatedOs::three_services(false);
    let controller = controller(&os);

    let session = controller.enter().unwrap();
    os.fail_calls("-setwebproxystate");
    let calls_before = os.calls.borrow().len();

    assert!(session.release().is_err());

    // One query and one disable pair per service, then nothing from Drop.
    assert_eq!(os.calls.borrow().len() - calls_before, 9);
    assert_eq!(os.calls_matching("-setwebproxystate"), 3);
}
