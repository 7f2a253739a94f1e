//! mitmwrap: run mitmproxy with the macOS system proxy pointed at it.
//!
//! Startup order matters:
//!
//! 1. Parse CLI and configure diagnostic logging (stderr)
//! 2. Load configuration, which names the elevation program
//! 3. Relaunch through `sudo` unless already root
//! 4. Connect audit logging (syslog), degrading to a null logger
//! 5. Either toggle once, or install the interrupt cleanup and run the proxy
//!    inside the bracket
//!
//! Once the proxy tool starts it owns the terminal. mitmwrap only writes to
//! stderr again after it exits, or when an interrupt triggers cleanup.

use std::process::{ExitCode, ExitStatus};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use mitmwrap::{
    bracket::{ProxyController, ProxyTarget},
    cli::Cli,
    config::{Config, ConfigLoader, ProxyConfig},
    lifecycle::{self, CancellationContext},
    netconf::SystemCommandRunner,
    telemetry::{self, AuditEvent, SessionMode},
    wrapper::{self, ProxyProcess},
};
use tracing::{debug, error, info, warn};

type Controller = ProxyController<SystemCommandRunner>;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse_known();

    init_tracing(cli.verbose)?;
    debug!("Parsed CLI arguments: {:?}", cli);

    let config = ConfigLoader::new()
        .load(&cli)
        .context("Failed to load configuration")?;
    debug!("Loaded configuration: {:?}", config);

    lifecycle::ensure_elevated(config.elevation_program().as_deref())
        .context("Failed to acquire administrative privileges")?;

    if let Err(e) = telemetry::init_logger() {
        warn!("Audit logging disabled: {}", e);
    }

    let started = Instant::now();
    let outcome = if cli.toggle {
        run_toggle(&config)
    } else {
        run_wrapped(&cli, &config)
    };

    telemetry::audit().log(AuditEvent::session_end(&outcome, started.elapsed()));
    outcome.map(ExitCode::from)
}

fn run_toggle(config: &Config) -> Result<u8> {
    telemetry::audit().log(AuditEvent::SessionStart {
        user: whoami(),
        mode: SessionMode::Toggle,
        port: None,
    });

    let controller = build_controller(config, &config.proxy.host, config.proxy.port);
    let enabled = controller
        .toggle()
        .context("Failed to toggle system proxy")?;
    info!("System proxy {}", if enabled { "enabled" } else { "disabled" });
    Ok(0)
}

fn run_wrapped(cli: &Cli, config: &Config) -> Result<u8> {
    let port = if cli.port_random {
        let port = wrapper::allocate_ephemeral_port()?;
        println!("Using random port {}...", port);
        port
    } else {
        config.proxy.port
    };

    let proxy_config = ProxyConfig::from_config(config, port, cli.web, cli.extra_args.clone());
    // Resolve the binary before touching any network settings.
    let process = ProxyProcess::from_config(&proxy_config)?;

    telemetry::audit().log(AuditEvent::SessionStart {
        user: whoami(),
        mode: if proxy_config.use_web_variant {
            SessionMode::Web
        } else {
            SessionMode::Console
        },
        port: Some(port),
    });

    let controller = Arc::new(build_controller(config, &proxy_config.host, port));

    let ctx = Arc::new(CancellationContext::new({
        let controller = Arc::clone(&controller);
        move || {
            if let Err(e) = controller.interrupt_cleanup() {
                error!("Interrupt cleanup failed: {}", e);
            }
        }
    }));
    lifecycle::install_interrupt_handler(Arc::clone(&ctx))
        .context("Failed to install interrupt handler")?;

    let status: ExitStatus = controller.run_bracketed(|| {
        let status = process.run();
        ctx.disarm();
        status
    })?;

    Ok(wrapper::exit_code(status))
}

fn build_controller(config: &Config, host: &str, port: u16) -> Controller {
    let runner = SystemCommandRunner::new(config.elevation_program());
    ProxyController::new(runner, config.command_paths(), ProxyTarget::new(host, port))
}

/// Initialize the tracing subscriber for diagnostic logging.
///
/// This is separate from the audit telemetry which goes to syslog.
///
/// # Verbosity Levels
/// - 0 (default): `RUST_LOG`, or warnings and errors
/// - 1 (-v): Info level
/// - 2 (-vv): Debug level
/// - 3+ (-vvv): Trace level
fn init_tracing(verbose: u8) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}

/// The invoking user for audit logging, seen through `sudo`.
fn whoami() -> String {
    std::env::var("SUDO_USER")
        .or_else(|_| std::env::var("USER"))
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
