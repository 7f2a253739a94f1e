//! The wrapped proxy process.

use std::net::TcpListener;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::ProxyConfig;

/// Pick a free TCP port on the loopback interface.
///
/// The listener is closed before returning so the wrapped tool can bind the
/// port. Another process may grab it in between.
pub fn allocate_ephemeral_port() -> Result<u16> {
    let listener =
        TcpListener::bind(("127.0.0.1", 0)).context("Failed to bind an ephemeral port")?;
    let port = listener
        .local_addr()
        .context("Failed to read ephemeral port")?
        .port();
    drop(listener);
    debug!("Allocated ephemeral port {}", port);
    Ok(port)
}

/// Resolve a tool binary the way a shell would.
pub fn resolve_binary(binary: &str) -> Result<PathBuf> {
    let path = PathBuf::from(binary);
    if path.is_absolute() {
        if path.exists() {
            Ok(path)
        } else {
            anyhow::bail!("Proxy binary not found: {:?}", path)
        }
    } else {
        which::which(binary).with_context(|| format!("'{}' not found in PATH", binary))
    }
}

/// A ready-to-run invocation of the proxy tool.
#[derive(Debug, Clone)]
pub struct ProxyProcess {
    program: PathBuf,
    args: Vec<String>,
}

impl ProxyProcess {
    /// `<binary> -p <port> <extra args...>` with the binary resolved.
    pub fn from_config(config: &ProxyConfig) -> Result<Self> {
        let program = resolve_binary(&config.binary)?;
        let mut args = vec!["-p".to_string(), config.port.to_string()];
        args.extend(config.extra_args.iter().cloned());
        Ok(Self { program, args })
    }

    /// Full command line, for logging.
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Run in the foreground with inherited stdio and wait for it.
    pub fn run(&self) -> Result<ExitStatus> {
        info!("Starting {}", self.command_line());
        let status = Command::new(&self.program)
            .args(&self.args)
            .status()
            .with_context(|| format!("Failed to start {:?}", self.program))?;
        debug!("Proxy exited with {}", status);
        Ok(status)
    }
}

/// Shell-style exit code: the code itself, or 128 + signal.
pub fn exit_code(status: ExitStatus) -> u8 {
    match (status.code(), status.signal()) {
        (Some(code), _) => (code & 0xff) as u8,
        (None, Some(signal)) => (128 + signal).clamp(0, 255) as u8,
        (None, None) => 1,
    }
}
