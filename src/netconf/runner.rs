//! Execution of OS network configuration commands.
//!
//! `networksetup` mutations need administrative privilege and are run through
//! the configured elevation program (`sudo` by default). `scutil` reads its
//! commands from standard input instead of argv, so it gets its own entry
//! point.
//!
//! Nothing here retries or times out. A hung OS command blocks the caller.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tracing::{debug, trace};

use super::error::NetconfError;

/// Default location of `networksetup` on macOS.
pub const DEFAULT_NETWORKSETUP: &str = "/usr/sbin/networksetup";

/// Default location of `scutil` on macOS.
pub const DEFAULT_SCUTIL: &str = "/usr/sbin/scutil";

/// Default elevation program.
pub const DEFAULT_SUDO: &str = "/usr/bin/sudo";

/// Narrow boundary between the proxy logic and the operating system.
///
/// All text parsing happens above this trait, so tests can substitute a
/// scripted implementation without spawning processes.
pub trait CommandRunner {
    /// Run `argv` with elevated privilege and return its standard output.
    fn run(&self, argv: &[&str]) -> Result<String, NetconfError>;

    /// Run `program`, feed `input` to its standard input, and return its
    /// standard output.
    fn run_with_input(&self, program: &Path, input: &str) -> Result<String, NetconfError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, argv: &[&str]) -> Result<String, NetconfError> {
        (**self).run(argv)
    }

    fn run_with_input(&self, program: &Path, input: &str) -> Result<String, NetconfError> {
        (**self).run_with_input(program, input)
    }
}

/// Locations of the OS tools the directory and accessor drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPaths {
    /// `networksetup` binary.
    pub networksetup: PathBuf,
    /// `scutil` binary.
    pub scutil: PathBuf,
}

impl Default for CommandPaths {
    fn default() -> Self {
        Self {
            networksetup: PathBuf::from(DEFAULT_NETWORKSETUP),
            scutil: PathBuf::from(DEFAULT_SCUTIL),
        }
    }
}

/// Runs commands as real child processes.
#[derive(Debug, Clone)]
pub struct SystemCommandRunner {
    /// Program prepended to every `run` invocation. `None` runs directly.
    elevate_with: Option<PathBuf>,
}

impl SystemCommandRunner {
    /// Create a runner that elevates through `elevate_with`.
    pub fn new(elevate_with: Option<PathBuf>) -> Self {
        Self { elevate_with }
    }

    fn build(&self, argv: &[&str]) -> Result<(Command, String), NetconfError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(NetconfError::ExecutionFailed {
                cmd: String::new(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            });
        };

        let (cmd, cmd_str) = match &self.elevate_with {
            Some(elevate) => {
                let mut cmd = Command::new(elevate);
                cmd.arg(program).args(args);
                (cmd, format!("{} {}", elevate.display(), argv.join(" ")))
            }
            None => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                (cmd, argv.join(" "))
            }
        };
        Ok((cmd, cmd_str))
    }
}

impl Default for SystemCommandRunner {
    fn default() -> Self {
        Self::new(Some(PathBuf::from(DEFAULT_SUDO)))
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run(&self, argv: &[&str]) -> Result<String, NetconfError> {
        let (mut cmd, cmd_str) = self.build(argv)?;
        debug!("Running: {}", cmd_str);

        let output = cmd
            .stdin(Stdio::null())
            .output()
            .map_err(|e| NetconfError::ExecutionFailed {
                cmd: cmd_str.clone(),
                source: e,
            })?;

        into_stdout(cmd_str, output)
    }

    fn run_with_input(&self, program: &Path, input: &str) -> Result<String, NetconfError> {
        let cmd_str = program.display().to_string();
        debug!("Running: {} <<< {:?}", cmd_str, input);

        let spawn_failed = |e| NetconfError::ExecutionFailed {
            cmd: cmd_str.clone(),
            source: e,
        };

        let mut child = Command::new(program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_failed)?;

        // Dropping stdin closes the pipe so the script reaches EOF.
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes()).map_err(spawn_failed)?;
        }

        let output = child.wait_with_output().map_err(spawn_failed)?;
        into_stdout(cmd_str, output)
    }
}

fn into_stdout(cmd: String, output: Output) -> Result<String, NetconfError> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(NetconfError::ExecutionError {
            cmd,
            code: output.status.code().unwrap_or(-1),
            stderr,
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    trace!("Output of {}: {}", cmd, stdout);
    Ok(stdout)
}
