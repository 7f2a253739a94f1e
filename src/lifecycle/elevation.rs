//! Privilege elevation by re-executing through `sudo`.

use std::ffi::OsString;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Command;

use nix::unistd::geteuid;
use tracing::debug;

use super::error::LifecycleError;

/// Whether the process runs with an effective uid of root.
pub fn is_elevated() -> bool {
    geteuid().is_root()
}

/// `<sudo> <exe> <args...>`.
pub fn relaunch_command(sudo: &Path, exe: &Path, args: &[OsString]) -> Command {
    let mut cmd = Command::new(sudo);
    cmd.arg(exe).args(args);
    cmd
}

/// Replace this process with an elevated copy of itself unless already root.
///
/// Returns `Ok` when no relaunch is needed. On success the relaunch never
/// returns.
pub fn ensure_elevated(sudo: Option<&Path>) -> Result<(), LifecycleError> {
    if is_elevated() {
        debug!("Already running as root");
        return Ok(());
    }
    let Some(sudo) = sudo else {
        debug!("No elevation program configured, continuing unprivileged");
        return Ok(());
    };

    let exe = std::env::current_exe().map_err(LifecycleError::CurrentExe)?;
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();

    println!("Relaunching with sudo...");
    let source = relaunch_command(sudo, &exe, &args).exec();
    Err(LifecycleError::Relaunch {
        program: sudo.to_path_buf(),
        source,
    })
}
