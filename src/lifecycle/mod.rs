//! Process lifecycle: privilege elevation and interrupt-driven cleanup.

mod cancel;
mod elevation;
mod error;

pub use cancel::{install_interrupt_handler, CancellationContext};
pub use elevation::{ensure_elevated, is_elevated, relaunch_command};
pub use error::LifecycleError;
