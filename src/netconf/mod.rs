//! macOS network configuration access.
//!
//! Three layers, leaf first:
//!
//! - [`runner`]: runs `networksetup` (elevated) and `scutil` (scripted over
//!   stdin) and hands back their text output
//! - [`services`]: discovers connected services and the primary service
//! - [`proxy_state`]: reads and writes per-service web proxy settings
//!
//! Only the runner touches processes. Parsing lives in the two layers above
//! it, which makes [`CommandRunner`] the seam for tests.

pub mod error;
pub mod proxy_state;
pub mod runner;
pub mod services;

pub use error::NetconfError;
pub use proxy_state::{parse_proxy_state, ProxyState, ProxyStateAccessor};
pub use runner::{
    CommandPaths, CommandRunner, SystemCommandRunner, DEFAULT_NETWORKSETUP, DEFAULT_SCUTIL,
    DEFAULT_SUDO,
};
pub use services::{NetworkService, ServiceDirectory};
