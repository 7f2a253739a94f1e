//! Configuration system for mitmwrap.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded from multiple sources and merged in order:
//!
//! 1. Embedded defaults
//! 2. System config: `/etc/mitmwrap/config.toml`
//! 3. User config: `~/.config/mitmwrap/config.toml`
//! 4. Additional config file (via `--config` flag)
//! 5. CLI flags (highest priority)
//!
//! Only the `--config` file is required to exist when given. Every scalar set
//! in a later layer overrides the earlier value.
//!
//! ```toml
//! [proxy]
//! host = "127.0.0.1"
//! port = 8080
//! binary = "mitmproxy"
//! web_binary = "mitmweb"
//!
//! [commands]
//! sudo = "/usr/bin/sudo"
//! networksetup = "/usr/sbin/networksetup"
//! scutil = "/usr/sbin/scutil"
//! ```

mod error;
mod loader;
mod proxy;
mod schema;

pub use error::ConfigError;
pub use loader::{ConfigLoader, SYSTEM_CONFIG_PATH};
pub use proxy::ProxyConfig;
pub use schema::{CommandsSection, Config, ProxySection, DEFAULT_CONFIG};
