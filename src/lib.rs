//! mitmwrap: system proxy bracketing for mitmproxy on macOS
//!
//! This crate points the operating system's web proxy at a locally running
//! mitmproxy for exactly as long as that proxy runs, and restores the
//! previous state afterwards, including after Ctrl-C.
//!
//! # Architecture
//!
//! - **Netconf**: `networksetup`/`scutil` execution, service discovery, and
//!   per-service proxy state
//! - **Bracket**: enable-before / disable-after around a block of work, and
//!   one-shot toggling
//! - **Lifecycle**: privilege elevation and SIGINT-driven cleanup
//! - **Wrapper**: the foreground proxy process and port selection
//! - **Config**: Hierarchical TOML configuration
//! - **Telemetry**: Structured syslog logging for audit trails

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod bracket;
pub mod cli;
pub mod config;
pub mod lifecycle;
pub mod netconf;
pub mod telemetry;
pub mod wrapper;
