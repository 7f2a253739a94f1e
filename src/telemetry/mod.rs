//! Audit logging for mitmwrap.
//!
//! Every change mitmwrap makes to the system proxy is recorded in syslog
//! under the `MITMWRAP` tag, so an administrator can reconstruct who pointed
//! the machine at a local proxy and whether it was put back.
//!
//! - **Audit logging** (syslog): structured events, never stdout/stderr
//! - **Diagnostic logging** (tracing): human-readable, stderr
//!
//! Events are logged as JSON with an ISO8601 timestamp:
//!
//! ```json
//! {"ts":"2026-03-02T09:14:55Z","event":"proxy_enabled","service":"Wi-Fi","host":"127.0.0.1","port":8080}
//! ```
//!
//! When syslog is unavailable the logger degrades to a null sink.

mod error;
mod events;
mod syslog;

pub use error::TelemetryError;
pub use events::{AuditEvent, SessionMode};
pub use syslog::{audit, init_logger, AuditLogger, SYSLOG_TAG};
