//! Audit event types for structured logging.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Session mode recorded in [`AuditEvent::SessionStart`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Flip the system proxy and exit.
    Toggle,
    /// Run the console proxy inside the bracket.
    Console,
    /// Run the web-UI proxy inside the bracket.
    Web,
}

/// Audit events written to syslog.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Wrapper started.
    SessionStart {
        /// Invoking user (the `sudo` caller when elevated).
        user: String,
        /// What this run does.
        mode: SessionMode,
        /// Proxy port, absent in toggle mode.
        port: Option<u16>,
    },

    /// Wrapper finished.
    SessionEnd {
        /// Exit code handed back to the shell.
        exit_code: u8,
        /// Wall time of the session in seconds.
        duration_sec: u64,
    },

    /// System proxy turned on for a service.
    ProxyEnabled {
        /// Service name.
        service: String,
        /// Proxy host.
        host: String,
        /// Proxy port.
        port: u16,
    },

    /// System proxy turned off for a service.
    ProxyDisabled {
        /// Service name.
        service: String,
    },

    /// An interrupt arrived and the emergency cleanup ran.
    InterruptCleanup,
}

/// Wrapper for serializing events with timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct TimestampedEvent<'a> {
    /// ISO8601 timestamp.
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,

    /// The actual event (flattened into this struct).
    #[serde(flatten)]
    pub event: &'a AuditEvent,
}

impl AuditEvent {
    /// Session end for a run that produced `outcome`. Errors are recorded
    /// with exit code 1.
    pub fn session_end<E>(outcome: &Result<u8, E>, duration: Duration) -> Self {
        AuditEvent::SessionEnd {
            exit_code: *outcome.as_ref().unwrap_or(&1),
            duration_sec: duration.as_secs(),
        }
    }

    /// Wrap this event with a timestamp for serialization.
    pub fn with_timestamp(&self) -> TimestampedEvent<'_> {
        TimestampedEvent {
            timestamp: Utc::now(),
            event: self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_start_serialization() {
        let event = AuditEvent::SessionStart {
            user: "alice".to_string(),
            mode: SessionMode::Web,
            port: Some(8081),
        };

        let json = serde_json::to_string(&event.with_timestamp()).unwrap();

        assert!(json.contains("\"event\":\"session_start\""));
        assert!(json.contains("\"user\":\"alice\""));
        assert!(json.contains("\"mode\":\"web\""));
        assert!(json.contains("\"port\":8081"));
        assert!(json.contains("\"ts\""));
    }

    #[test]
    fn test_toggle_session_has_null_port() {
        let event = AuditEvent::SessionStart {
            user: "alice".to_string(),
            mode: SessionMode::Toggle,
            port: None,
        };

        let json = serde_json::to_string(&event.with_timestamp()).unwrap();
        assert!(json.contains("\"mode\":\"toggle\""));
        assert!(json.contains("\"port\":null"));
    }

    #[test]
    fn test_proxy_enabled_serialization() {
        let event = AuditEvent::ProxyEnabled {
            service: "Wi-Fi".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
        };

        let json = serde_json::to_string(&event.with_timestamp()).unwrap();

        assert!(json.contains("\"event\":\"proxy_enabled\""));
        assert!(json.contains("\"service\":\"Wi-Fi\""));
        assert!(json.contains("\"port\":8080"));
    }

    #[test]
    fn test_unit_variant_serialization() {
        let json = serde_json::to_string(&AuditEvent::InterruptCleanup.with_timestamp()).unwrap();
        assert!(json.contains("\"event\":\"interrupt_cleanup\""));
    }

    #[test]
    fn test_session_end_serialization() {
        let event = AuditEvent::SessionEnd {
            exit_code: 130,
            duration_sec: 42,
        };

        let json = serde_json::to_string(&event.with_timestamp()).unwrap();

        assert!(json.contains("\"event\":\"session_end\""));
        assert!(json.contains("\"exit_code\":130"));
        assert!(json.contains("\"duration_sec\":42"));
    }

    #[test]
    fn test_session_end_records_failed_run() {
        let failed: Result<u8, String> = Err("proxy binary not found".to_string());
        let event = AuditEvent::session_end(&failed, Duration::from_millis(2500));

        let json = serde_json::to_string(&event.with_timestamp()).unwrap();
        assert!(json.contains("\"exit_code\":1"));
        assert!(json.contains("\"duration_sec\":2"));
    }

    #[test]
    fn test_session_end_keeps_child_exit_code() {
        let ok: Result<u8, String> = Ok(130);
        let event = AuditEvent::session_end(&ok, Duration::from_secs(9));

        assert!(matches!(
            event,
            AuditEvent::SessionEnd {
                exit_code: 130,
                duration_sec: 9
            }
        ));
    }
}
