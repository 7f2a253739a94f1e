//! Resolved settings for one wrapped proxy run.

use super::schema::Config;

/// Everything needed to launch the wrapped proxy tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Host the system proxy points at.
    pub host: String,
    /// Port the wrapped tool listens on.
    pub port: u16,
    /// Launch the web-UI variant instead of the console one.
    pub use_web_variant: bool,
    /// Arguments passed through to the wrapped tool verbatim.
    pub extra_args: Vec<String>,
    /// Binary selected from config by `use_web_variant`.
    pub binary: String,
}

impl ProxyConfig {
    /// Build from merged config plus the per-run choices.
    pub fn from_config(
        config: &Config,
        port: u16,
        use_web_variant: bool,
        extra_args: Vec<String>,
    ) -> Self {
        let binary = if use_web_variant {
            config.proxy.web_binary.clone()
        } else {
            config.proxy.binary.clone()
        };

        Self {
            host: config.proxy.host.clone(),
            port,
            use_web_variant,
            extra_args,
            binary,
        }
    }
}
