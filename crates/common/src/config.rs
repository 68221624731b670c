//! Gateway client configuration using TOML and serde.
//!
//! The option set is intentionally small and typed. Unknown keys are
//! rejected rather than ignored so a typo in a deployment file surfaces
//! as an [`Error::InputInvalid`](crate::Error::InputInvalid) instead of
//! silently falling back to defaults.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::{Error, Result};

/// Connection options for the gateway client.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayOptions {
    /// Gateway endpoint, e.g. `https://gateway.example.com:7051`.
    pub gateway_url: String,

    /// WebSocket base URL for the peer deliver proxy. Required only
    /// when block-event subscription is used.
    pub ws_url: Option<String>,

    /// PEM certificate chain pinning the gateway TLS connection.
    pub tls_ca_cert: Option<String>,

    /// Server name for TLS verification when it differs from the host
    /// in `gateway_url`.
    pub tls_server_name: Option<String>,
}

impl GatewayOptions {
    /// Minimal options pointing at a gateway endpoint.
    pub fn new(gateway_url: impl Into<String>) -> Self {
        GatewayOptions {
            gateway_url: gateway_url.into(),
            ws_url: None,
            tls_ca_cert: None,
            tls_server_name: None,
        }
    }

    /// Parse options from a TOML string.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let options: GatewayOptions = toml::from_str(raw).map_err(Error::input)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file path.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())
            .map_err(|e| Error::input(format!("cannot read config file: {e}")))?;
        Self::from_toml_str(&raw)
    }

    fn validate(&self) -> Result<()> {
        if self.gateway_url.trim().is_empty() {
            return Err(Error::input("gateway_url must not be empty"));
        }
        if let Some(ws) = &self.ws_url {
            if !ws.starts_with("ws://") && !ws.starts_with("wss://") {
                return Err(Error::input("ws_url must use a ws:// or wss:// scheme"));
            }
        }
        Ok(())
    }
}
