//! Server configuration.
//!
//! Loaded from a TOML file, validated after deserialization. Every
//! field has a default so a missing file still yields a runnable
//! server.

use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use freshet_service::DeliveryMode;

use crate::error::{ServerError, ServerResult};

/// Fan-out delivery mode, as written in the config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryConfig {
    /// Deliver to subscribers in order, one at a time.
    Sync,
    /// One task per subscriber per event.
    #[default]
    Async,
}

impl From<DeliveryConfig> for DeliveryMode {
    fn from(config: DeliveryConfig) -> Self {
        match config {
            DeliveryConfig::Sync => Self::Sync,
            DeliveryConfig::Async => Self::Async,
        }
    }
}

/// One backend to register at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendEntry {
    /// Name the backend is registered under.
    pub name: String,
    /// Descriptor type: `nil`, `mem`, `dir`, `kv` or `http`.
    #[serde(rename = "type")]
    pub backend_type: String,
    /// Descriptor argument (directory or URL), when the type takes one.
    #[serde(default)]
    pub arg: Option<String>,
}

impl BackendEntry {
    /// The `{type, arg}` descriptor this entry describes.
    #[must_use]
    pub fn descriptor(&self) -> serde_json::Value {
        serde_json::json!({ "type": self.backend_type, "arg": self.arg })
    }
}

fn default_events_addr() -> String {
    "127.0.0.1:7400".to_string()
}

fn default_http_addr() -> String {
    "127.0.0.1:7401".to_string()
}

/// The server's configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address of the event gateway.
    #[serde(default = "default_events_addr")]
    pub events_addr: String,
    /// Address of the admin/raw-backend HTTP surface.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
    /// Fan-out delivery mode.
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Backends registered at startup.
    #[serde(default)]
    pub backends: Vec<BackendEntry>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            events_addr: default_events_addr(),
            http_addr: default_http_addr(),
            delivery: DeliveryConfig::default(),
            backends: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Reads and validates a config file.
    ///
    /// # Errors
    ///
    /// I/O failures, TOML parse failures, and validation failures.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&text).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks addresses and backend entries.
    ///
    /// # Errors
    ///
    /// [`ServerError::Config`] describing the first problem found.
    pub fn validate(&self) -> ServerResult<()> {
        self.events_addr.parse::<SocketAddr>().map_err(|_| {
            ServerError::Config(format!("events_addr \"{}\" is not an address", self.events_addr))
        })?;
        self.http_addr.parse::<SocketAddr>().map_err(|_| {
            ServerError::Config(format!("http_addr \"{}\" is not an address", self.http_addr))
        })?;
        if self.events_addr == self.http_addr {
            return Err(ServerError::Config(
                "events_addr and http_addr must differ".to_string(),
            ));
        }
        for entry in &self.backends {
            if entry.name.is_empty() {
                return Err(ServerError::Config("backend with empty name".to_string()));
            }
        }
        let mut names: Vec<&str> = self.backends.iter().map(|b| b.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.backends.len() {
            return Err(ServerError::Config("duplicate backend names".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        ServerConfig::default().validate().unwrap();
    }

    #[test]
    fn full_file_parses() {
        let text = r#"
            events_addr = "0.0.0.0:9100"
            http_addr = "0.0.0.0:9101"
            delivery = "sync"

            [[backends]]
            name = "main"
            type = "mem"

            [[backends]]
            name = "archive"
            type = "dir"
            arg = "/var/lib/freshet/archive"
        "#;
        let config: ServerConfig = toml::from_str(text).unwrap();
        config.validate().unwrap();
        assert_eq!(config.delivery, DeliveryConfig::Sync);
        assert_eq!(config.backends.len(), 2);
        assert_eq!(
            config.backends[1].descriptor(),
            serde_json::json!({"type": "dir", "arg": "/var/lib/freshet/archive"})
        );
    }

    #[test]
    fn bad_address_is_rejected() {
        let config = ServerConfig { events_addr: "nowhere".to_string(), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_backend_names_are_rejected() {
        let entry = BackendEntry {
            name: "b".to_string(),
            backend_type: "mem".to_string(),
            arg: None,
        };
        let config = ServerConfig {
            backends: vec![entry.clone(), entry],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("freshet.toml");
        std::fs::write(&path, "events_addr = \"127.0.0.1:7500\"\n").unwrap();
        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.events_addr, "127.0.0.1:7500");
        assert_eq!(config.http_addr, default_http_addr());
    }
}
