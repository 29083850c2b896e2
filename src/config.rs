//! Parser service configuration.
//!
//! Nested-struct-with-`Default`-and-TOML-override pattern, grounded on
//! `mcp/config.rs.ref`'s `MCPConfig`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParserConfig {
    pub server: ServerConfig,
    pub stream: StreamConfig,
    pub bridge: BridgeConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Response frames are capped at this size (spec section 9's open
    /// question on combat-log-heavy sections); sections whose serialized
    /// entry would exceed this are still emitted, one entry at a time,
    /// never merged into a single oversized frame.
    pub max_response_frame_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// Default `batch_size` for `iter_section` when a request omits it.
    pub default_batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeConfig {
    #[serde(with = "duration_string")]
    pub receive_timeout: Duration,
    pub stderr_ring_buffer_capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                max_response_frame_bytes: 8 * 1024 * 1024,
            },
            stream: StreamConfig { default_batch_size: 1 },
            bridge: BridgeConfig {
                receive_timeout: Duration::from_secs(30),
                stderr_ring_buffer_capacity: 200,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl ParserConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ParserConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("STELLARIS_PARSER_CONFIG") {
            config = Self::from_file(&path)?;
        }
        if let Ok(timeout) = std::env::var("STELLARIS_PARSER_BRIDGE_TIMEOUT_SECS") {
            config.bridge.receive_timeout = Duration::from_secs(timeout.parse()?);
        }
        Ok(config)
    }
}

mod duration_string {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if let Some(stripped) = s.strip_suffix('s') {
            let secs: u64 = stripped.parse().map_err(serde::de::Error::custom)?;
            Ok(Duration::from_secs(secs))
        } else {
            Err(serde::de::Error::custom("expected duration string ending with 's'"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = ParserConfig::default();
        assert_eq!(config.server.max_response_frame_bytes, 8 * 1024 * 1024);
        assert_eq!(config.bridge.receive_timeout, Duration::from_secs(30));
    }

    #[test]
    fn parses_from_toml() {
        let toml_text = r#"
            [server]
            max_response_frame_bytes = 4194304

            [stream]
            default_batch_size = 50

            [bridge]
            receive_timeout = "15s"
            stderr_ring_buffer_capacity = 100

            [logging]
            level = "debug"
        "#;
        let config: ParserConfig = toml::from_str(toml_text).unwrap();
        assert_eq!(config.server.max_response_frame_bytes, 4194304);
        assert_eq!(config.bridge.receive_timeout, Duration::from_secs(15));
    }
}
