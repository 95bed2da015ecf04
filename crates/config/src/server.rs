//! Stream transport listener settings

use serde::Deserialize;

/// Export stream listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub address: String,

    /// Listen port
    pub port: u16,

    /// Maximum accepted frame size in bytes
    pub max_frame_size: usize,

    /// Per-connection read buffer size in bytes
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".into(),
            port: 9090,
            max_frame_size: 16 * 1024 * 1024,
            read_buffer_size: 256 * 1024,
        }
    }
}

impl ServerConfig {
    /// Get the socket address to bind to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:9090");
        assert_eq!(config.max_frame_size, 16 * 1024 * 1024);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ServerConfig = toml::from_str("port = 8000").unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.address, "0.0.0.0");
    }
}
