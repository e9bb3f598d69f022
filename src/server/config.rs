//! Server configuration.

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// The port to bind on all local interfaces. `0` picks an ephemeral port.
    pub port: u16,
    /// The number of worker threads serving connections.
    pub workers: usize,
    /// The maximum number of bytes read for one request.
    pub read_buffer_size: usize,
}

impl ServerConfig {
    /// Configuration for `port` with `workers` threads and the default buffer size.
    pub fn new(port: u16, workers: usize) -> Self {
        Self {
            port,
            workers,
            ..Self::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            workers: 4,
            read_buffer_size: 8192,
        }
    }
}
