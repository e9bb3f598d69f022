//! Error types for the HTTP server.

use std::io;

use thiserror::Error;

use crate::parser::Error as ParserError;

/// Errors that can occur while setting up or running the server.
#[derive(Debug, Error)]
pub enum Error {
    /// Error parsing an HTTP request.
    #[error("Parse error: {0}")]
    ParseError(#[from] ParserError),

    /// I/O error on an established connection.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// The listening socket could not be created.
    #[error("Failed to create socket: {0}")]
    Socket(#[source] io::Error),

    /// The socket could not be bound to the requested port.
    #[error("Failed to bind server to port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// The bound socket refused to enter the listening state.
    #[error("Failed to listen on socket: {0}")]
    Listen(#[source] io::Error),

    /// A client connection could not be accepted.
    #[error("Failed to accept incoming connection: {0}")]
    Accept(#[source] io::Error),

    /// The connection has already been closed or moved out.
    #[error("Connection is closed")]
    ConnectionClosed,

    /// A route failed validation.
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    /// A route with the same method and path already exists.
    #[error("Route already exists: {method} {path}")]
    DuplicateRoute { method: String, path: String },

    /// Routes cannot be added once the server is serving.
    #[error("Routes cannot be added while the server is running")]
    RoutesFrozen,

    /// A worker pool needs at least one thread.
    #[error("Worker pool size must be greater than zero")]
    InvalidPoolSize,

    /// The worker pool no longer accepts tasks.
    #[error("Worker pool is shut down")]
    PoolClosed,

    /// Internal server error raised by a handler.
    #[error("Internal server error: {0}")]
    InternalError(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error happened while bringing the listener up. These are
    /// the only failures that abort the server.
    pub fn is_setup(&self) -> bool {
        matches!(self, Error::Socket(_) | Error::Bind { .. } | Error::Listen(_))
    }
}
