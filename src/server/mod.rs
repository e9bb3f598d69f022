//! HTTP server built on blocking sockets and a fixed worker pool.
//!
//! The acceptor thread hands every client [`Connection`] to the
//! [`WorkerPool`]; a worker reads the request, asks the [`Router`] for a
//! [`HttpResponse`] and writes it back. Everything logs through a shared
//! [`LogSink`].

mod response;
mod config;
mod connection;
mod error;
mod log_sink;
mod pool;
mod router;
mod http_server;
mod tests;

pub use response::{HttpResponse, StatusCode, SERVER_NAME};
pub use config::ServerConfig;
pub use connection::Connection;
pub use error::Error;
pub use log_sink::{LogMessage, LogSink, SinkState};
pub use pool::{Task, WorkerPool};
pub use router::{HandlerFn, Route, Router, INTERNAL_ERROR_BODY, NOT_FOUND_BODY};
pub use http_server::HttpServer;
