//! A minimal embeddable HTTP server.
//!
//! Connections are accepted on one thread and served by a fixed pool of
//! worker threads. Requests are routed by exact method and path, and all
//! components log through an asynchronous [`LogSink`] that the caller owns.
//!
//! # Features
//!
//! - Blocking TCP sockets with explicit bind/listen/accept and single-owner handles
//! - A fixed-size worker pool that drains its queue on shutdown
//! - Exact-match routing with a 404 fallback and 500 on handler failure
//! - HTTP/1.1 response serialization with `Server`, `Date` and `Content-Length`
//! - A background log sink that forwards to the `log` facade
//!
//! # Examples
//!
//! ## Serving a route
//!
//! ```no_run
//! use std::sync::Arc;
//! use poolhttp::{HttpResponse, HttpServer, LogSink, ServerConfig, StatusCode};
//!
//! let sink = Arc::new(LogSink::new());
//! let mut server = HttpServer::new(ServerConfig::new(8080, 4), sink).unwrap();
//!
//! server.get("/hello", |req| {
//!     Ok(HttpResponse::text(StatusCode::OK, format!("{} {} says hello\n", req.method(), req.path())))
//! }).unwrap();
//!
//! server.run().unwrap();
//! ```
//!
//! ## Building a response
//!
//! ```
//! use poolhttp::{HttpResponse, StatusCode};
//!
//! let mut response = HttpResponse::new(StatusCode::OK);
//! response.set_header("Content-Type", "text/plain");
//! response.set_body("hi");
//!
//! let wire = String::from_utf8(response.to_bytes()).unwrap();
//! assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
//! assert!(wire.contains("Content-Length: 2\r\n"));
//! assert!(wire.ends_with("\r\n\r\nhi"));
//! ```
//!
//! ## Parsing a request
//!
//! ```
//! use poolhttp::{parse_request, Method};
//!
//! let request = parse_request(b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n").unwrap();
//! assert_eq!(request.method(), Method::GET);
//! assert_eq!(request.path(), "/index.html");
//! ```

pub mod parser;

pub mod server;

// Re-export commonly used items for convenience
pub use parser::{Error as ParserError, HttpRequest, HttpVersion, Method, parse_request};
pub use server::{
    Connection, Error as ServerError, HttpResponse, HttpServer, LogSink, Router, ServerConfig,
    StatusCode, WorkerPool,
};
