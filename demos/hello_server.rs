//! A small multithreaded HTTP server.
//!
//! Run with `RUST_LOG=info cargo run --example hello_server`, then
//! `curl http://127.0.0.1:8080/hello`.

use std::process::ExitCode;
use std::sync::Arc;

use log::error;
use poolhttp::{HttpResponse, HttpServer, LogSink, ServerConfig, StatusCode};
use serde::Serialize;

#[derive(Serialize)]
struct Health {
    status: &'static str,
    workers: usize,
}

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::init();

    let sink = Arc::new(LogSink::new());
    let config = ServerConfig::new(8080, 4);
    let workers = config.workers;

    let mut server = match HttpServer::new(config, Arc::clone(&sink)) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start worker pool: {e}");
            return ExitCode::FAILURE;
        }
    };

    let routes = [
        server.get("/hello", |req| {
            Ok(HttpResponse::new(StatusCode::OK)
                .with_content_type("text/plain")
                .with_header("Connection", "close")
                .with_body(format!("{} {} says Hello, World!\n", req.method(), req.path())))
        }),
        server.get("/health", move |_req| {
            HttpResponse::new(StatusCode::OK).with_json(&Health { status: "ok", workers })
        }),
        server.post("/echo", |req| {
            Ok(HttpResponse::new(StatusCode::OK)
                .with_content_type(req.get_header("Content-Type").unwrap_or("application/octet-stream"))
                .with_body(req.body().to_vec()))
        }),
    ];
    if routes.iter().any(Result::is_err) {
        return ExitCode::FAILURE;
    }

    // Blocks until the process is killed; setup failures are already logged.
    match server.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
