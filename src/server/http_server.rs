//! HTTP server implementation.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::parser::{HttpRequest, header_block_len, parse_request};
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::server::error::Error;
use crate::server::log_sink::LogSink;
use crate::server::pool::WorkerPool;
use crate::server::response::{HttpResponse, StatusCode};
use crate::server::router::Router;

/// Pause after a failed accept so a persistent error does not spin the loop.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// An HTTP server backed by a fixed pool of worker threads.
///
/// Routes are registered with `&mut self` before serving; [`HttpServer::run`]
/// and [`HttpServer::stop`] take `&self` so the server can be shared with the
/// thread that stops it.
pub struct HttpServer {
    config: ServerConfig,
    router: Arc<Router>,
    pool: WorkerPool,
    sink: Arc<LogSink>,
    running: AtomicBool,
    stop_requested: AtomicBool,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl HttpServer {
    /// Create a server and start its worker threads.
    pub fn new(config: ServerConfig, sink: Arc<LogSink>) -> Result<Self, Error> {
        let pool = WorkerPool::new(config.workers, Arc::clone(&sink))?;
        let router = Arc::new(Router::new(Arc::clone(&sink)));

        Ok(Self {
            config,
            router,
            pool,
            sink,
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            local_addr: Mutex::new(None),
        })
    }

    /// The configuration the server was built with.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The route table.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Add a route. Fails once serving has started.
    pub fn add_route<F>(&mut self, method: &str, path: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, Error> + Send + Sync + 'static,
    {
        match Arc::get_mut(&mut self.router) {
            Some(router) => router.add_route(method, path, handler),
            None => {
                self.sink.error(format!("Failed to add route {method} {path}: server is running"));
                Err(Error::RoutesFrozen)
            }
        }
    }

    /// Add a `GET` route.
    pub fn get<F>(&mut self, path: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, Error> + Send + Sync + 'static,
    {
        self.add_route("GET", path, handler)
    }

    /// Add a `POST` route.
    pub fn post<F>(&mut self, path: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, Error> + Send + Sync + 'static,
    {
        self.add_route("POST", path, handler)
    }

    /// Add a `PUT` route.
    pub fn put<F>(&mut self, path: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, Error> + Send + Sync + 'static,
    {
        self.add_route("PUT", path, handler)
    }

    /// Add a `DELETE` route.
    pub fn delete<F>(&mut self, path: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, Error> + Send + Sync + 'static,
    {
        self.add_route("DELETE", path, handler)
    }

    /// The address the listener is bound to, once [`HttpServer::listen`] has run.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the accept loop is live or about to start.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Create, bind and listen on the configured port.
    pub fn listen(&self) -> Result<Connection, Error> {
        let setup = || -> Result<Connection, Error> {
            let listener = Connection::new()?;
            listener.bind(self.config.port)?;
            listener.listen()?;
            Ok(listener)
        };

        let listener = setup().inspect_err(|e| self.sink.error(e.to_string()))?;
        let addr = listener.local_addr()?;
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = Some(addr);
        self.running.store(true, Ordering::SeqCst);
        self.sink.info(format!(
            "Server listening on http://{addr} with {workers} workers",
            workers = self.pool.size()
        ));

        // A stop that raced with startup must still end the accept loop.
        if self.stop_requested.swap(false, Ordering::SeqCst) {
            self.running.store(false, Ordering::SeqCst);
            self.sink.info("Stop requested during startup");
        }
        Ok(listener)
    }

    /// Bind, listen and serve until [`HttpServer::stop`] is called.
    pub fn run(&self) -> Result<(), Error> {
        let listener = self.listen()?;
        self.serve(listener);
        Ok(())
    }

    /// Accept connections on `listener` and hand each to the worker pool.
    ///
    /// Returns after [`HttpServer::stop`], once every queued connection has
    /// been answered.
    pub fn serve(&self, mut listener: Connection) {
        while self.is_running() {
            let client = match listener.accept() {
                Ok(client) => client,
                Err(Error::ConnectionClosed) => {
                    self.sink.error("Listener closed, stopping accept loop");
                    break;
                }
                Err(e) => {
                    self.sink.error(e.to_string());
                    thread::sleep(ACCEPT_RETRY_DELAY);
                    continue;
                }
            };

            if !self.is_running() {
                break;
            }

            let task = ConnectionTask {
                client,
                router: Arc::clone(&self.router),
                sink: Arc::clone(&self.sink),
                read_buffer_size: self.config.read_buffer_size,
            };
            if let Err(e) = self.pool.enqueue(move || task.run()) {
                self.sink.error(format!("Dropping connection: {e}"));
            }
        }

        listener.close();
        self.sink.info("Waiting for queued connections to complete...");
        self.pool.shutdown();
        self.sink.info("Server shutdown complete");
    }

    /// Ask the accept loop to exit. Returns `false` if the server was not
    /// running yet; the request is then kept and honored by the next
    /// [`HttpServer::listen`], so [`HttpServer::run`] returns right away.
    pub fn stop(&self) -> bool {
        self.stop_requested.store(true, Ordering::SeqCst);
        if !self.running.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.stop_requested.store(false, Ordering::SeqCst);
        self.sink.info("Shutting down server...");

        // Wake the acceptor, which is blocked until a client arrives.
        if let Some(addr) = self.local_addr() {
            let _ = TcpStream::connect((Ipv4Addr::LOCALHOST, addr.port()));
        }
        true
    }
}

/// One accepted client, owned by exactly one worker until it is answered.
struct ConnectionTask {
    client: Connection,
    router: Arc<Router>,
    sink: Arc<LogSink>,
    read_buffer_size: usize,
}

impl ConnectionTask {
    fn run(mut self) {
        let peer = self
            .client
            .peer_addr()
            .map_or_else(|| "unknown".to_string(), |addr| addr.to_string());

        if let Err(e) = self.handle() {
            self.sink.error(format!("Error handling connection from {peer}: {e}"));
        }
        self.client.close();
    }

    fn handle(&mut self) -> Result<(), Error> {
        let buf = read_request(&mut self.client, self.read_buffer_size)?;
        if buf.is_empty() {
            return Ok(());
        }

        let response = match parse_request(&buf) {
            Ok(request) => self.router.dispatch(&request),
            Err(e) => {
                self.sink.warn(format!("Rejecting malformed request: {e}"));
                HttpResponse::text(StatusCode::BAD_REQUEST, format!("Error parsing request: {e}"))
            }
        };

        self.client.write_all(&response.to_bytes())?;
        self.client.flush()?;
        Ok(())
    }
}

/// Read one request: the head, then as much body as `Content-Length` asks
/// for. Stops early at EOF or once `limit` bytes are buffered.
fn read_request(stream: &mut impl Read, limit: usize) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::with_capacity(limit.min(4096));
    let mut chunk = [0u8; 4096];

    while buf.len() < limit {
        if let Some(head_len) = header_block_len(&buf) {
            if buf.len() >= head_len.saturating_add(declared_length(&buf[..head_len])) {
                break;
            }
        }

        let want = chunk.len().min(limit - buf.len());
        let n = stream.read(&mut chunk[..want])?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Ok(buf)
}

fn declared_length(head: &[u8]) -> usize {
    String::from_utf8_lossy(head)
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("Content-Length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}
