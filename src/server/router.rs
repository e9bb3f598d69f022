//! Request routing.
//!
//! Routes are matched by exact method and path, in the order they were
//! added. The table is small and fixed before serving starts, so dispatch is
//! a linear scan.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::parser::HttpRequest;
use crate::server::error::Error;
use crate::server::log_sink::LogSink;
use crate::server::pool::panic_message;
use crate::server::response::{HttpResponse, StatusCode};

/// Body of the response sent when no route matches.
pub const NOT_FOUND_BODY: &str = "404 Not Found\n";

/// Body of the response sent when a handler fails.
pub const INTERNAL_ERROR_BODY: &str = "500 Internal Server Error\n";

/// A shareable request handler.
pub type HandlerFn = Arc<dyn Fn(&HttpRequest) -> Result<HttpResponse, Error> + Send + Sync>;

/// A registered route.
#[derive(Clone)]
pub struct Route {
    pub method: String,
    pub path: String,
    pub handler: HandlerFn,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// An ordered table of routes.
pub struct Router {
    routes: Vec<Route>,
    sink: Arc<LogSink>,
}

impl Router {
    /// An empty table that logs to `sink`.
    pub fn new(sink: Arc<LogSink>) -> Self {
        Self {
            routes: Vec::new(),
            sink,
        }
    }

    /// Register `handler` for `method` and `path`.
    ///
    /// Fails if the method or path is empty, the path does not start with
    /// `/`, or the same method and path are already registered. An existing
    /// route is never replaced.
    pub fn add_route<F>(&mut self, method: &str, path: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, Error> + Send + Sync + 'static,
    {
        if method.is_empty() || path.is_empty() {
            self.sink.error("Failed to add route: method and path must not be empty");
            return Err(Error::InvalidRoute("method and path must not be empty".to_string()));
        }
        if !path.starts_with('/') {
            self.sink.error(format!("Failed to add route: path must start with '/': {path}"));
            return Err(Error::InvalidRoute(format!("path must start with '/': {path}")));
        }
        if self.find(method, path).is_some() {
            self.sink.warn(format!("Route already exists: {method} {path}"));
            return Err(Error::DuplicateRoute {
                method: method.to_string(),
                path: path.to_string(),
            });
        }

        self.routes.push(Route {
            method: method.to_string(),
            path: path.to_string(),
            handler: Arc::new(handler),
        });
        self.sink.info(format!("Route added: {method} {path}"));
        Ok(())
    }

    fn find(&self, method: &str, path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|route| route.method == method && route.path == path)
    }

    /// Registered routes, in insertion order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// The number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Produce the response for `request`.
    ///
    /// Unmatched requests get a 404. A handler that returns an error or
    /// panics yields a 500; neither escapes to the caller.
    pub fn dispatch(&self, request: &HttpRequest) -> HttpResponse {
        let method = request.method().as_str();
        let path = request.path();
        self.sink.info(format!("Request received: {method} {path}"));

        let Some(route) = self.find(method, path) else {
            return HttpResponse::text(StatusCode::NOT_FOUND, NOT_FOUND_BODY);
        };

        match panic::catch_unwind(AssertUnwindSafe(|| (route.handler)(request))) {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                self.sink.error(format!("Handler for {method} {path} failed: {e}"));
                HttpResponse::text(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY)
            }
            Err(payload) => {
                self.sink.error(format!(
                    "Handler for {method} {path} panicked: {}",
                    panic_message(payload.as_ref())
                ));
                HttpResponse::text(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY)
            }
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("routes", &self.routes).finish()
    }
}
