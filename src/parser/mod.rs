//! HTTP request parsing.
//!
//! The server core only needs `method()` and `path()` from a request, but the
//! parser also keeps headers, query parameters and the body so handlers can
//! inspect them.

mod request;
mod method;
mod version;
mod error;
mod tests;

pub use request::HttpRequest;
pub use method::Method;
pub use version::HttpVersion;
pub use error::Error;

pub use request::{parse_request, header_block_len};
