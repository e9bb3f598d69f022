//! Drives the connection and worker pool layers directly, writing responses
//! through each client's native socket handle.

use std::io::Read;
use std::sync::Arc;

use log::{error, info};
use poolhttp::{Connection, HttpResponse, LogSink, StatusCode, WorkerPool};

#[cfg(unix)]
fn write_raw(client: &mut Connection, bytes: &[u8]) {
    if let Some(fd) = client.native_handle() {
        // SAFETY: `fd` is owned by `client`, which outlives this call.
        let written = unsafe { libc::write(fd, bytes.as_ptr().cast(), bytes.len()) };
        if written < 0 {
            error!("raw write failed: {}", std::io::Error::last_os_error());
        }
    }
}

#[cfg(not(unix))]
fn write_raw(client: &mut Connection, bytes: &[u8]) {
    use std::io::Write;
    if let Err(e) = client.write_all(bytes) {
        error!("write failed: {e}");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let sink = Arc::new(LogSink::new());
    let pool = WorkerPool::new(4, Arc::clone(&sink))?;

    let listener = Connection::new()?;
    listener.bind(8081)?;
    listener.listen()?;
    info!("Listening on port 8081");

    loop {
        let mut client = match listener.accept() {
            Ok(client) => client,
            Err(e) => {
                sink.error(e.to_string());
                continue;
            }
        };

        pool.enqueue(move || {
            let mut buf = [0u8; 1024];
            let _ = client.read(&mut buf);

            let body = format!("Hello from {}\n", std::thread::current().name().unwrap_or("worker"));
            let response = HttpResponse::text(StatusCode::OK, body).with_header("Connection", "close");
            write_raw(&mut client, &response.to_bytes());
        })?;
    }
}
