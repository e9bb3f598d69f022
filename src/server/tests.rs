//! End-to-end tests for the HTTP server over loopback sockets.

#[cfg(test)]
mod server_tests {
    use std::io::{self, Read, Write};
    use std::net::{Shutdown, SocketAddr, TcpStream};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    use crate::parser::HttpRequest;
    use crate::server::{
        Error, HttpResponse, HttpServer, LogSink, ServerConfig, StatusCode, NOT_FOUND_BODY,
    };

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Running {
        server: Arc<HttpServer>,
        addr: SocketAddr,
        acceptor: JoinHandle<()>,
    }

    impl Running {
        fn stop(self) {
            assert!(self.server.stop());
            self.acceptor.join().unwrap();
        }
    }

    fn hello_server(sink: Arc<LogSink>, workers: usize) -> HttpServer {
        let mut server = HttpServer::new(ServerConfig::new(0, workers), sink).unwrap();
        server
            .get("/hello", |req| {
                let mut response = HttpResponse::new(StatusCode::OK);
                response.set_body(format!("{} {} says Hello, World!\n", req.method(), req.path()));
                response.set_header("Content-Type", "text/plain");
                response.set_header("Connection", "close");
                Ok(response)
            })
            .unwrap();
        server
    }

    fn start(server: HttpServer) -> Running {
        let server = Arc::new(server);
        let listener = server.listen().unwrap();
        let port = server.local_addr().unwrap().port();

        let acceptor = {
            let server = Arc::clone(&server);
            thread::spawn(move || server.serve(listener))
        };

        Running {
            server,
            addr: SocketAddr::from(([127, 0, 0, 1], port)),
            acceptor,
        }
    }

    fn send(addr: SocketAddr, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        stream.write_all(raw).unwrap();
        stream.shutdown(Shutdown::Write).unwrap();

        let mut response = Vec::new();
        stream.read_to_end(&mut response).unwrap();
        String::from_utf8(response).unwrap()
    }

    fn get(addr: SocketAddr, path: &str) -> String {
        send(addr, format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n").as_bytes())
    }

    fn body(response: &str) -> &str {
        response.split_once("\r\n\r\n").map_or("", |(_, body)| body)
    }

    #[test]
    fn test_hello_route() {
        let running = start(hello_server(Arc::new(LogSink::with_writer(io::sink())), 4));

        let response = get(running.addr, "/hello");
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
        assert!(response.contains("Server: poolhttp\r\n"));
        assert!(response.contains("Date: "));
        assert!(response.contains("Content-Type: text/plain\r\n"));
        assert!(body(&response).contains("GET /hello"));

        let expected_len = body(&response).len();
        assert!(response.contains(&format!("Content-Length: {expected_len}\r\n")));

        running.stop();
    }

    #[test]
    fn test_missing_route_is_404() {
        let running = start(hello_server(Arc::new(LogSink::with_writer(io::sink())), 2));

        let response = get(running.addr, "/missing");
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"), "{response}");
        assert_eq!(body(&response), NOT_FOUND_BODY);

        running.stop();
    }

    #[test]
    fn test_malformed_request_is_400() {
        let running = start(hello_server(Arc::new(LogSink::with_writer(io::sink())), 1));

        let response = send(running.addr, b"\x00\x01garbage\r\n\r\n");
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{response}");
        assert!(body(&response).starts_with("Error parsing request:"));

        running.stop();
    }

    #[test]
    fn test_handler_failure_is_500_and_worker_survives() {
        let sink = Arc::new(LogSink::with_writer(io::sink()));
        let mut server = hello_server(sink, 1);
        server
            .get("/panic", |_req| -> Result<HttpResponse, Error> { panic!("handler fault") })
            .unwrap();
        server
            .get("/fail", |_req| Err(Error::InternalError("nope".to_string())))
            .unwrap();
        let running = start(server);

        for path in ["/panic", "/fail"] {
            let response = get(running.addr, path);
            assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"), "{response}");
        }
        // The single worker is still alive.
        assert!(get(running.addr, "/hello").starts_with("HTTP/1.1 200 OK\r\n"));

        running.stop();
    }

    #[test]
    fn test_duplicate_route_only_first_handler_runs() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let mut server =
            HttpServer::new(ServerConfig::new(0, 2), Arc::new(LogSink::with_writer(io::sink())))
                .unwrap();
        let hits = Arc::clone(&first);
        assert!(server
            .add_route("GET", "/x", move |_req| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(HttpResponse::text(StatusCode::OK, "first"))
            })
            .is_ok());
        let hits = Arc::clone(&second);
        assert!(server
            .add_route("GET", "/x", move |_req| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(HttpResponse::text(StatusCode::OK, "second"))
            })
            .is_err());

        let running = start(server);
        for _ in 0..3 {
            assert_eq!(body(&get(running.addr, "/x")), "first");
        }
        running.stop();

        assert_eq!(first.load(Ordering::SeqCst), 3);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_convenience_methods_register_fixed_methods() {
        let mut server =
            HttpServer::new(ServerConfig::new(0, 2), Arc::new(LogSink::with_writer(io::sink())))
                .unwrap();
        let ok = |_req: &HttpRequest| -> Result<HttpResponse, Error> {
            Ok(HttpResponse::text(StatusCode::OK, "ok"))
        };
        server.get("/r", ok).unwrap();
        server.post("/r", ok).unwrap();
        server.put("/r", ok).unwrap();
        server.delete("/r", ok).unwrap();

        let methods: Vec<&str> = server.router().routes().iter().map(|r| r.method.as_str()).collect();
        assert_eq!(methods, vec!["GET", "POST", "PUT", "DELETE"]);

        let running = start(server);
        let response = send(
            running.addr,
            b"DELETE /r HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\n\r\n",
        );
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
        assert!(get(running.addr, "/r").starts_with("HTTP/1.1 200 OK\r\n"));
        running.stop();
    }

    #[test]
    fn test_post_body_reaches_handler() {
        let mut server =
            HttpServer::new(ServerConfig::new(0, 2), Arc::new(LogSink::with_writer(io::sink())))
                .unwrap();
        server
            .post("/echo", |req| {
                Ok(HttpResponse::text(StatusCode::OK, String::from_utf8_lossy(req.body())))
            })
            .unwrap();
        let running = start(server);

        let response = send(
            running.addr,
            b"POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 11\r\n\r\nhello there",
        );
        assert_eq!(body(&response), "hello there");
        running.stop();
    }

    #[test]
    fn test_oversized_content_length_still_answered() {
        let running = start(hello_server(Arc::new(LogSink::with_writer(io::sink())), 1));

        let response = send(
            running.addr,
            b"POST /hello HTTP/1.1\r\nHost: localhost\r\nContent-Length: 18446744073709551615\r\n\r\nab",
        );
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"), "{response}");
        // The worker survived.
        assert!(get(running.addr, "/hello").starts_with("HTTP/1.1 200 OK\r\n"));

        running.stop();
    }

    #[test]
    fn test_concurrent_clients_all_answered() {
        let running = start(hello_server(Arc::new(LogSink::with_writer(io::sink())), 4));
        let addr = running.addr;

        let clients: Vec<_> = (0..32)
            .map(|_| thread::spawn(move || get(addr, "/hello")))
            .collect();
        for client in clients {
            let response = client.join().unwrap();
            assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        }

        running.stop();
    }

    #[test]
    fn test_components_log_through_sink() {
        let capture = Capture::default();
        let sink = Arc::new(LogSink::with_writer(capture.clone()));
        let running = start(hello_server(Arc::clone(&sink), 2));

        get(running.addr, "/hello");
        running.stop();
        sink.shutdown();

        let log = capture.text();
        assert!(log.contains("[INFO] Route added: GET /hello"), "{log}");
        assert!(log.contains("[INFO] Server listening on http://"), "{log}");
        assert!(log.contains("[INFO] Request received: GET /hello"), "{log}");
        assert!(log.contains("[INFO] Server shutdown complete"), "{log}");
    }

    #[test]
    fn test_bind_failure_is_setup_error() {
        let first = start(hello_server(Arc::new(LogSink::with_writer(io::sink())), 1));
        let port = first.addr.port();

        let second = HttpServer::new(
            ServerConfig::new(port, 1),
            Arc::new(LogSink::with_writer(io::sink())),
        )
        .unwrap();
        let err = second.run().unwrap_err();
        assert!(err.is_setup(), "{err}");
        assert!(!second.is_running());

        first.stop();
    }

    #[test]
    fn test_stop_returns_false_twice() {
        let running = start(hello_server(Arc::new(LogSink::with_writer(io::sink())), 1));
        let server = Arc::clone(&running.server);
        running.stop();
        assert!(!server.stop());
        assert!(!server.is_running());
    }
}
