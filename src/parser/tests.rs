//! Tests for the request parser.

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use crate::parser::{Error, HttpRequest, HttpVersion, Method, header_block_len, parse_request};

    #[test]
    fn test_parse_simple_get_request() {
        let request = b"GET /hello HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let result = parse_request(request).unwrap();
        assert_eq!(result.method(), Method::GET);
        assert_eq!(result.path(), "/hello");
        assert_eq!(result.version(), HttpVersion::Http11);
        assert_eq!(result.get_header("Host"), Some("example.com"));
        assert!(result.body().is_empty());
    }

    #[test]
    fn test_case_insensitive_headers() {
        let request = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let result = parse_request(request).unwrap();
        assert!(result.has_header("host"));
        assert!(result.has_header("HOST"));
    }

    #[test]
    fn test_http10_does_not_require_host() {
        let result = parse_request(b"GET /status HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(result.version(), HttpVersion::Http10);
    }

    #[test]
    fn test_missing_host_header() {
        let result = parse_request(b"GET / HTTP/1.1\r\n\r\n");
        assert!(matches!(result, Err(Error::MissingHeader(name)) if name == "Host"));
    }

    #[test]
    fn test_invalid_method() {
        let result = parse_request(b"BREW /pot HTTP/1.1\r\nHost: x\r\n\r\n");
        assert!(matches!(result, Err(Error::InvalidMethod(m)) if m == "BREW"));
    }

    #[test]
    fn test_malformed_request_line() {
        let result = parse_request(b"GET /only-two\r\nHost: x\r\n\r\n");
        assert!(matches!(result, Err(Error::MalformedRequestLine(_))));
    }

    #[test]
    fn test_target_must_be_origin_form() {
        let result = parse_request(b"GET hello HTTP/1.1\r\nHost: x\r\n\r\n");
        assert!(matches!(result, Err(Error::InvalidPath(p)) if p == "hello"));
    }

    #[test]
    fn test_unsupported_version() {
        let result = parse_request(b"GET / HTTP/2\r\nHost: x\r\n\r\n");
        assert!(matches!(result, Err(Error::InvalidVersion(_))));
    }

    #[test]
    fn test_bad_header_line() {
        let result = parse_request(b"GET / HTTP/1.1\r\nHost: x\r\nnot-a-header\r\n\r\n");
        assert!(matches!(result, Err(Error::InvalidHeaderFormat(_))));
    }

    #[test]
    fn test_empty_request() {
        assert!(matches!(parse_request(b""), Err(Error::EmptyRequest)));
    }

    #[test]
    fn test_body_is_cut_to_content_length() {
        let request = b"POST /items HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello-trailing";
        let result = parse_request(request).unwrap();
        assert_eq!(result.method(), Method::POST);
        assert_eq!(result.body(), b"hello");
    }

    #[test]
    fn test_query_params_keep_full_path() {
        let result = parse_request(b"GET /search?q=rust&page=2&flag HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(result.path(), "/search?q=rust&page=2&flag");
        assert_eq!(result.get_query_param("q"), Some("rust"));
        assert_eq!(result.get_query_param("page"), Some("2"));
        assert_eq!(result.get_query_param("flag"), Some(""));
        assert_eq!(result.get_query_param("missing"), None);
    }

    #[test]
    fn test_json_body() {
        #[derive(Deserialize)]
        struct Item {
            name: String,
        }

        let request = HttpRequest::new(Method::POST, "/items", HttpVersion::Http11)
            .with_header("Content-Type", "application/json")
            .with_body(br#"{"name":"lamp"}"#.to_vec());
        let item: Item = request.json().unwrap();
        assert_eq!(item.name, "lamp");

        let plain = HttpRequest::new(Method::POST, "/items", HttpVersion::Http11);
        assert!(matches!(plain.json::<Item>(), Err(Error::MissingHeader(_))));
    }

    #[test]
    fn test_header_block_len() {
        assert_eq!(header_block_len(b"GET / HTTP/1.0\r\n\r\nbody"), Some(18));
        assert_eq!(header_block_len(b"GET / HTTP/1.0\r\nHost"), None);
    }
}
