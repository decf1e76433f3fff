use axum::extract::{ConnectInfo, Request};
use axum::http::{header, HeaderMap, HeaderName, Method, StatusCode, Uri, Version};
use chrono::{DateTime, TimeZone};
use std::net::SocketAddr;

/// Status used in the log line when no response was ever observed, i.e. the
/// handler panicked or the request was cancelled before a response existed.
/// Matches the implicit status the server sends on first write.
const DEFAULT_STATUS: u16 = 200;

/// Placeholder for fields the request did not supply.
const DASH: &str = "-";

const TIMESTAMP_LAYOUT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Everything a Common Log Format line needs, captured from the request up
/// front and from the response as it is observed.
#[derive(Debug)]
pub(crate) struct Entry {
    client_ip: String,
    method: Method,
    uri: Uri,
    version: Version,
    referer: String,
    user_agent: String,
    status: Option<StatusCode>,
    bytes_written: u64,
}

impl Entry {
    /// Snapshots the request-side fields before the inner handler can
    /// consume or rewrite the request.
    pub(crate) fn capture(req: &Request) -> Entry {
        Entry {
            client_ip: client_ip(req),
            method: req.method().clone(),
            uri: req.uri().clone(),
            version: req.version(),
            referer: header_or_dash(req.headers(), header::REFERER),
            user_agent: header_or_dash(req.headers(), header::USER_AGENT),
            status: None,
            bytes_written: 0,
        }
    }

    pub(crate) fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    pub(crate) fn add_bytes(&mut self, count: u64) {
        self.bytes_written += count;
    }

    /// Renders the line, with `at` as the request-completion timestamp.
    pub(crate) fn render<Tz: TimeZone>(&self, at: DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        let status = self.status.map_or(DEFAULT_STATUS, |s| s.as_u16());
        format!(
            "{} - - [{}] \"{} {} {:?}\" {} {} \"{}\" \"{}\"",
            self.client_ip,
            at.format(TIMESTAMP_LAYOUT),
            self.method,
            self.uri,
            self.version,
            status,
            self.bytes_written,
            self.referer,
            self.user_agent,
        )
    }
}

/// The client IP without the port, from the connect-info extension the
/// server attaches when built with `into_make_service_with_connect_info`.
fn client_ip(req: &Request) -> String {
    match req.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => addr.ip().to_string(),
        None => DASH.to_string(),
    }
}

fn header_or_dash(headers: &HeaderMap, name: HeaderName) -> String {
    match headers.get(&name).and_then(|value| value.to_str().ok()) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => DASH.to_string(),
    }
}

#[cfg(test)]
mod test {
    use axum::body::Body;
    use chrono::FixedOffset;

    use super::*;

    fn fixed_time() -> DateTime<FixedOffset> {
        FixedOffset::west_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2006, 1, 2, 15, 4, 5)
            .unwrap()
    }

    fn request_with_addr(uri: &str) -> Request {
        let mut req = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 54321))));
        req
    }

    #[test]
    fn test_render_exact_format() {
        let mut req = request_with_addr("/user/keys/testing");
        req.headers_mut()
            .insert(header::USER_AGENT, "TestAgent/1.0".parse().unwrap());

        let mut entry = Entry::capture(&req);
        entry.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        entry.add_bytes(21);

        assert_eq!(
            entry.render(fixed_time()),
            "127.0.0.1 - - [02/Jan/2006:15:04:05 -0700] \
             \"GET /user/keys/testing HTTP/1.1\" 500 21 \"-\" \"TestAgent/1.0\""
        );
    }

    #[test]
    fn test_render_substitutes_default_status() {
        let entry = Entry::capture(&request_with_addr("/"));
        let line = entry.render(fixed_time());
        assert!(line.contains("\" 200 0 \""), "unexpected line: {}", line);
    }

    #[test]
    fn test_client_ip_has_no_port() {
        let entry = Entry::capture(&request_with_addr("/"));
        let line = entry.render(fixed_time());
        assert!(line.starts_with("127.0.0.1 "));
        assert!(!line.contains("54321"));
    }

    #[test]
    fn test_client_ip_dash_without_connect_info() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let line = Entry::capture(&req).render(fixed_time());
        assert!(line.starts_with("- - - ["));
    }

    #[test]
    fn test_uri_keeps_query_string() {
        let entry = Entry::capture(&request_with_addr("/search?q=rust&page=2"));
        let line = entry.render(fixed_time());
        assert!(line.contains("\"GET /search?q=rust&page=2 HTTP/1.1\""));
    }

    #[test]
    fn test_empty_headers_render_as_dash() {
        let mut req = request_with_addr("/");
        req.headers_mut()
            .insert(header::REFERER, "".parse().unwrap());

        let line = Entry::capture(&req).render(fixed_time());
        assert!(line.ends_with("\"-\" \"-\""));
    }

    #[test]
    fn test_present_headers_render_verbatim() {
        let mut req = request_with_addr("/");
        req.headers_mut()
            .insert(header::REFERER, "https://example.com/".parse().unwrap());
        req.headers_mut()
            .insert(header::USER_AGENT, "curl/8.0".parse().unwrap());

        let line = Entry::capture(&req).render(fixed_time());
        assert!(line.ends_with("\"https://example.com/\" \"curl/8.0\""));
    }
}
