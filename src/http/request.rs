//! HTTP/1.1 request parsing using the [`httparse`] crate.

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method};
use crate::context::Extensions;

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete — more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

/// A parsed HTTP/1.1 request plus the per-request [`Extensions`] the host attaches
/// before routing.
///
/// The path is kept exactly as received, minus the query string. The router treats
/// it as opaque bytes; see [`raw_path`](Self::raw_path). It is held in a [`Bytes`]
/// so route remainders can share it instead of copying.
///
/// # Examples
///
/// ```
/// use rtrie::http::request::Request;
///
/// let raw = b"GET /api/v1/widgets?page=2 HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.path(), "/api/v1/widgets");
/// assert_eq!(request.raw_path(), b"/api/v1/widgets");
/// assert_eq!(request.query_string(), Some("page=2"));
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    /// Always valid UTF-8: built from a `&str` target.
    path: Bytes,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    query: Option<String>,
    body: Bytes,
    extensions: Extensions,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Builds a request without going through the wire parser.
    ///
    /// `target` may carry a query string; it is split off the same way
    /// [`parse`](Self::parse) does.
    ///
    /// ```
    /// use rtrie::http::{Method, Request};
    ///
    /// let request = Request::new(Method::Get, "/status?verbose");
    /// assert_eq!(request.path(), "/status");
    /// assert!(request.extensions().is_empty());
    /// ```
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            method,
            path,
            version: 1,
            headers: Headers::new(),
            query,
            body: Bytes::new(),
            extensions: Extensions::new(),
        }
    }

    /// Parse a raw HTTP/1.1 request from a byte slice.
    ///
    /// Returns the parsed `Request` and the byte offset at which the body begins
    /// in `buf` (i.e. immediately after the `\r\n\r\n` header terminator).
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`] — more data is needed to complete the request headers.
    /// - [`RequestError::Parse`] — the data is malformed and cannot be parsed.
    /// - [`RequestError::MissingField`] — a required field (method, path, version) is absent.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method = raw_req
            .method
            .ok_or(RequestError::MissingField { field: "method" })?;
        let method = match method.parse::<Method>() {
            Ok(method) => method,
            Err(never) => match never {},
        };

        let target = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;
        let (path, query) = split_target(target);

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        let body = Bytes::copy_from_slice(&buf[body_offset..]);

        Ok((
            Self {
                method,
                path,
                version,
                headers: header_map,
                query,
                body,
                extensions: Extensions::new(),
            },
            body_offset,
        ))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path (without the query string).
    pub fn path(&self) -> &str {
        std::str::from_utf8(&self.path).unwrap_or_default()
    }

    /// The path as the byte sequence the router matches against.
    pub fn raw_path(&self) -> &[u8] {
        &self.path
    }

    /// A shared handle on the path; cloning it does not copy the bytes.
    pub fn path_bytes(&self) -> Bytes {
        self.path.clone()
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the raw query string (without the leading `?`), if any. Never parsed.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Replaces the body, e.g. once the host has buffered exactly `Content-Length` bytes.
    pub fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }

    /// Values injected by the host for this request only.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Returns `true` if the connection should be kept alive after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive. HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive` is explicitly set.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }

    /// Returns the value of the `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.parse().ok()
    }
}

// Split a request target into path and raw query.
fn split_target(target: &str) -> (Bytes, Option<String>) {
    match target.split_once('?') {
        Some((path, query)) => (Bytes::copy_from_slice(path.as_bytes()), Some(query.to_owned())),
        None => (Bytes::copy_from_slice(target.as_bytes()), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (req, offset) = Request::parse(raw).unwrap();
        assert_eq!(req.method(), &Method::Get);
        assert_eq!(req.path(), "/");
        assert_eq!(req.version(), 1);
        assert_eq!(req.headers().get("host"), Some("localhost"));
        assert_eq!(offset, raw.len());
    }

    #[test]
    fn query_is_split_but_not_parsed() {
        let raw = b"GET /search?q=a+b&page=2 HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.raw_path(), b"/search");
        assert_eq!(req.query_string(), Some("q=a+b&page=2"));
    }

    #[test]
    fn incomplete_request() {
        let raw = b"GET / HTTP/1.1\r\nHost:";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }

    #[test]
    fn keep_alive_defaults_follow_version() {
        let (req, _) = Request::parse(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        assert!(req.is_keep_alive());
        let (req, _) = Request::parse(b"GET / HTTP/1.0\r\n\r\n").unwrap();
        assert!(!req.is_keep_alive());
    }

    #[test]
    fn connection_close() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert!(!req.is_keep_alive());
    }

    #[test]
    fn content_length() {
        let raw = b"POST / HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhello";
        let (req, body_offset) = Request::parse(raw).unwrap();
        assert_eq!(req.content_length(), Some(5));
        assert_eq!(&raw[body_offset..], b"hello");
    }

    #[test]
    fn parsed_request_starts_without_extensions() {
        let (mut req, _) = Request::parse(b"GET /x HTTP/1.1\r\n\r\n").unwrap();
        assert!(req.extensions().is_empty());
        req.extensions_mut().insert(7u32);
        assert_eq!(req.extensions().get::<u32>(), Some(&7));
    }

    #[test]
    fn new_splits_target() {
        let req = Request::new(Method::Post, "/update?force=1");
        assert_eq!(req.method(), &Method::Post);
        assert_eq!(req.path(), "/update");
        assert_eq!(req.query_string(), Some("force=1"));
        assert!(req.body().is_empty());
    }

    #[test]
    fn path_bytes_share_storage() {
        let req = Request::new(Method::Get, "/files/a.txt");
        let shared = req.path_bytes();
        assert_eq!(&shared[..], b"/files/a.txt");
        assert_eq!(shared.as_ptr(), req.raw_path().as_ptr());
    }
}
