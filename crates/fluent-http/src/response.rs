//! HTTP response types

use bytes::Bytes;
use http::header::{CONTENT_ENCODING, CONTENT_TYPE};
use http::HeaderMap;

/// Status and headers of a response
#[derive(Debug, Clone)]
pub struct ResponseHead {
    status: u16,
    headers: HeaderMap,
}

impl ResponseHead {
    /// Create a response head
    pub fn new(status: u16, headers: HeaderMap) -> Self {
        Self { status, headers }
    }

    /// Get the HTTP status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Response headers (case-insensitive multimap)
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if present and valid text
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// First `Content-Type` value
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// First `Content-Encoding` value
    pub fn content_encoding(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
    }

    /// Check if the response status is a success (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if the response status is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if the response status is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    #[cfg(test)]
    pub(crate) fn from_pairs(status: u16, headers: &[(&'static str, &'static str)]) -> Self {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            let name = http::HeaderName::from_bytes(name.as_bytes()).expect("Valid header name");
            map.append(name, http::HeaderValue::from_static(value));
        }
        Self::new(status, map)
    }
}

/// Response with its body exactly as received (not content-decoded)
#[derive(Debug, Clone)]
pub struct RawResponse {
    head: ResponseHead,
    body: Bytes,
}

impl RawResponse {
    /// Create a raw response
    pub fn new(head: ResponseHead, body: Bytes) -> Self {
        Self { head, body }
    }

    /// Status and headers
    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    /// Get the HTTP status code
    pub fn status(&self) -> u16 {
        self.head.status
    }

    /// Response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// Undecoded body bytes
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Split into head and body
    pub fn into_parts(self) -> (ResponseHead, Bytes) {
        (self.head, self.body)
    }
}

/// Completed exchange: status, headers and a converted body
#[derive(Debug, Clone)]
pub struct HttpResponse<T> {
    head: ResponseHead,
    body: T,
}

impl<T> HttpResponse<T> {
    pub(crate) fn new(head: ResponseHead, body: T) -> Self {
        Self { head, body }
    }

    /// Get the HTTP status code
    pub fn status(&self) -> u16 {
        self.head.status
    }

    /// Response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// Status and headers
    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    /// Response body
    pub fn body(&self) -> &T {
        &self.body
    }

    /// Take the body
    pub fn into_body(self) -> T {
        self.body
    }
}
