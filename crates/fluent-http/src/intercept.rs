//! Hooks around request execution

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::header::AUTHORIZATION;
use http::Method;
use tracing::Level;

use crate::error::TRANSPORT_FAILURE_STATUS;
use crate::request::HttpClientRequest;
use crate::response::ResponseHead;

/// Summary of a completed exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEvent {
    /// HTTP method
    pub method: Method,
    /// Requested URL
    pub url: String,
    /// Response status, or [`TRANSPORT_FAILURE_STATUS`] when no response arrived
    pub status: u16,
    /// Time from dispatch until the response (or failure) was observed
    pub elapsed: Duration,
}

impl RequestEvent {
    /// True when no HTTP response was received
    pub fn is_transport_failure(&self) -> bool {
        self.status == TRANSPORT_FAILURE_STATUS
    }
}

/// Observes completed exchanges
pub trait RequestListener: Send + Sync {
    /// Called once per exchange, on success and failure alike
    fn response(&self, event: &RequestEvent);
}

/// Mutates requests before they are sent and inspects responses afterwards
pub trait RequestIntercept: Send + Sync {
    /// Called before the request is sent, after auth token injection
    fn before_request(&self, request: &mut HttpClientRequest) {
        let _ = request;
    }

    /// Called after the exchange; `response` is `None` on transport failure
    fn after_response(&self, response: Option<&ResponseHead>, request: &HttpClientRequest) {
        let _ = (response, request);
    }
}

macro_rules! log_completed {
    ($level:ident, $event:ident, $elapsed_ms:ident) => {
        tracing::$level!(
            method = %$event.method,
            url = %$event.url,
            status = $event.status,
            elapsed_ms = $elapsed_ms,
            "HTTP request completed"
        )
    };
}

/// Logs one line per exchange
///
/// Successful exchanges log at the configured level (`info` by default),
/// failures always at `warn`.
#[derive(Debug, Clone, Copy)]
pub struct RequestLogger {
    success_level: Level,
}

impl Default for RequestLogger {
    fn default() -> Self {
        Self {
            success_level: Level::INFO,
        }
    }
}

impl RequestLogger {
    /// Logger with successful exchanges at `info`
    pub fn new() -> Self {
        Self::default()
    }

    /// Log successful exchanges at `level`; anything above `info` is
    /// treated as `info`
    pub fn with_success_level(mut self, level: Level) -> Self {
        self.success_level = level;
        self
    }

    /// Level successful exchanges are logged at
    pub fn success_level(&self) -> Level {
        self.success_level
    }
}

impl RequestListener for RequestLogger {
    fn response(&self, event: &RequestEvent) {
        let elapsed_ms = u64::try_from(event.elapsed.as_millis()).unwrap_or(u64::MAX);
        if event.status < 300 {
            if self.success_level == Level::TRACE {
                log_completed!(trace, event, elapsed_ms);
            } else if self.success_level == Level::DEBUG {
                log_completed!(debug, event, elapsed_ms);
            } else {
                log_completed!(info, event, elapsed_ms);
            }
        } else {
            tracing::warn!(
                method = %event.method,
                url = %event.url,
                status = event.status,
                elapsed_ms,
                "HTTP request failed"
            );
        }
    }
}

/// Adds an HTTP Basic `Authorization` header to every request
#[derive(Clone)]
pub struct BasicAuthIntercept {
    header: String,
}

impl std::fmt::Debug for BasicAuthIntercept {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuthIntercept").finish_non_exhaustive()
    }
}

impl BasicAuthIntercept {
    /// Intercept sending `username:password`
    pub fn new(username: impl AsRef<str>, password: impl AsRef<str>) -> Self {
        let credentials = format!("{}:{}", username.as_ref(), password.as_ref());
        Self {
            header: format!("Basic {}", STANDARD.encode(credentials)),
        }
    }
}

impl RequestIntercept for BasicAuthIntercept {
    fn before_request(&self, request: &mut HttpClientRequest) {
        request.insert_header(AUTHORIZATION.as_str(), self.header.clone());
    }
}
