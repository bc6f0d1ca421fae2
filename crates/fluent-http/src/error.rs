//! Error types

use std::fmt;

use bytes::Bytes;
use thiserror::Error;

use crate::body::BodyReader;
use crate::context::HttpClientContext;
use crate::response::RawResponse;

/// Status reported for failures that never produced an HTTP status
/// (I/O error, timeout or cancellation while sending)
pub const TRANSPORT_FAILURE_STATUS: u16 = 499;

/// Result type for request operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the request pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Response status >= 300, or a transport failure reported as [`TRANSPORT_FAILURE_STATUS`]
    #[error(transparent)]
    Http(Box<HttpException>),
    /// No codec for the requested type and content type, or (de)serialization failed
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Auth token provider failure
    #[error("Auth token error: {0}")]
    Auth(String),
    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// Content decoding failed
    #[error("Content decoding error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The [`HttpException`] when this is an HTTP or transport failure
    pub fn http(&self) -> Option<&HttpException> {
        match self {
            Error::Http(exception) => Some(exception),
            _ => None,
        }
    }

    /// Status code of an HTTP or transport failure
    pub fn status_code(&self) -> Option<u16> {
        self.http().map(HttpException::status_code)
    }
}

impl From<HttpException> for Error {
    fn from(exception: HttpException) -> Self {
        Error::Http(Box::new(exception))
    }
}

/// Codec resolution and (de)serialization errors
#[derive(Debug, Error)]
pub enum CodecError {
    /// No writer registered for the type and content type
    #[error("No body writer for {type_name} as {content_type}")]
    NoWriter {
        /// Rust type of the value being written
        type_name: &'static str,
        /// Resolved media type
        content_type: String,
    },
    /// No reader registered for the type and content type
    #[error("No body reader for {type_name} from {content_type}")]
    NoReader {
        /// Requested target type
        type_name: &'static str,
        /// Resolved media type
        content_type: String,
    },
    /// No list reader registered for the type and content type
    #[error("No list reader for {type_name} from {content_type}")]
    NoListReader {
        /// Requested element type
        type_name: &'static str,
        /// Resolved media type
        content_type: String,
    },
    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Form encoding error
    #[error("Form encoding error: {0}")]
    FormEncode(#[from] serde_urlencoded::ser::Error),
    /// Form decoding error
    #[error("Form decoding error: {0}")]
    FormDecode(#[from] serde_urlencoded::de::Error),
    /// Body is not UTF-8
    #[error("Body is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Failures raised by a [`Transport`](crate::transport::Transport) while sending
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection could not be established or was lost
    #[error("Connection error: {0}")]
    Connection(String),
    /// Request timeout
    #[error("Request timeout")]
    Timeout,
    /// Request was cancelled by the caller
    #[error("Request cancelled")]
    Cancelled,
    /// Any other I/O failure
    #[error("I/O error: {0}")]
    Io(String),
}

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connection(err.to_string())
        } else {
            TransportError::Io(err.to_string())
        }
    }
}

/// A failed exchange: a response with status >= 300, or a transport failure
///
/// The body is kept as received. [`body_as_bytes`](Self::body_as_bytes),
/// [`body_as_string`](Self::body_as_string) and [`bean`](Self::bean) decode it
/// on demand through the owning context, the same way a successful response is
/// decoded.
pub struct HttpException {
    status: u16,
    response: Option<RawResponse>,
    cause: Option<TransportError>,
    context: HttpClientContext,
}

impl HttpException {
    pub(crate) fn from_response(context: HttpClientContext, response: RawResponse) -> Self {
        Self {
            status: response.status(),
            response: Some(response),
            cause: None,
            context,
        }
    }

    pub(crate) fn from_transport(context: HttpClientContext, cause: TransportError) -> Self {
        Self {
            status: TRANSPORT_FAILURE_STATUS,
            response: None,
            cause: Some(cause),
            context,
        }
    }

    /// HTTP status code, or [`TRANSPORT_FAILURE_STATUS`] for transport failures
    pub fn status_code(&self) -> u16 {
        self.status
    }

    /// The raw response, absent for transport failures
    pub fn response(&self) -> Option<&RawResponse> {
        self.response.as_ref()
    }

    /// Transport failure that caused this exception
    pub fn cause(&self) -> Option<&TransportError> {
        self.cause.as_ref()
    }

    /// True when no HTTP response was received
    pub fn is_transport_failure(&self) -> bool {
        self.cause.is_some()
    }

    /// True when the request was cancelled while sending
    pub fn is_cancelled(&self) -> bool {
        matches!(self.cause, Some(TransportError::Cancelled))
    }

    /// True when the request timed out while sending
    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, Some(TransportError::Timeout))
    }

    /// Body bytes after content decoding (empty for transport failures)
    pub fn body_as_bytes(&self) -> Result<Bytes> {
        match &self.response {
            Some(response) => Ok(self.context.read_content(response)?.into_content()),
            None => Ok(Bytes::new()),
        }
    }

    /// Body decoded as UTF-8 text
    pub fn body_as_string(&self) -> Result<String> {
        let bytes = self.body_as_bytes()?;
        let text = std::str::from_utf8(&bytes).map_err(CodecError::from)?;
        Ok(text.to_owned())
    }

    /// Body decoded into `T` using the reader registered for the response content type
    pub fn bean<T: 'static>(&self) -> Result<T> {
        let content = match &self.response {
            Some(response) => self.context.read_content(response)?,
            None => return Err(Error::InvalidRequest("no response body to decode".into())),
        };
        Ok(self.context.converters().read_bean(&content)?)
    }

    /// Body decoded with an explicit reader
    pub fn read<T>(&self, reader: &dyn BodyReader<T>) -> Result<T> {
        let content = match &self.response {
            Some(response) => self.context.read_content(response)?,
            None => return Err(Error::InvalidRequest("no response body to decode".into())),
        };
        Ok(reader.read(&content)?)
    }
}

impl fmt::Debug for HttpException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpException")
            .field("status", &self.status)
            .field("response", &self.response)
            .field("cause", &self.cause)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for HttpException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "HTTP transport failure ({}): {}", self.status, cause),
            None => write!(f, "HTTP error ({})", self.status),
        }
    }
}

impl std::error::Error for HttpException {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ResponseHead;

    fn context() -> HttpClientContext {
        crate::test_support::context(crate::test_support::ScriptedTransport::default())
    }

    #[test]
    fn test_transport_error_display() {
        assert_eq!(TransportError::Timeout.to_string(), "Request timeout");
        assert_eq!(TransportError::Cancelled.to_string(), "Request cancelled");
        assert_eq!(
            TransportError::Connection("refused".into()).to_string(),
            "Connection error: refused"
        );
    }

    #[test]
    fn test_codec_error_display() {
        let error = CodecError::NoReader {
            type_name: "String",
            content_type: "application/xml".into(),
        };
        assert_eq!(
            error.to_string(),
            "No body reader for String from application/xml"
        );
    }

    #[test]
    fn test_transport_exception_uses_sentinel_status() {
        let exception = HttpException::from_transport(context(), TransportError::Timeout);
        assert_eq!(exception.status_code(), TRANSPORT_FAILURE_STATUS);
        assert!(exception.is_transport_failure());
        assert!(exception.is_timeout());
        assert!(!exception.is_cancelled());
        assert!(exception.response().is_none());
        assert_eq!(
            exception.to_string(),
            "HTTP transport failure (499): Request timeout"
        );
        assert!(std::error::Error::source(&exception).is_some());
        assert!(exception
            .body_as_bytes()
            .expect("Empty body for transport failure")
            .is_empty());
    }

    #[test]
    fn test_status_exception_keeps_raw_body() {
        let head = ResponseHead::from_pairs(503, &[("content-type", "text/plain")]);
        let raw = RawResponse::new(head, Bytes::from_static(b"try later"));
        let error: Error = HttpException::from_response(context(), raw).into();

        assert_eq!(error.status_code(), Some(503));
        assert_eq!(error.to_string(), "HTTP error (503)");
        let exception = error.http().expect("Should be an HTTP failure");
        assert_eq!(
            exception.body_as_string().expect("Body should be text"),
            "try later"
        );
    }

    #[test]
    fn test_non_http_errors_have_no_status() {
        let error = Error::InvalidRequest("no base url".into());
        assert!(error.http().is_none());
        assert_eq!(error.status_code(), None);
        assert_eq!(error.to_string(), "Invalid request: no base url");
    }
}
