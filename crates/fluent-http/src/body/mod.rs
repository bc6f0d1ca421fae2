//! Request and response bodies and the codecs that convert them
//!
//! A [`BodyContent`] is a content type plus bytes. Codecs convert between
//! typed values and body content in three shapes: a single value written
//! ([`BodyWriter`]), a single value read ([`BodyReader`]) and a list read
//! ([`ListReader`]). The [`BodyAdapter`] registry selects the codec for a
//! type and media type.

mod adapter;
mod form;
mod json;
mod text;

use bytes::Bytes;

pub use self::adapter::{BodyAdapter, BodyAdapterBuilder};
pub(crate) use self::form::encode_pairs;
pub use self::form::FormCodec;
pub use self::json::JsonCodec;
pub use self::text::TextCodec;
use crate::error::CodecError;

/// `application/json`
pub const APPLICATION_JSON: &str = "application/json";
/// `application/x-www-form-urlencoded`
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
/// `text/plain`
pub const TEXT_PLAIN: &str = "text/plain";
/// Newline-delimited JSON, one value per line
pub const JSON_STREAM: &str = "application/x-json-stream";

/// Content type and payload of a body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyContent {
    content_type: String,
    content: Bytes,
}

impl BodyContent {
    /// Create body content
    pub fn new(content_type: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.into(),
            content: content.into(),
        }
    }

    /// Full content type as given (may carry parameters such as `charset`)
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Payload
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Payload as UTF-8 text
    pub fn as_str(&self) -> Result<&str, CodecError> {
        Ok(std::str::from_utf8(&self.content)?)
    }

    /// Take the payload
    pub fn into_content(self) -> Bytes {
        self.content
    }
}

/// Writes a value as body content
pub trait BodyWriter<T>: Send + Sync {
    /// Encode `bean` as `content_type`
    fn write(&self, bean: &T, content_type: &str) -> Result<BodyContent, CodecError>;
}

/// Reads a single value from body content
pub trait BodyReader<T>: Send + Sync {
    /// Decode one value
    fn read(&self, content: &BodyContent) -> Result<T, CodecError>;
}

/// Reads a list of values from body content
pub trait ListReader<T>: Send + Sync {
    /// Decode every value of a list-shaped body
    fn read_list(&self, content: &BodyContent) -> Result<Vec<T>, CodecError>;
}

/// Media type of a content type: lowercased, parameters removed
///
/// `Application/JSON; charset=UTF-8` becomes `application/json`.
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
