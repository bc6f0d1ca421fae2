//! `application/x-www-form-urlencoded` codec

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{BodyContent, BodyReader, BodyWriter};
use crate::error::CodecError;

/// `serde_urlencoded` writer and reader for `T`
pub struct FormCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> FormCodec<T> {
    /// Create a form codec
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for FormCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for FormCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FormCodec<{}>", std::any::type_name::<T>())
    }
}

impl<T: Serialize> BodyWriter<T> for FormCodec<T> {
    fn write(&self, bean: &T, content_type: &str) -> Result<BodyContent, CodecError> {
        let encoded = serde_urlencoded::to_string(bean)?;
        Ok(BodyContent::new(content_type, encoded))
    }
}

impl<T: DeserializeOwned> BodyReader<T> for FormCodec<T> {
    fn read(&self, content: &BodyContent) -> Result<T, CodecError> {
        Ok(serde_urlencoded::from_bytes(content.content())?)
    }
}

/// Encode ordered name/value pairs as a form body
pub(crate) fn encode_pairs(pairs: &[(String, String)]) -> Result<String, CodecError> {
    Ok(serde_urlencoded::to_string(pairs)?)
}
