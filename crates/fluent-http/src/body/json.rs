//! JSON codec

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{BodyContent, BodyReader, BodyWriter, ListReader};
use crate::error::CodecError;

/// `serde_json` writer, reader and list reader for `T`
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    /// Create a JSON codec
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonCodec<{}>", std::any::type_name::<T>())
    }
}

impl<T: Serialize> BodyWriter<T> for JsonCodec<T> {
    fn write(&self, bean: &T, content_type: &str) -> Result<BodyContent, CodecError> {
        let bytes = serde_json::to_vec(bean)?;
        Ok(BodyContent::new(content_type, bytes))
    }
}

impl<T: DeserializeOwned> BodyReader<T> for JsonCodec<T> {
    fn read(&self, content: &BodyContent) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(content.content())?)
    }
}

impl<T: DeserializeOwned> ListReader<T> for JsonCodec<T> {
    fn read_list(&self, content: &BodyContent) -> Result<Vec<T>, CodecError> {
        Ok(serde_json::from_slice(content.content())?)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::body::APPLICATION_JSON;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct SimpleData {
        id: i64,
        name: String,
    }

    #[test]
    fn test_reads_list_body() {
        let content = BodyContent::new(
            APPLICATION_JSON,
            r#"[{"id":1,"name":"one"},{"id":2,"name":"two"}]"#,
        );
        let list = JsonCodec::<SimpleData>::new()
            .read_list(&content)
            .expect("List body should decode");
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].name, "two");
    }

    #[test]
    fn test_invalid_json_is_codec_error() {
        let content = BodyContent::new(APPLICATION_JSON, "not json");
        let result = JsonCodec::<SimpleData>::new().read(&content);
        assert!(matches!(result, Err(CodecError::Json(_))));
    }

    #[test]
    fn test_writer_keeps_requested_content_type() {
        let content = JsonCodec::<SimpleData>::new()
            .write(
                &SimpleData {
                    id: 3,
                    name: "three".into(),
                },
                "application/json; charset=UTF-8",
            )
            .expect("Serialization should succeed");
        assert_eq!(content.content_type(), "application/json; charset=UTF-8");
        assert_eq!(
            content.as_str().expect("UTF-8"),
            r#"{"id":3,"name":"three"}"#
        );
    }
}
