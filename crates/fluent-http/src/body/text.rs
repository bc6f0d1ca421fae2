//! Plain text codec

use super::{BodyContent, BodyReader, BodyWriter};
use crate::error::CodecError;

/// UTF-8 text writer and reader for `String`
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl BodyWriter<String> for TextCodec {
    fn write(&self, bean: &String, content_type: &str) -> Result<BodyContent, CodecError> {
        Ok(BodyContent::new(content_type, bean.clone()))
    }
}

impl BodyReader<String> for TextCodec {
    fn read(&self, content: &BodyContent) -> Result<String, CodecError> {
        Ok(content.as_str()?.to_owned())
    }
}
