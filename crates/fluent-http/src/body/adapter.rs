//! Codec registry keyed by shape, type and media type

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{
    media_type, BodyContent, BodyReader, BodyWriter, FormCodec, JsonCodec, ListReader, TextCodec,
    APPLICATION_JSON, FORM_URLENCODED, TEXT_PLAIN,
};
use crate::error::CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Shape {
    Writer,
    Reader,
    ListReader,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CodecKey {
    shape: Shape,
    type_id: TypeId,
    media_type: String,
}

impl CodecKey {
    fn of<T: 'static>(shape: Shape, content_type: &str) -> Self {
        Self {
            shape,
            type_id: TypeId::of::<T>(),
            media_type: media_type(content_type),
        }
    }
}

/// Registry of body codecs
///
/// Built once through [`BodyAdapter::builder`] and read-only afterwards. Each
/// entry is an `Arc<dyn BodyWriter<T>>`, `Arc<dyn BodyReader<T>>` or
/// `Arc<dyn ListReader<T>>` stored behind `Any` and recovered by the type id
/// in its key.
pub struct BodyAdapter {
    default_content_type: String,
    codecs: HashMap<CodecKey, Box<dyn Any + Send + Sync>>,
}

impl fmt::Debug for BodyAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyAdapter")
            .field("default_content_type", &self.default_content_type)
            .field("codecs", &self.codecs.len())
            .finish()
    }
}

impl Default for BodyAdapter {
    fn default() -> Self {
        Self::builder().default_content_type(TEXT_PLAIN).text().build()
    }
}

impl BodyAdapter {
    /// Create a new registry builder
    pub fn builder() -> BodyAdapterBuilder {
        BodyAdapterBuilder::default()
    }

    /// Content type used when the caller or the response does not name one
    pub fn default_content_type(&self) -> &str {
        &self.default_content_type
    }

    /// Replace the default content type
    pub fn with_default_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.default_content_type = content_type.into();
        self
    }

    fn resolve<'a>(&'a self, content_type: Option<&'a str>) -> &'a str {
        match content_type {
            Some(content_type) if !content_type.trim().is_empty() => content_type,
            _ => &self.default_content_type,
        }
    }

    fn lookup<C>(&self, key: &CodecKey) -> Option<Arc<C>>
    where
        C: ?Sized + 'static,
    {
        self.codecs
            .get(key)
            .and_then(|codec| codec.downcast_ref::<Arc<C>>())
            .cloned()
    }

    /// Writer for `T` as `content_type` (or the default content type)
    pub fn bean_writer<T: 'static>(
        &self,
        content_type: Option<&str>,
    ) -> Result<Arc<dyn BodyWriter<T>>, CodecError> {
        let content_type = self.resolve(content_type);
        let key = CodecKey::of::<T>(Shape::Writer, content_type);
        self.lookup::<dyn BodyWriter<T>>(&key)
            .ok_or_else(|| CodecError::NoWriter {
                type_name: type_name::<T>(),
                content_type: key.media_type,
            })
    }

    /// Reader for `T` from `content_type` (or the default content type)
    pub fn bean_reader<T: 'static>(
        &self,
        content_type: Option<&str>,
    ) -> Result<Arc<dyn BodyReader<T>>, CodecError> {
        let content_type = self.resolve(content_type);
        let key = CodecKey::of::<T>(Shape::Reader, content_type);
        self.lookup::<dyn BodyReader<T>>(&key)
            .ok_or_else(|| CodecError::NoReader {
                type_name: type_name::<T>(),
                content_type: key.media_type,
            })
    }

    /// List reader for `T` from `content_type` (or the default content type)
    pub fn list_reader<T: 'static>(
        &self,
        content_type: Option<&str>,
    ) -> Result<Arc<dyn ListReader<T>>, CodecError> {
        let content_type = self.resolve(content_type);
        let key = CodecKey::of::<T>(Shape::ListReader, content_type);
        self.lookup::<dyn ListReader<T>>(&key)
            .ok_or_else(|| CodecError::NoListReader {
                type_name: type_name::<T>(),
                content_type: key.media_type,
            })
    }

    /// Write `bean` with the writer registered for its type
    pub fn write<T: 'static>(
        &self,
        bean: &T,
        content_type: Option<&str>,
    ) -> Result<BodyContent, CodecError> {
        let content_type = self.resolve(content_type);
        self.bean_writer::<T>(Some(content_type))?.write(bean, content_type)
    }

    /// Read a single `T` using the content type carried by `content`
    pub fn read_bean<T: 'static>(&self, content: &BodyContent) -> Result<T, CodecError> {
        self.bean_reader::<T>(Some(content.content_type()))?.read(content)
    }

    /// Read a list of `T` using the content type carried by `content`
    pub fn read_list<T: 'static>(&self, content: &BodyContent) -> Result<Vec<T>, CodecError> {
        self.list_reader::<T>(Some(content.content_type()))?.read_list(content)
    }
}

/// Builder for [`BodyAdapter`]
pub struct BodyAdapterBuilder {
    default_content_type: String,
    codecs: HashMap<CodecKey, Box<dyn Any + Send + Sync>>,
}

impl Default for BodyAdapterBuilder {
    fn default() -> Self {
        Self {
            default_content_type: APPLICATION_JSON.to_string(),
            codecs: HashMap::new(),
        }
    }
}

impl fmt::Debug for BodyAdapterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyAdapterBuilder")
            .field("default_content_type", &self.default_content_type)
            .field("codecs", &self.codecs.len())
            .finish()
    }
}

impl BodyAdapterBuilder {
    /// Content type for outgoing bodies without an explicit one, and for
    /// responses without a `Content-Type` header
    pub fn default_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.default_content_type = content_type.into();
        self
    }

    /// Register a writer for `T` as `media_type`
    pub fn writer<T, W>(mut self, media_type: &str, writer: W) -> Self
    where
        T: 'static,
        W: BodyWriter<T> + 'static,
    {
        let writer: Arc<dyn BodyWriter<T>> = Arc::new(writer);
        self.codecs.insert(
            CodecKey::of::<T>(Shape::Writer, media_type),
            Box::new(writer),
        );
        self
    }

    /// Register a reader for `T` from `media_type`
    pub fn reader<T, R>(mut self, media_type: &str, reader: R) -> Self
    where
        T: 'static,
        R: BodyReader<T> + 'static,
    {
        let reader: Arc<dyn BodyReader<T>> = Arc::new(reader);
        self.codecs.insert(
            CodecKey::of::<T>(Shape::Reader, media_type),
            Box::new(reader),
        );
        self
    }

    /// Register a list reader for `T` from `media_type`
    pub fn list_reader<T, R>(mut self, media_type: &str, reader: R) -> Self
    where
        T: 'static,
        R: ListReader<T> + 'static,
    {
        let reader: Arc<dyn ListReader<T>> = Arc::new(reader);
        self.codecs.insert(
            CodecKey::of::<T>(Shape::ListReader, media_type),
            Box::new(reader),
        );
        self
    }

    /// JSON writer, reader and list reader for `T`
    pub fn json<T>(self) -> Self
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        self.json_writer::<T>().json_reader::<T>()
    }

    /// JSON reader and list reader for `T`
    pub fn json_reader<T>(self) -> Self
    where
        T: DeserializeOwned + 'static,
    {
        self.reader::<T, _>(APPLICATION_JSON, JsonCodec::<T>::new())
            .list_reader::<T, _>(APPLICATION_JSON, JsonCodec::<T>::new())
    }

    /// JSON writer for `T`
    pub fn json_writer<T>(self) -> Self
    where
        T: Serialize + 'static,
    {
        self.writer::<T, _>(APPLICATION_JSON, JsonCodec::<T>::new())
    }

    /// `application/x-www-form-urlencoded` writer and reader for `T`
    pub fn form<T>(self) -> Self
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        self.writer::<T, _>(FORM_URLENCODED, FormCodec::<T>::new())
            .reader::<T, _>(FORM_URLENCODED, FormCodec::<T>::new())
    }

    /// `text/plain` writer and reader for `String`
    pub fn text(self) -> Self {
        self.writer::<String, _>(TEXT_PLAIN, TextCodec)
            .reader::<String, _>(TEXT_PLAIN, TextCodec)
    }

    /// Build the registry
    pub fn build(self) -> BodyAdapter {
        BodyAdapter {
            default_content_type: self.default_content_type,
            codecs: self.codecs,
        }
    }
}
