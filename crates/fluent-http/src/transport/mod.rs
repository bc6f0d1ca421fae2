//! Transport boundary
//!
//! The pipeline hands a fully resolved [`TransportRequest`] to a [`Transport`]
//! and gets back status, headers and a [`ResponseBody`]. Connection handling,
//! TLS and wire framing live entirely behind this trait.

use std::fmt::Debug;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use http::{HeaderMap, Method};
use url::Url;

use crate::error::TransportError;

#[cfg(feature = "reqwest")]
mod reqwest_backend;

#[cfg(feature = "reqwest")]
pub use reqwest_backend::ReqwestTransport;

/// How the transport should hand back the response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// Read the whole body before returning
    Buffered,
    /// Return the body as a byte stream
    Streaming,
    /// Never materialize the body
    Discard,
}

/// Boxed stream of body chunks
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Request handed to a transport
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: Url,
    /// Request headers
    pub headers: HeaderMap,
    /// Encoded body
    pub body: Option<Bytes>,
}

/// Response body as produced by a transport
pub enum ResponseBody {
    /// Fully read body
    Bytes(Bytes),
    /// Body still arriving
    Stream(ByteStream),
    /// No body (discarded or none sent)
    Empty,
}

impl Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseBody::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            ResponseBody::Stream(_) => f.write_str("Stream"),
            ResponseBody::Empty => f.write_str("Empty"),
        }
    }
}

impl ResponseBody {
    /// Read the remaining body into memory
    pub async fn collect(self) -> Result<Bytes, TransportError> {
        match self {
            ResponseBody::Bytes(bytes) => Ok(bytes),
            ResponseBody::Empty => Ok(Bytes::new()),
            ResponseBody::Stream(stream) => {
                let buffer = stream
                    .try_fold(BytesMut::new(), |mut buffer, chunk| async move {
                        buffer.extend_from_slice(&chunk);
                        Ok(buffer)
                    })
                    .await?;
                Ok(buffer.freeze())
            }
        }
    }

    /// View the body as a chunk stream regardless of how it was read
    pub fn into_stream(self) -> ByteStream {
        match self {
            ResponseBody::Stream(stream) => stream,
            ResponseBody::Bytes(bytes) => futures::stream::once(async move { Ok(bytes) }).boxed(),
            ResponseBody::Empty => futures::stream::empty().boxed(),
        }
    }
}

/// Response returned by a transport
#[derive(Debug)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Body in the requested [`BodyMode`]
    pub body: ResponseBody,
}

/// Sends requests over the network
#[async_trait]
pub trait Transport: Debug + Send + Sync {
    /// Send `request`, returning the body as `mode` asks
    ///
    /// Only failures that prevent a response from arriving are errors; any
    /// status code is a successful send.
    async fn send(
        &self,
        request: TransportRequest,
        mode: BodyMode,
    ) -> Result<TransportResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collect_joins_stream_chunks() {
        let chunks: Vec<Result<Bytes, TransportError>> = vec![
            Ok(Bytes::from_static(b"hello ")),
            Ok(Bytes::from_static(b"world")),
        ];
        let body = ResponseBody::Stream(futures::stream::iter(chunks).boxed());
        assert_eq!(
            body.collect().await.expect("Stream collects").as_ref(),
            b"hello world"
        );
    }

    #[tokio::test]
    async fn test_collect_propagates_stream_error() {
        let chunks: Vec<Result<Bytes, TransportError>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(TransportError::Io("reset".into())),
        ];
        let body = ResponseBody::Stream(futures::stream::iter(chunks).boxed());
        assert_eq!(
            body.collect().await,
            Err(TransportError::Io("reset".into()))
        );
    }

    #[tokio::test]
    async fn test_into_stream_from_buffered_body() {
        let chunks: Vec<_> = ResponseBody::Bytes(Bytes::from_static(b"abc"))
            .into_stream()
            .collect()
            .await;
        assert_eq!(chunks, vec![Ok(Bytes::from_static(b"abc"))]);

        let empty: Vec<_> = ResponseBody::Empty.into_stream().collect().await;
        assert!(empty.is_empty());
    }
}
