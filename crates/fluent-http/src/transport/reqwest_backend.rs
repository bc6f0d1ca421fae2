//! reqwest-based Transport implementation

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};

use super::{BodyMode, ResponseBody, Transport, TransportRequest, TransportResponse};
use crate::error::TransportError;

/// reqwest-based transport
///
/// Response bodies are returned exactly as received; content decoding is done
/// by the pipeline.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a default reqwest client
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport from an existing reqwest client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: TransportRequest,
        mode: BodyMode,
    ) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();

        let body = match mode {
            BodyMode::Buffered => ResponseBody::Bytes(response.bytes().await?),
            BodyMode::Streaming => {
                ResponseBody::Stream(response.bytes_stream().map_err(TransportError::from).boxed())
            }
            BodyMode::Discard => ResponseBody::Empty,
        };

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
