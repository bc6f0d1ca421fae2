//! Fluent HTTP request building and execution
//!
//! Requests are created from a shared [`HttpClientContext`], assembled through
//! chained calls (path segments, matrix, query and form parameters, headers,
//! body) and executed through a pluggable [`Transport`]. Responses are checked,
//! content-decoded and converted by the codecs registered in a [`BodyAdapter`].
//!
//! # Example
//!
//! ```no_run
//! use fluent_http::{BodyAdapter, HttpClientContext, Result};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Hello {
//!     id: u64,
//!     name: String,
//! }
//!
//! async fn example() -> Result<Hello> {
//!     let context = HttpClientContext::builder()
//!         .base_url("https://api.example.com")
//!         .body_adapter(BodyAdapter::builder().json::<Hello>().build())
//!         .build()?;
//!
//!     context
//!         .request()
//!         .path("hello")
//!         .path(42)
//!         .query_param("verbose", true)
//!         .bean::<Hello>()
//!         .await
//! }
//! ```

mod auth;
pub mod body;
mod config;
mod context;
pub mod encoding;
mod error;
mod intercept;
mod request;
mod response;
mod stream;
pub mod transport;
mod url_builder;

#[cfg(test)]
mod test_support;

pub use auth::{AuthToken, AuthTokenCache, AuthTokenProvider};
pub use body::{BodyAdapter, BodyAdapterBuilder, BodyContent, BodyReader, BodyWriter, ListReader};
pub use config::ClientConfig;
pub use context::{HttpClientContext, HttpClientContextBuilder, DEFAULT_REQUEST_TIMEOUT};
pub use error::{
    CodecError, Error, HttpException, Result, TransportError, TRANSPORT_FAILURE_STATUS,
};
pub use intercept::{
    BasicAuthIntercept, RequestEvent, RequestIntercept, RequestListener, RequestLogger,
};
pub use request::HttpClientRequest;
pub use response::{HttpResponse, RawResponse, ResponseHead};
pub use stream::BeanStream;
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::{BodyMode, Transport};
pub use tokio_util::sync::CancellationToken;
pub use url_builder::UrlBuilder;
