//! Shared client context
//!
//! An [`HttpClientContext`] owns everything requests share: the transport, the
//! base URL, the codec registry, hooks and the auth token cache. It is cheap to
//! clone and is handed to every request it creates.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::AUTHORIZATION;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use url::Url;

use crate::auth::{AuthToken, AuthTokenCache, AuthTokenProvider};
use crate::body::{BodyAdapter, BodyContent};
use crate::config::ClientConfig;
use crate::encoding;
use crate::error::{Error, HttpException, Result, TransportError, TRANSPORT_FAILURE_STATUS};
use crate::intercept::{RequestEvent, RequestIntercept, RequestListener};
use crate::request::HttpClientRequest;
use crate::response::{RawResponse, ResponseHead};
use crate::transport::{BodyMode, Transport, TransportRequest, TransportResponse};
use crate::url_builder::UrlBuilder;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

struct ContextInner {
    transport: Arc<dyn Transport>,
    base_url: Option<String>,
    request_timeout: Duration,
    body_adapter: BodyAdapter,
    listeners: Vec<Arc<dyn RequestListener>>,
    intercepts: Vec<Arc<dyn RequestIntercept>>,
    auth_provider: Option<Arc<dyn AuthTokenProvider>>,
    token_cache: AuthTokenCache,
}

/// Shared state for building and executing requests
#[derive(Clone)]
pub struct HttpClientContext {
    inner: Arc<ContextInner>,
}

impl fmt::Debug for HttpClientContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClientContext")
            .field("transport", &self.inner.transport)
            .field("base_url", &self.inner.base_url)
            .field("request_timeout", &self.inner.request_timeout)
            .field("body_adapter", &self.inner.body_adapter)
            .field("listeners", &self.inner.listeners.len())
            .field("intercepts", &self.inner.intercepts.len())
            .field("auth_provider", &self.inner.auth_provider.is_some())
            .finish()
    }
}

impl HttpClientContext {
    /// Create a new context builder
    pub fn builder() -> HttpClientContextBuilder {
        HttpClientContextBuilder::default()
    }

    /// Start a request from the context defaults
    pub fn request(&self) -> HttpClientRequest {
        HttpClientRequest::new(self.clone())
    }

    /// URL builder starting at the base URL
    pub fn url(&self) -> UrlBuilder {
        match &self.inner.base_url {
            Some(base) => UrlBuilder::new(base.clone()),
            None => UrlBuilder::without_base(),
        }
    }

    /// Base URL, if configured
    pub fn base_url(&self) -> Option<&str> {
        self.inner.base_url.as_deref()
    }

    /// Timeout applied to requests that do not set their own
    pub fn request_timeout(&self) -> Duration {
        self.inner.request_timeout
    }

    /// Codec registry
    pub fn converters(&self) -> &BodyAdapter {
        &self.inner.body_adapter
    }

    /// Auth token cache
    pub fn auth_token_cache(&self) -> &AuthTokenCache {
        &self.inner.token_cache
    }

    /// Currently valid bearer token, refreshed through the provider when
    /// absent or expired; `None` without a provider
    pub async fn auth_token(&self) -> Result<Option<Arc<AuthToken>>> {
        let Some(provider) = &self.inner.auth_provider else {
            return Ok(None);
        };

        let token = self
            .inner
            .token_cache
            .get_or_refresh(provider.as_ref(), || self.request().skip_auth_token())
            .await?;
        Ok(Some(token))
    }

    /// Raise an [`HttpException`] for any status of 300 or above
    pub fn check_response(&self, response: RawResponse) -> Result<RawResponse> {
        if response.status() >= 300 {
            tracing::debug!("HTTP status {} treated as failure", response.status());
            return Err(HttpException::from_response(self.clone(), response).into());
        }
        Ok(response)
    }

    /// Body bytes with the `Content-Encoding` removed
    pub fn decode_content(&self, response: &RawResponse) -> Result<Bytes> {
        Ok(encoding::decode_content(
            response.head().content_encoding(),
            response.body().clone(),
        )?)
    }

    /// Decoded body paired with its content type
    ///
    /// A response without `Content-Type` is read as the registry's default
    /// content type.
    pub fn read_content(&self, response: &RawResponse) -> Result<BodyContent> {
        let content = self.decode_content(response)?;
        let content_type = response
            .head()
            .content_type()
            .unwrap_or_else(|| self.inner.body_adapter.default_content_type());
        Ok(BodyContent::new(content_type, content))
    }

    /// Inject the bearer token, then run every intercept in registration order
    pub(crate) async fn before_request(&self, request: &mut HttpClientRequest) -> Result<()> {
        if !request.is_skip_auth_token() {
            if let Some(token) = self.auth_token().await? {
                request.insert_header(
                    AUTHORIZATION.as_str(),
                    format!("Bearer {}", token.token()),
                );
            }
        }

        for intercept in &self.inner.intercepts {
            intercept.before_request(request);
        }
        Ok(())
    }

    /// Notify listeners, then intercepts; `response` is `None` on transport failure
    pub(crate) fn after_response(
        &self,
        request: &HttpClientRequest,
        response: Option<&ResponseHead>,
        elapsed: Duration,
    ) {
        if self.inner.listeners.is_empty() && self.inner.intercepts.is_empty() {
            return;
        }

        let event = RequestEvent {
            method: request.http_method().clone(),
            url: request.url_string(),
            status: response.map_or(TRANSPORT_FAILURE_STATUS, ResponseHead::status),
            elapsed,
        };
        for listener in &self.inner.listeners {
            listener.response(&event);
        }
        for intercept in &self.inner.intercepts {
            intercept.after_response(response, request);
        }
    }

    /// Send through the transport, bounded by `timeout` and `cancellation`
    #[instrument(
        name = "http_request",
        skip_all,
        fields(
            http.method = %request.method,
            http.url = %request.url,
            http.status_code = tracing::field::Empty,
        )
    )]
    pub(crate) async fn send(
        &self,
        request: TransportRequest,
        mode: BodyMode,
        timeout: Duration,
        cancellation: Option<&CancellationToken>,
    ) -> Result<TransportResponse, TransportError> {
        let send = async {
            match tokio::time::timeout(timeout, self.inner.transport.send(request, mode)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout),
            }
        };

        let result = match cancellation {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(TransportError::Cancelled),
                    result = send => result,
                }
            }
            None => send.await,
        };

        match &result {
            Ok(response) => {
                tracing::Span::current().record("http.status_code", response.status);
            }
            Err(err) => tracing::warn!("HTTP transport failure: {}", err),
        }
        result
    }
}

/// Builder for [`HttpClientContext`]
pub struct HttpClientContextBuilder {
    base_url: Option<String>,
    request_timeout: Duration,
    body_adapter: Option<BodyAdapter>,
    default_content_type: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    listeners: Vec<Arc<dyn RequestListener>>,
    intercepts: Vec<Arc<dyn RequestIntercept>>,
    auth_provider: Option<Arc<dyn AuthTokenProvider>>,
}

impl Default for HttpClientContextBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            body_adapter: None,
            default_content_type: None,
            transport: None,
            listeners: Vec::new(),
            intercepts: Vec::new(),
            auth_provider: None,
        }
    }
}

impl fmt::Debug for HttpClientContextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClientContextBuilder")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl HttpClientContextBuilder {
    /// Base URL every request starts from
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Timeout for requests that do not set their own
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Codec registry (defaults to `text/plain` strings only)
    pub fn body_adapter(mut self, body_adapter: BodyAdapter) -> Self {
        self.body_adapter = Some(body_adapter);
        self
    }

    /// Transport used to send requests
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Append a listener
    pub fn request_listener(mut self, listener: impl RequestListener + 'static) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Append an intercept
    pub fn request_intercept(mut self, intercept: impl RequestIntercept + 'static) -> Self {
        self.intercepts.push(Arc::new(intercept));
        self
    }

    /// Provider used to obtain bearer tokens
    pub fn auth_token_provider(mut self, provider: impl AuthTokenProvider + 'static) -> Self {
        self.auth_provider = Some(Arc::new(provider));
        self
    }

    /// Apply settings from a [`ClientConfig`]
    pub fn config(mut self, config: &ClientConfig) -> Self {
        if let Some(base_url) = &config.base_url {
            self.base_url = Some(base_url.clone());
        }
        self.request_timeout = config.request_timeout();
        if let Some(content_type) = &config.default_content_type {
            self.default_content_type = Some(content_type.clone());
        }
        self
    }

    /// Build the context
    pub fn build(self) -> Result<HttpClientContext> {
        if let Some(base_url) = &self.base_url {
            Url::parse(base_url)
                .map_err(|e| Error::InvalidRequest(format!("invalid base URL {base_url}: {e}")))?;
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };

        let mut body_adapter = self.body_adapter.unwrap_or_default();
        if let Some(content_type) = self.default_content_type {
            body_adapter = body_adapter.with_default_content_type(content_type);
        }

        Ok(HttpClientContext {
            inner: Arc::new(ContextInner {
                transport,
                base_url: self.base_url,
                request_timeout: self.request_timeout,
                body_adapter,
                listeners: self.listeners,
                intercepts: self.intercepts,
                auth_provider: self.auth_provider,
                token_cache: AuthTokenCache::new(),
            }),
        })
    }
}

#[cfg(feature = "reqwest")]
fn default_transport() -> Result<Arc<dyn Transport>> {
    Ok(Arc::new(crate::transport::ReqwestTransport::new()))
}

#[cfg(not(feature = "reqwest"))]
fn default_transport() -> Result<Arc<dyn Transport>> {
    Err(Error::InvalidRequest(
        "no transport configured and the reqwest feature is disabled".into(),
    ))
}
