//! Request builder and terminal operations
//!
//! A request is created from a context, configured through chained calls and
//! consumed by exactly one terminal operation:
//!
//! | terminal | result |
//! |----------|--------|
//! | [`as_string`](HttpClientRequest::as_string) | `HttpResponse<String>` |
//! | [`as_bytes`](HttpClientRequest::as_bytes) | `HttpResponse<Bytes>` |
//! | [`as_void`](HttpClientRequest::as_void) | `HttpResponse<()>`, body read and dropped |
//! | [`as_discarding`](HttpClientRequest::as_discarding) | `HttpResponse<()>`, body never read |
//! | [`bean`](HttpClientRequest::bean) | `T` from the registered reader |
//! | [`list`](HttpClientRequest::list) | `Vec<T>` from the registered list reader |
//! | [`stream`](HttpClientRequest::stream) | [`BeanStream<T>`], one element per line |
//! | [`read`](HttpClientRequest::read) | `T` from an explicit reader |
//!
//! Any status of 300 or above is raised as an [`HttpException`] carrying the
//! response, and a failed send is raised with status
//! [`TRANSPORT_FAILURE_STATUS`](crate::TRANSPORT_FAILURE_STATUS).

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use tokio_util::sync::CancellationToken;
use web_time::Instant;

use crate::body::{
    encode_pairs, BodyAdapter, BodyContent, BodyReader, FORM_URLENCODED, JSON_STREAM,
};
use crate::context::HttpClientContext;
use crate::encoding::is_gzip;
use crate::error::{CodecError, Error, HttpException, Result};
use crate::response::{HttpResponse, RawResponse, ResponseHead};
use crate::stream::{element_content_type, BeanStream};
use crate::transport::{BodyMode, ResponseBody, TransportRequest, TransportResponse};
use crate::url_builder::UrlBuilder;

type BeanWriter =
    Box<dyn FnOnce(&BodyAdapter, Option<&str>) -> Result<BodyContent, CodecError> + Send + Sync>;

enum RequestBody {
    Content(BodyContent),
    Bean(BeanWriter),
}

/// Request under construction
pub struct HttpClientRequest {
    context: HttpClientContext,
    url: UrlBuilder,
    method: Method,
    headers: Vec<(String, String)>,
    form_params: Vec<(String, String)>,
    body: Option<RequestBody>,
    content_type: Option<String>,
    timeout: Option<Duration>,
    skip_auth_token: bool,
    cancellation: Option<CancellationToken>,
}

impl fmt::Debug for HttpClientRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match &self.body {
            Some(RequestBody::Content(content)) => Some(content.content_type()),
            Some(RequestBody::Bean(_)) => Some("<bean>"),
            None => None,
        };
        f.debug_struct("HttpClientRequest")
            .field("method", &self.method)
            .field("url", &self.url.build())
            .field("headers", &self.headers)
            .field("form_params", &self.form_params)
            .field("body", &body)
            .field("timeout", &self.timeout)
            .field("skip_auth_token", &self.skip_auth_token)
            .finish_non_exhaustive()
    }
}

impl HttpClientRequest {
    pub(crate) fn new(context: HttpClientContext) -> Self {
        Self {
            url: context.url(),
            context,
            method: Method::GET,
            headers: Vec::new(),
            form_params: Vec::new(),
            body: None,
            content_type: None,
            timeout: None,
            skip_auth_token: false,
            cancellation: None,
        }
    }

    /// Replace the base URL with an absolute one
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = UrlBuilder::new(url);
        self
    }

    /// Append path segments (split on `/`)
    pub fn path(mut self, path: impl ToString) -> Self {
        self.url.path(path);
        self
    }

    /// Attach a matrix parameter to the last path segment
    pub fn matrix_param(mut self, name: impl AsRef<str>, value: impl ToString) -> Self {
        self.url.matrix_param(name, value);
        self
    }

    /// Add a query parameter
    pub fn query_param(mut self, name: impl AsRef<str>, value: impl ToString) -> Self {
        self.url.query_param(name, value);
        self
    }

    /// Add a query parameter when `value` is `Some`; `None` adds nothing
    pub fn query_param_opt(mut self, name: impl AsRef<str>, value: Option<impl ToString>) -> Self {
        self.url.query_param_opt(name, value);
        self
    }

    /// Add a form parameter, sent as `application/x-www-form-urlencoded`
    ///
    /// A body set through [`body`](Self::body) or
    /// [`body_content`](Self::body_content) takes precedence; the form
    /// parameters are then not sent.
    pub fn form_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.form_params.push((name.into(), value.to_string()));
        self
    }

    /// Add a header; repeated names are all sent
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Content type for a bean body
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Body written by the codec registered for `T`
    pub fn body<T>(mut self, bean: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.body = Some(RequestBody::Bean(Box::new(move |adapter, content_type| {
            adapter.write(&bean, content_type)
        })));
        self
    }

    /// Pre-encoded body
    pub fn body_content(mut self, content: BodyContent) -> Self {
        self.body = Some(RequestBody::Content(content));
        self
    }

    /// Raw bytes body
    pub fn body_bytes(self, content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        self.body_content(BodyContent::new(content_type, bytes))
    }

    /// Set the HTTP method
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// GET
    pub fn get(self) -> Self {
        self.method(Method::GET)
    }

    /// POST
    pub fn post(self) -> Self {
        self.method(Method::POST)
    }

    /// PUT
    pub fn put(self) -> Self {
        self.method(Method::PUT)
    }

    /// DELETE
    pub fn delete(self) -> Self {
        self.method(Method::DELETE)
    }

    /// PATCH
    pub fn patch(self) -> Self {
        self.method(Method::PATCH)
    }

    /// Do not inject the bearer token
    pub fn skip_auth_token(mut self) -> Self {
        self.skip_auth_token = true;
        self
    }

    /// Override the context timeout for this request
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Abort the send when `token` is cancelled
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Set a header, replacing any existing values of the same name
    pub fn insert_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    /// Replace the body with pre-encoded content
    pub fn replace_body(&mut self, content: BodyContent) {
        self.body = Some(RequestBody::Content(content));
    }

    /// HTTP method
    pub fn http_method(&self) -> &Method {
        &self.method
    }

    /// Current URL
    pub fn url_string(&self) -> String {
        self.url.build()
    }

    /// Headers in insertion order
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value of a header (case-insensitive)
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Form parameters in insertion order
    pub fn form_params(&self) -> &[(String, String)] {
        &self.form_params
    }

    /// Pre-encoded body, if one is set
    pub fn body_value(&self) -> Option<&BodyContent> {
        match &self.body {
            Some(RequestBody::Content(content)) => Some(content),
            _ => None,
        }
    }

    /// True when bearer token injection is skipped
    pub fn is_skip_auth_token(&self) -> bool {
        self.skip_auth_token
    }

    /// Response body as text
    pub async fn as_string(self) -> Result<HttpResponse<String>> {
        let (head, content) = self.fetch_content(BodyMode::Buffered).await?;
        let text = std::str::from_utf8(content.content()).map_err(CodecError::from)?;
        Ok(HttpResponse::new(head, text.to_owned()))
    }

    /// Response body as bytes
    pub async fn as_bytes(self) -> Result<HttpResponse<Bytes>> {
        let (head, content) = self.fetch_content(BodyMode::Buffered).await?;
        Ok(HttpResponse::new(head, content.into_content()))
    }

    /// Status and headers; the body is read so a failure can carry it
    pub async fn as_void(self) -> Result<HttpResponse<()>> {
        let (head, _) = self.fetch(BodyMode::Buffered).await?.into_parts();
        Ok(HttpResponse::new(head, ()))
    }

    /// Status and headers; the body is never read
    pub async fn as_discarding(self) -> Result<HttpResponse<()>> {
        let (head, _) = self.fetch(BodyMode::Discard).await?.into_parts();
        Ok(HttpResponse::new(head, ()))
    }

    /// Response body decoded into `T`
    pub async fn bean<T: 'static>(self) -> Result<T> {
        let context = self.context.clone();
        let (_, content) = self.fetch_content(BodyMode::Buffered).await?;
        Ok(context.converters().read_bean(&content)?)
    }

    /// Response body decoded into a list of `T`
    pub async fn list<T: 'static>(self) -> Result<Vec<T>> {
        let context = self.context.clone();
        let (_, content) = self.fetch_content(BodyMode::Buffered).await?;
        Ok(context.converters().read_list(&content)?)
    }

    /// Response body decoded with an explicit reader
    pub async fn read<T>(self, reader: &dyn BodyReader<T>) -> Result<T> {
        let (_, content) = self.fetch_content(BodyMode::Buffered).await?;
        Ok(reader.read(&content)?)
    }

    /// Response body decoded lazily, one `T` per line
    ///
    /// Sends `Accept: application/x-json-stream` unless an `Accept` header is
    /// already set.
    pub async fn stream<T: 'static>(mut self) -> Result<BeanStream<T>> {
        if self.header_value(ACCEPT.as_str()).is_none() {
            self.headers.push((ACCEPT.as_str().to_string(), JSON_STREAM.to_string()));
        }

        let context = self.context.clone();
        let (response, started) = self.dispatch(BodyMode::Streaming).await?;
        let head = ResponseHead::new(response.status, response.headers);

        if head.status() >= 300 {
            let body = self.collect_body(response.body, started).await?;
            context.after_response(&self, Some(&head), started.elapsed());
            return Err(HttpException::from_response(context, RawResponse::new(head, body)).into());
        }

        let content_type = element_content_type(
            head.content_type(),
            context.converters().default_content_type(),
        );
        let reader = context.converters().bean_reader::<T>(Some(&content_type));
        context.after_response(&self, Some(&head), started.elapsed());
        let reader = reader?;

        let gzip = is_gzip(head.content_encoding());
        Ok(BeanStream::new(
            context,
            response.body.into_stream(),
            gzip,
            reader,
            content_type,
        ))
    }

    async fn fetch_content(self, mode: BodyMode) -> Result<(ResponseHead, BodyContent)> {
        let context = self.context.clone();
        let raw = self.fetch(mode).await?;
        let content = context.read_content(&raw)?;
        let (head, _) = raw.into_parts();
        Ok((head, content))
    }

    /// Send, read the whole body, fire after hooks and check the status
    async fn fetch(mut self, mode: BodyMode) -> Result<RawResponse> {
        let context = self.context.clone();
        let (response, started) = self.dispatch(mode).await?;
        let head = ResponseHead::new(response.status, response.headers);
        let body = self.collect_body(response.body, started).await?;

        let raw = RawResponse::new(head, body);
        context.after_response(&self, Some(raw.head()), started.elapsed());
        context.check_response(raw)
    }

    async fn collect_body(&self, body: ResponseBody, started: Instant) -> Result<Bytes> {
        match body.collect().await {
            Ok(body) => Ok(body),
            Err(cause) => {
                self.context.after_response(self, None, started.elapsed());
                Err(HttpException::from_transport(self.context.clone(), cause).into())
            }
        }
    }

    /// Run before hooks and send; transport failures fire the after hooks
    async fn dispatch(&mut self, mode: BodyMode) -> Result<(TransportResponse, Instant)> {
        let context = self.context.clone();
        context.before_request(self).await?;

        let request = self.to_transport_request()?;
        let timeout = self.timeout.unwrap_or_else(|| context.request_timeout());

        let started = Instant::now();
        match context
            .send(request, mode, timeout, self.cancellation.as_ref())
            .await
        {
            Ok(response) => Ok((response, started)),
            Err(cause) => {
                context.after_response(self, None, started.elapsed());
                Err(HttpException::from_transport(context, cause).into())
            }
        }
    }

    fn to_transport_request(&mut self) -> Result<TransportRequest> {
        let url = self.url.to_url()?;
        let body = self.resolve_body()?;

        let mut headers = HeaderMap::with_capacity(self.headers.len() + 1);
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::InvalidRequest(format!("invalid header name {name}: {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| Error::InvalidRequest(format!("invalid value for {name}: {e}")))?;
            headers.append(header_name, header_value);
        }

        if let Some(body) = &body {
            if !headers.contains_key(CONTENT_TYPE) && !body.content_type().is_empty() {
                let value = HeaderValue::from_str(body.content_type()).map_err(|e| {
                    Error::InvalidRequest(format!(
                        "invalid content type {}: {e}",
                        body.content_type()
                    ))
                })?;
                headers.insert(CONTENT_TYPE, value);
            }
        }

        Ok(TransportRequest {
            method: self.method.clone(),
            url,
            headers,
            body: body.map(BodyContent::into_content),
        })
    }

    /// Explicit content first, then a bean through its codec, then form parameters
    fn resolve_body(&mut self) -> Result<Option<BodyContent>> {
        if self.body.is_some() && !self.form_params.is_empty() {
            tracing::warn!(
                count = self.form_params.len(),
                "Request body set, form parameters are not sent"
            );
        }
        let content = match self.body.take() {
            Some(RequestBody::Content(content)) => Some(content),
            Some(RequestBody::Bean(write)) => Some(write(
                self.context.converters(),
                self.content_type.as_deref(),
            )?),
            None if !self.form_params.is_empty() => Some(BodyContent::new(
                FORM_URLENCODED,
                encode_pairs(&self.form_params)?,
            )),
            None => None,
        };
        self.body = content.clone().map(RequestBody::Content);
        Ok(content)
    }
}
