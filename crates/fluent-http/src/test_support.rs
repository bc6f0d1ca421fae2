//! In-memory transport for unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::{HeaderMap, HeaderName, HeaderValue};

use crate::body::BodyAdapter;
use crate::context::{HttpClientContext, HttpClientContextBuilder};
use crate::error::TransportError;
use crate::transport::{BodyMode, ResponseBody, Transport, TransportRequest, TransportResponse};

pub(crate) const BASE_URL: &str = "http://test.local/api";

#[derive(Debug)]
enum Scripted {
    Response {
        status: u16,
        headers: HeaderMap,
        chunks: Vec<Result<Bytes, TransportError>>,
        released: Arc<AtomicBool>,
    },
    Fail(TransportError),
    Hang,
}

struct ReleaseFlag(Arc<AtomicBool>);

impl Drop for ReleaseFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct Script {
    responses: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<TransportRequest>>,
}

/// Transport answering from a queue of scripted responses and recording requests
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Script>,
}

fn header_map(headers: &[(&'static str, &'static str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes()).expect("Valid header name");
        map.append(name, HeaderValue::from_static(value));
    }
    map
}

impl ScriptedTransport {
    fn push(&self, scripted: Scripted) {
        self.script
            .responses
            .lock()
            .expect("Script lock")
            .push_back(scripted);
    }

    /// Queue a response with a single-chunk body
    pub(crate) fn respond(
        &self,
        status: u16,
        headers: &[(&'static str, &'static str)],
        body: impl Into<Bytes>,
    ) -> &Self {
        self.respond_chunks(status, headers, vec![Ok(body.into())]);
        self
    }

    /// Queue a response whose body arrives in `chunks`; the flag is set once
    /// the body has been dropped
    pub(crate) fn respond_chunks(
        &self,
        status: u16,
        headers: &[(&'static str, &'static str)],
        chunks: Vec<Result<Bytes, TransportError>>,
    ) -> Arc<AtomicBool> {
        let released = Arc::new(AtomicBool::new(false));
        self.push(Scripted::Response {
            status,
            headers: header_map(headers),
            chunks,
            released: released.clone(),
        });
        released
    }

    /// Queue a transport failure
    pub(crate) fn fail(&self, error: TransportError) -> &Self {
        self.push(Scripted::Fail(error));
        self
    }

    /// Queue a send that never completes
    pub(crate) fn hang(&self) -> &Self {
        self.push(Scripted::Hang);
        self
    }

    /// Requests sent so far
    pub(crate) fn requests(&self) -> Vec<TransportRequest> {
        self.script.requests.lock().expect("Requests lock").clone()
    }

    pub(crate) fn last_request(&self) -> TransportRequest {
        self.requests().pop().expect("At least one request")
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: TransportRequest,
        mode: BodyMode,
    ) -> Result<TransportResponse, TransportError> {
        self.script
            .requests
            .lock()
            .expect("Requests lock")
            .push(request);
        let scripted = self
            .script
            .responses
            .lock()
            .expect("Script lock")
            .pop_front();

        match scripted {
            Some(Scripted::Response {
                status,
                headers,
                chunks,
                released,
            }) => {
                let flag = ReleaseFlag(released);
                let body = match mode {
                    BodyMode::Discard => ResponseBody::Empty,
                    BodyMode::Buffered => {
                        let mut body = Vec::new();
                        for chunk in chunks {
                            body.extend_from_slice(&chunk?);
                        }
                        ResponseBody::Bytes(Bytes::from(body))
                    }
                    BodyMode::Streaming => ResponseBody::Stream(
                        futures::stream::iter(chunks)
                            .map(move |chunk| {
                                let _flag = &flag;
                                chunk
                            })
                            .boxed(),
                    ),
                };
                Ok(TransportResponse {
                    status,
                    headers,
                    body,
                })
            }
            Some(Scripted::Fail(error)) => Err(error),
            Some(Scripted::Hang) => std::future::pending().await,
            None => Err(TransportError::Connection("no scripted response".into())),
        }
    }
}

/// Body adapter with the codecs unit tests read and write
pub(crate) fn body_adapter() -> BodyAdapter {
    BodyAdapter::builder()
        .json::<serde_json::Value>()
        .json::<HashMap<String, String>>()
        .form::<HashMap<String, String>>()
        .text()
        .build()
}

pub(crate) fn builder(transport: ScriptedTransport) -> HttpClientContextBuilder {
    HttpClientContext::builder()
        .base_url(BASE_URL)
        .body_adapter(body_adapter())
        .transport(transport)
}

pub(crate) fn context(transport: ScriptedTransport) -> HttpClientContext {
    builder(transport).build().expect("Valid test context")
}
