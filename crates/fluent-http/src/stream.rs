//! Lazy decoding of newline-delimited response bodies

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};

use crate::body::{media_type, BodyContent, BodyReader, APPLICATION_JSON, JSON_STREAM};
use crate::context::HttpClientContext;
use crate::encoding::StreamingGzip;
use crate::error::{Error, HttpException, Result};
use crate::transport::ByteStream;

const LINE_DELIMITED_JSON: [&str; 4] = [
    JSON_STREAM,
    "application/x-ndjson",
    "application/stream+json",
    "application/jsonl",
];

/// Content type each line of a streamed body is read as
///
/// Newline-delimited JSON media types map to `application/json`; a missing
/// `Content-Type` maps to `default_content_type`.
pub(crate) fn element_content_type(
    content_type: Option<&str>,
    default_content_type: &str,
) -> String {
    match content_type {
        Some(content_type) if !content_type.trim().is_empty() => {
            if LINE_DELIMITED_JSON.contains(&media_type(content_type).as_str()) {
                APPLICATION_JSON.to_string()
            } else {
                content_type.to_string()
            }
        }
        _ => default_content_type.to_string(),
    }
}

/// Stream of values decoded from a newline-delimited body
///
/// Each non-empty line is decoded as one value, in order, as it arrives. The
/// response body is released as soon as the end is seen (at the latest when
/// the last element is handed out), on a read failure, on
/// [`close`](Self::close) or when the stream is dropped. A line that fails to
/// decode yields an error and the stream continues with the next line.
pub struct BeanStream<T> {
    context: HttpClientContext,
    body: Option<ByteStream>,
    gzip: Option<StreamingGzip>,
    buffer: BytesMut,
    reader: Arc<dyn BodyReader<T>>,
    content_type: String,
    failure: Option<Error>,
}

impl<T> fmt::Debug for BeanStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanStream")
            .field("content_type", &self.content_type)
            .field("buffered", &self.buffer.len())
            .field("released", &self.body.is_none())
            .finish()
    }
}

impl<T> BeanStream<T> {
    pub(crate) fn new(
        context: HttpClientContext,
        body: ByteStream,
        gzip: bool,
        reader: Arc<dyn BodyReader<T>>,
        content_type: String,
    ) -> Self {
        Self {
            context,
            body: Some(body),
            gzip: gzip.then(StreamingGzip::new),
            buffer: BytesMut::new(),
            reader,
            content_type,
            failure: None,
        }
    }

    /// Content type each element is decoded as
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// True once the response body has been released
    pub fn is_released(&self) -> bool {
        self.body.is_none()
    }

    /// Release the response body; no further elements are produced
    pub fn close(&mut self) {
        self.release();
        self.buffer.clear();
    }

    fn release(&mut self) {
        if self.body.take().is_some() {
            tracing::trace!("Streamed response body released");
        }
        self.gzip = None;
    }

    fn push_chunk(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        match self.gzip.as_mut() {
            Some(gzip) => {
                let decoded = gzip.push(chunk)?;
                self.buffer.extend_from_slice(&decoded);
            }
            None => self.buffer.extend_from_slice(chunk),
        }
        Ok(())
    }

    fn finish_gzip(&mut self) -> std::io::Result<()> {
        if let Some(gzip) = self.gzip.as_mut() {
            let decoded = gzip.finish()?;
            self.buffer.extend_from_slice(&decoded);
        }
        Ok(())
    }

    /// Next complete non-blank line in the buffer
    fn next_line(&mut self) -> Option<Bytes> {
        while let Some(end) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line = self.buffer.split_to(end + 1).freeze();
            let trimmed = line.trim_ascii();
            if !trimmed.is_empty() {
                return Some(line.slice_ref(trimmed));
            }
        }
        None
    }

    /// Whatever follows the last newline once input has ended
    fn trailing_line(&mut self) -> Option<Bytes> {
        let rest = self.buffer.split().freeze();
        let trimmed = rest.trim_ascii();
        (!trimmed.is_empty()).then(|| rest.slice_ref(trimmed))
    }

    fn decode(&self, line: Bytes) -> Result<T> {
        let content = BodyContent::new(self.content_type.clone(), line);
        Ok(self.reader.read(&content)?)
    }

    /// True when the buffer holds at least one complete non-blank line
    fn has_line(&self) -> bool {
        let Some(end) = self.buffer.iter().rposition(|byte| *byte == b'\n') else {
            return false;
        };
        self.buffer[..end]
            .split(|byte| *byte == b'\n')
            .any(|line| !line.trim_ascii().is_empty())
    }

    /// Release the body and hold `error` for the next poll
    fn fail(&mut self, error: Error) {
        self.close();
        self.failure = Some(error);
    }

    /// Poll the body once and move whatever arrived into the buffer
    fn fill(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        let Some(body) = self.body.as_mut() else {
            return Poll::Ready(());
        };

        match body.poll_next_unpin(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Some(Ok(chunk))) => {
                if let Err(err) = self.push_chunk(&chunk) {
                    self.fail(err.into());
                }
            }
            Poll::Ready(Some(Err(cause))) => {
                tracing::warn!("Streamed response body failed: {}", cause);
                let error = HttpException::from_transport(self.context.clone(), cause);
                self.fail(error.into());
            }
            Poll::Ready(None) => match self.finish_gzip() {
                Ok(()) => self.release(),
                Err(err) => self.fail(err.into()),
            },
        }
        Poll::Ready(())
    }

    /// Take input that is already available until a line is buffered or the
    /// body ends
    fn prefetch(&mut self, cx: &mut Context<'_>) {
        while self.body.is_some() && !self.has_line() {
            if self.fill(cx).is_pending() {
                break;
            }
        }
    }
}

impl<T> Stream for BeanStream<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(line) = this.next_line() {
                let item = this.decode(line);
                this.prefetch(cx);
                return Poll::Ready(Some(item));
            }

            if let Some(error) = this.failure.take() {
                return Poll::Ready(Some(Err(error)));
            }

            if this.body.is_none() {
                return Poll::Ready(this.trailing_line().map(|line| this.decode(line)));
            }

            ready!(this.fill(cx));
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;
    use serde::Deserialize;

    use super::*;
    use crate::body::JsonCodec;
    use crate::encoding::gzip_encode;
    use crate::error::TransportError;
    use crate::test_support::{context, ScriptedTransport};

    #[derive(Debug, PartialEq, Deserialize)]
    struct Item {
        id: u32,
    }

    fn bean_stream(chunks: Vec<Result<Bytes, TransportError>>, gzip: bool) -> BeanStream<Item> {
        BeanStream::new(
            context(ScriptedTransport::default()),
            stream::iter(chunks).boxed(),
            gzip,
            Arc::new(JsonCodec::<Item>::new()),
            APPLICATION_JSON.to_string(),
        )
    }

    fn ok(chunk: &'static [u8]) -> Result<Bytes, TransportError> {
        Ok(Bytes::from_static(chunk))
    }

    #[test]
    fn test_element_content_type() {
        assert_eq!(
            element_content_type(Some("application/x-json-stream"), "text/plain"),
            APPLICATION_JSON
        );
        assert_eq!(
            element_content_type(Some("Application/X-NDJSON; charset=utf-8"), "text/plain"),
            APPLICATION_JSON
        );
        assert_eq!(
            element_content_type(Some("text/csv"), APPLICATION_JSON),
            "text/csv"
        );
        assert_eq!(element_content_type(None, "text/plain"), "text/plain");
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let mut items = bean_stream(
            vec![ok(b"{\"id\":1}\n{\"i"), ok(b"d\":2}\n\n  \n{\"id\""), ok(b":3}")],
            false,
        );

        let mut decoded = Vec::new();
        while let Some(item) = items.next().await {
            decoded.push(item.expect("Element decodes"));
        }

        assert_eq!(decoded, vec![Item { id: 1 }, Item { id: 2 }, Item { id: 3 }]);
        assert!(items.is_released());
    }

    #[tokio::test]
    async fn test_gzip_body_decoded_incrementally() {
        let mut payload = Vec::new();
        for id in 0..100 {
            payload.extend_from_slice(format!("{{\"id\":{id}}}\n").as_bytes());
        }
        let compressed = gzip_encode(&payload);
        let chunks = compressed
            .chunks(16)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();

        let decoded: Vec<Item> = bean_stream(chunks, true)
            .map(|item| item.expect("Element decodes"))
            .collect()
            .await;

        assert_eq!(decoded.len(), 100);
        assert_eq!(decoded[99], Item { id: 99 });
    }

    #[tokio::test]
    async fn test_bad_element_does_not_end_stream() {
        let items: Vec<_> = bean_stream(vec![ok(b"{\"id\":1}\nnot json\n{\"id\":3}\n")], false)
            .collect()
            .await;

        assert_eq!(items.len(), 3);
        assert!(matches!(items[1], Err(Error::Codec(_))));
        assert_eq!(*items[2].as_ref().expect("Third element"), Item { id: 3 });
    }

    #[tokio::test]
    async fn test_read_failure_releases_body() {
        let mut items = bean_stream(
            vec![
                ok(b"{\"id\":1}\n"),
                Err(TransportError::Io("connection reset".into())),
                ok(b"{\"id\":2}\n"),
            ],
            false,
        );

        assert_eq!(
            items.next().await.expect("First").expect("Decodes"),
            Item { id: 1 }
        );
        let error = items.next().await.expect("Failure").expect_err("Read error");
        assert_eq!(error.status_code(), Some(499));
        assert!(items.is_released());
        assert!(items.next().await.is_none());
    }

    #[tokio::test]
    async fn test_body_released_with_last_element() {
        let mut items = bean_stream(vec![ok(b"{\"id\":1}\n{\"id\":2}\n\n")], false);

        items.next().await.expect("First").expect("Decodes");
        assert!(!items.is_released());

        items.next().await.expect("Second").expect("Decodes");
        assert!(items.is_released());
        assert!(items.next().await.is_none());
    }

    #[tokio::test]
    async fn test_close_releases_body() {
        let mut items = bean_stream(vec![ok(b"{\"id\":1}\n{\"id\":2}\n")], false);
        assert!(!items.is_released());

        items.close();
        assert!(items.is_released());
        assert!(items.next().await.is_none());
    }
}
