//! Content-Encoding decoding
//!
//! Only `gzip` is decoded. Any other encoding is passed through untouched so
//! callers relying on the raw bytes of an unrecognized encoding still get them.

use std::io::{self, Read, Write};

use bytes::Bytes;
use flate2::read::GzDecoder;

/// `gzip` content encoding
pub const GZIP: &str = "gzip";

/// True when `encoding` names gzip
pub fn is_gzip(encoding: Option<&str>) -> bool {
    encoding.is_some_and(|encoding| encoding.trim().eq_ignore_ascii_case(GZIP))
}

/// Decode `body` according to its `Content-Encoding`
pub fn decode_content(encoding: Option<&str>, body: Bytes) -> io::Result<Bytes> {
    if is_gzip(encoding) && !body.is_empty() {
        tracing::trace!("Decoding gzip body of {} bytes", body.len());
        return gzip_decode(&body).map(Bytes::from);
    }
    Ok(body)
}

/// Decompress a complete gzip payload
pub fn gzip_decode(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut decoded = Vec::with_capacity(data.len() * 2);
    decoder.read_to_end(&mut decoded)?;
    Ok(decoded)
}

/// Incremental gzip decoder for bodies that arrive in chunks
pub(crate) struct StreamingGzip {
    decoder: flate2::write::GzDecoder<Vec<u8>>,
}

impl StreamingGzip {
    pub(crate) fn new() -> Self {
        Self {
            decoder: flate2::write::GzDecoder::new(Vec::new()),
        }
    }

    /// Feed a compressed chunk, returning whatever has been decompressed so far
    pub(crate) fn push(&mut self, chunk: &[u8]) -> io::Result<Vec<u8>> {
        self.decoder.write_all(chunk)?;
        Ok(std::mem::take(self.decoder.get_mut()))
    }

    /// Flush the decoder at end of input
    pub(crate) fn finish(&mut self) -> io::Result<Vec<u8>> {
        self.decoder.try_finish()?;
        Ok(std::mem::take(self.decoder.get_mut()))
    }
}

#[cfg(test)]
pub(crate) fn gzip_encode(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).expect("Write to in-memory encoder");
    encoder.finish().expect("Finish in-memory encoder")
}
