use std::future::Future;
use std::io::{self, Read};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes};
use flate2::read::{GzDecoder, ZlibDecoder};
use http_body_util::Full;
use hyper::body::Body;
use pin_project_lite::pin_project;

use crate::error::TransportError;

/// Upper bound on the buffer reserved up front from a `content-length` hint.
pub const MAX_PREALLOCATED_BYTES: usize = 64 * 1024;

/// Upper bound on a decoded response body.
pub const MAX_DECODED_BYTES: usize = 64 * 1024 * 1024;

#[inline]
pub fn empty_body() -> Full<Bytes> {
    Full::new(Bytes::new())
}

#[inline]
pub fn byte_body<B: Into<Bytes>>(bytes: B) -> Full<Bytes> {
    Full::new(bytes.into())
}

/// What to do with response bytes while draining.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BodyPolicy {
    Retain,
    Discard,
}

/// Body bytes read off the wire. `bytes` is empty when drained with [`BodyPolicy::Discard`].
#[derive(Debug)]
pub struct Drained {
    pub bytes: Vec<u8>,
    pub read: usize,
}

pin_project! {
    /// Reads a body to the end. With [`BodyPolicy::Discard`] every frame is dropped as soon
    /// as it arrives so memory stays flat no matter how large the response is.
    ///
    /// The size hint only sizes the initial buffer, capped at [`MAX_PREALLOCATED_BYTES`];
    /// the buffer grows with the bytes that actually arrive.
    pub struct DrainBodyFuture<B: Body> {
        #[pin]
        body: B,
        buf: Vec<u8>,
        read: usize,
        policy: BodyPolicy,
    }
}

impl<B> DrainBodyFuture<B>
where
    B: Body,
{
    #[inline]
    #[must_use]
    pub fn new(body: B, policy: BodyPolicy, size_hint: usize) -> Self {
        let capacity = match policy {
            BodyPolicy::Retain => size_hint.min(MAX_PREALLOCATED_BYTES),
            BodyPolicy::Discard => 0,
        };
        Self {
            body,
            buf: Vec::with_capacity(capacity),
            read: 0,
            policy,
        }
    }
}

impl<B> Future for DrainBodyFuture<B>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Output = Result<Drained, TransportError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slf = self.project();
        loop {
            let next = match slf.body.as_mut().poll_frame(cx) {
                Poll::Ready(next) => next,
                Poll::Pending => return Poll::Pending,
            };
            let Some(next_res) = next else {
                return Poll::Ready(Ok(Drained {
                    bytes: std::mem::take(slf.buf),
                    read: *slf.read,
                }));
            };
            let frame = match next_res {
                Ok(frame) => frame,
                Err(e) => return Poll::Ready(Err(TransportError::Body(e.into()))),
            };
            // Trailers carry nothing we report on.
            if let Ok(mut data) = frame.into_data() {
                *slf.read += data.remaining();
                match slf.policy {
                    BodyPolicy::Retain => {
                        while data.has_remaining() {
                            let chunk = data.chunk();
                            slf.buf.extend_from_slice(chunk);
                            let len = chunk.len();
                            data.advance(len);
                        }
                    }
                    BodyPolicy::Discard => {}
                }
            }
            if slf.body.is_end_stream() {
                return Poll::Ready(Ok(Drained {
                    bytes: std::mem::take(slf.buf),
                    read: *slf.read,
                }));
            }
        }
    }
}

/// Content codings [`decompress`] understands.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Encoding {
    Gzip,
    Deflate,
}

impl Encoding {
    #[must_use]
    pub fn from_header(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gzip" | "x-gzip" => Some(Self::Gzip),
            "deflate" => Some(Self::Deflate),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
        }
    }
}

/// Decodes `compressed`, failing once the output would exceed `limit` bytes.
pub fn decompress(
    encoding: Encoding,
    compressed: &[u8],
    limit: usize,
) -> Result<Bytes, TransportError> {
    let mut out = Vec::with_capacity(compressed.len().saturating_mul(4).min(limit));
    // One byte past the limit tells an exact fit from an overflow.
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let res = match encoding {
        Encoding::Gzip => GzDecoder::new(compressed).take(cap).read_to_end(&mut out),
        Encoding::Deflate => ZlibDecoder::new(compressed).take(cap).read_to_end(&mut out),
    };
    let res = res.and_then(|read| {
        if read > limit {
            Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("decoded body exceeds {limit} bytes"),
            ))
        } else {
            Ok(())
        }
    });
    res.map_err(|source| TransportError::Decompress {
        encoding: encoding.as_str(),
        source,
    })?;
    Ok(Bytes::from(out))
}
