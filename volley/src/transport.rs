use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Request};
use http_body_util::Full;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::trace;

use crate::body::{
    byte_body, decompress, empty_body, BodyPolicy, DrainBodyFuture, Encoding, MAX_DECODED_BYTES,
};
use crate::config::TransportOptions;
use crate::descriptor::RequestDescriptor;
use crate::error::TransportError;
use crate::outcome::ResponseSnapshot;

/// Executes one HTTP exchange for a descriptor.
///
/// A single handle is shared by every in-flight attempt of a run, so implementations
/// must tolerate concurrent calls. The per-attempt timeout is applied around `execute`
/// by the dispatcher; an implementation may also give up early with
/// [`TransportError::TimedOut`], which is reported the same way.
pub trait Transport: Send + Sync + 'static {
    fn execute(
        &self,
        request: &RequestDescriptor,
        body: BodyPolicy,
    ) -> impl Future<Output = Result<ResponseSnapshot, TransportError>> + Send;
}

type PooledClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Connection-pooling HTTP/1.1 client over plain TCP or rustls.
#[derive(Clone)]
pub struct HttpTransport {
    client: PooledClient,
    decompress: bool,
}

impl HttpTransport {
    #[must_use]
    pub fn new(options: &TransportOptions) -> Self {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);
        http.set_connect_timeout(options.connect_timeout_seconds.map(Duration::from_secs));
        let https = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let mut builder = Client::builder(TokioExecutor::new());
        builder.pool_idle_timeout(Duration::from_secs(options.pool_idle_timeout_seconds));
        if let Some(max_idle) = options.pool_max_idle_per_host {
            builder.pool_max_idle_per_host(max_idle);
        }
        Self {
            client: builder.build(https),
            decompress: options.decompress,
        }
    }

    fn build_request(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<Request<Full<Bytes>>, TransportError> {
        let mut builder = Request::builder()
            .method(descriptor.method().clone())
            .uri(descriptor.endpoint().clone());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(
                descriptor
                    .headers()
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone())),
            );
            if self.decompress && !headers.contains_key(ACCEPT_ENCODING) {
                headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));
            }
        }
        let request = match descriptor.body() {
            Some(body) => {
                if let Some(headers) = builder.headers_mut() {
                    if !headers.contains_key(CONTENT_TYPE) {
                        headers.insert(CONTENT_TYPE, body.content_type().clone());
                    }
                }
                builder.body(byte_body(body.bytes().clone()))?
            }
            None => builder.body(empty_body())?,
        };
        Ok(request)
    }

    fn response_encoding(&self, headers: &HeaderMap) -> Option<Encoding> {
        if !self.decompress {
            return None;
        }
        headers
            .get(CONTENT_ENCODING)
            .and_then(|hv| hv.to_str().ok())
            .and_then(Encoding::from_header)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(&TransportOptions::default())
    }
}

impl Transport for HttpTransport {
    async fn execute(
        &self,
        descriptor: &RequestDescriptor,
        policy: BodyPolicy,
    ) -> Result<ResponseSnapshot, TransportError> {
        let request = self.build_request(descriptor)?;
        let resp = self.client.request(request).await?;
        let (mut parts, body) = resp.into_parts();
        // Only a hint: the drain caps what it reserves up front.
        let content_length: usize = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|hv| hv.to_str().ok())
            .and_then(|hv| hv.parse().ok())
            .unwrap_or(1024);
        let drained = DrainBodyFuture::new(body, policy, content_length).await?;
        trace!(status = %parts.status, read = drained.read, "drained response body");

        let body = match (policy, self.response_encoding(&parts.headers)) {
            (BodyPolicy::Discard, _) => None,
            (BodyPolicy::Retain, Some(encoding)) => {
                let decoded = decompress(encoding, &drained.bytes, MAX_DECODED_BYTES)?;
                // The headers now describe the decoded bytes.
                parts.headers.remove(CONTENT_ENCODING);
                parts.headers.remove(CONTENT_LENGTH);
                Some(decoded)
            }
            (BodyPolicy::Retain, None) => Some(Bytes::from(drained.bytes)),
        };
        Ok(ResponseSnapshot {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}
