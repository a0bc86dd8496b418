use bytes::{BufMut, Bytes, BytesMut};
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method, Uri};
use serde::Serialize;

use crate::error::ConfigError;

const MULTIPART_BOUNDARY: &str = "volley-boundary";

/// Prepared request payload, sent unchanged by every attempt.
#[derive(Debug, Clone)]
pub struct RequestBody {
    content_type: HeaderValue,
    bytes: Bytes,
}

impl RequestBody {
    #[inline]
    #[must_use]
    pub fn content_type(&self) -> &HeaderValue {
        &self.content_type
    }

    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}

/// One logical HTTP request, shared read-only by all attempts of a run.
///
/// Built with the consuming `with_*` methods, after which it is never mutated.
/// The endpoint is checked on construction so a malformed URL can never reach dispatch.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    endpoint: Uri,
    headers: HeaderMap,
    body: Option<RequestBody>,
}

impl RequestDescriptor {
    pub fn new(method: Method, endpoint: &str) -> Result<Self, ConfigError> {
        let endpoint = parse_endpoint(endpoint)?;
        Ok(Self {
            method,
            endpoint,
            headers: HeaderMap::new(),
            body: None,
        })
    }

    #[inline]
    pub fn get(endpoint: &str) -> Result<Self, ConfigError> {
        Self::new(Method::GET, endpoint)
    }

    #[inline]
    pub fn post(endpoint: &str) -> Result<Self, ConfigError> {
        Self::new(Method::POST, endpoint)
    }

    /// Adds a header, replacing any previous value for the same name.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, ConfigError> {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| ConfigError::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    pub fn with_headers<'a, I>(self, headers: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        headers
            .into_iter()
            .try_fold(self, |slf, (name, value)| slf.with_header(name, value))
    }

    pub fn with_body<B: Into<Bytes>>(
        mut self,
        content_type: &str,
        bytes: B,
    ) -> Result<Self, ConfigError> {
        let content_type =
            HeaderValue::from_str(content_type).map_err(|e| ConfigError::InvalidHeader {
                name: CONTENT_TYPE.to_string(),
                reason: e.to_string(),
            })?;
        self.body = Some(RequestBody {
            content_type,
            bytes: bytes.into(),
        });
        Ok(self)
    }

    /// Serializes `value` once; every attempt sends the same bytes.
    pub fn with_json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, ConfigError> {
        let payload = serde_json::to_vec(value)?;
        self.with_body("application/json", payload)
    }

    /// `multipart/form-data` upload, one part per file named `file_{i}`.
    pub fn with_multipart<I, B>(self, files: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut buf = BytesMut::new();
        let mut count = 0usize;
        for (index, file) in files.into_iter().enumerate() {
            buf.put_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
            buf.put_slice(
                format!(
                    "Content-Disposition: form-data; name=\"file_{index}\"; filename=\"File{index}\"\r\n"
                )
                .as_bytes(),
            );
            buf.put_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            buf.put_slice(file.as_ref());
            buf.put_slice(b"\r\n");
            count += 1;
        }
        if count == 0 {
            return Err(ConfigError::EmptyMultipart);
        }
        buf.put_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
        self.with_body(
            &format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
            buf.freeze(),
        )
    }

    #[inline]
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    #[inline]
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    #[must_use]
    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Uri, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };
    let uri: Uri = endpoint.parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
    match uri.scheme_str() {
        Some("http" | "https") => {}
        Some(_) => return Err(invalid("scheme must be http or https")),
        None => return Err(invalid("endpoint must be an absolute url")),
    }
    match uri.host() {
        Some(host) if !host.is_empty() => Ok(uri),
        _ => Err(invalid("missing host")),
    }
}
