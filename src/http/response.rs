//! Response handling and transformation.
//!
//! # Responsibilities
//! - Split an upstream response into status, headers, cookies and body
//! - Collect headers for the client before the status is committed
//! - Stream the body to the client through a bounded pipe
//!
//! # Design Decisions
//! - Streaming responses avoid buffering the entire body
//! - Headers are passed through untouched; `Set-Cookie` is carried separately
//!   so every cookie is emitted exactly once
//! - Writing the status consumes the sink, so headers can never follow it

use std::io;

use axum::body::Body;
use axum::http::{header::SET_COOKIE, HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use futures_util::TryStreamExt;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use tokio::io::{AsyncRead, DuplexStream};
use tokio_util::io::{ReaderStream, StreamReader};

/// One upstream `Set-Cookie` entry, kept exactly as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieDescriptor {
    raw: HeaderValue,
}

impl CookieDescriptor {
    pub fn new(raw: HeaderValue) -> Self {
        Self { raw }
    }

    /// The serialized cookie as sent by the upstream.
    pub fn raw(&self) -> &HeaderValue {
        &self.raw
    }
}

/// Upstream response as handed back by the transport.
#[derive(Debug)]
pub struct OutboundResponse {
    pub status: StatusCode,
    /// Every upstream header except `Set-Cookie`.
    pub headers: HeaderMap,
    /// `Set-Cookie` entries in arrival order.
    pub cookies: Vec<CookieDescriptor>,
    pub body: Incoming,
}

impl OutboundResponse {
    pub fn from_upstream(response: Response<Incoming>) -> Self {
        let (parts, body) = response.into_parts();
        let (headers, cookies) = split_cookies(parts.headers);
        Self {
            status: parts.status,
            headers,
            cookies,
            body,
        }
    }

    /// Body as an `AsyncRead`, for the stream copier.
    pub fn into_body_reader(self) -> impl AsyncRead + Send + Unpin + 'static {
        let stream = self.body.into_data_stream().map_err(io::Error::other);
        Box::pin(StreamReader::new(stream))
    }
}

/// Separate `Set-Cookie` values from the rest of a header map.
fn split_cookies(mut headers: HeaderMap) -> (HeaderMap, Vec<CookieDescriptor>) {
    let cookies = match headers.entry(SET_COOKIE) {
        axum::http::header::Entry::Occupied(entry) => {
            let (_, values) = entry.remove_entry_mult();
            values.map(CookieDescriptor::new).collect()
        }
        axum::http::header::Entry::Vacant(_) => Vec::new(),
    };
    (headers, cookies)
}

/// Write end of a streamed response body.
pub type BodyWriter = DuplexStream;

/// Client-facing response under construction.
///
/// Headers are attached first; [`ResponseSink::write_status`] or
/// [`ResponseSink::finish`] then commit the status line and consume the sink.
#[derive(Debug, Default)]
pub struct ResponseSink {
    headers: HeaderMap,
}

impl ResponseSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header value, keeping earlier values for the same name.
    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    /// Commit `status` with an empty body.
    pub fn finish(self, status: StatusCode) -> Response<Body> {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        response
    }

    /// Commit `status` and open a streamed body.
    ///
    /// Bytes written to the returned [`BodyWriter`] reach the client in order;
    /// dropping the writer ends the body. `pipe_capacity` bounds how much
    /// data may sit between the writer and the client.
    pub fn write_status(self, status: StatusCode, pipe_capacity: usize) -> (Response<Body>, BodyWriter) {
        let (writer, reader) = tokio::io::duplex(pipe_capacity);
        let body = Body::from_stream(ReaderStream::with_capacity(reader, pipe_capacity));

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = self.headers;
        (response, writer)
    }
}
