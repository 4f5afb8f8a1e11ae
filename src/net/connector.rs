//! Upstream connector used by the pooled transport.
//!
//! # Responsibilities
//! - Dial TCP with a connect timeout and keep-alive
//! - Negotiate TLS for `https` destinations under a handshake timeout
//! - Route through an environment proxy (absolute-form for `http`,
//!   `CONNECT` tunnel for `https`)
//!
//! Implements `tower::Service<Uri>` so hyper-util's legacy client can pool the
//! resulting connections per scheme + authority.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::http::{uri::Scheme, HeaderValue, Uri};
use hyper::rt::{Read, ReadBufCursor, Write};
use hyper_util::client::legacy::connect::{Connected, Connection, HttpConnector};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::{client::TlsStream, TlsConnector};
use tower::Service;

use crate::config::TransportConfig;
use crate::net::env_proxy::EnvProxy;
use crate::net::prebuffered::Prebuffered;

/// Upper bound on the proxy's reply head to a `CONNECT` request.
const MAX_TUNNEL_RESPONSE: usize = 8 * 1024;

/// TCP stream that may still hold bytes read past a `CONNECT` reply.
type TunnelStream = Prebuffered<TcpStream>;

/// Error type for establishing an upstream connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("destination has no host: {0}")]
    MissingHost(Uri),

    #[error("dial failed: {0}")]
    Dial(Box<dyn std::error::Error + Send + Sync>),

    #[error("TLS handshake with {host} timed out after {timeout:?}")]
    HandshakeTimeout { host: String, timeout: Duration },

    #[error("TLS handshake with {host} failed: {source}")]
    Handshake { host: String, source: io::Error },

    #[error("invalid TLS server name: {0}")]
    InvalidServerName(String),

    #[error("proxy refused tunnel: {0}")]
    TunnelRefused(String),

    #[error("malformed CONNECT reply: {0}")]
    TunnelReply(#[source] httparse::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Dialer behind [`crate::net::Transport`].
#[derive(Clone)]
pub struct UpstreamConnector {
    http: HttpConnector,
    tls: TlsConnector,
    tls_handshake_timeout: Duration,
    proxies: Arc<EnvProxy>,
}

impl UpstreamConnector {
    /// Connector trusting the platform's native root certificates.
    pub fn new(config: &TransportConfig, proxies: Arc<EnvProxy>) -> Self {
        Self::with_client_tls(config, proxies, client_tls_config())
    }

    /// Connector verifying upstream certificates with `tls`.
    pub fn with_client_tls(
        config: &TransportConfig,
        proxies: Arc<EnvProxy>,
        tls: rustls::ClientConfig,
    ) -> Self {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(Some(config.dial_timeout()));
        http.set_keepalive(Some(config.keep_alive()));
        http.set_nodelay(true);

        Self {
            http,
            tls: TlsConnector::from(Arc::new(tls)),
            tls_handshake_timeout: config.tls_handshake_timeout(),
            proxies,
        }
    }

    async fn connect(mut self, dst: Uri) -> Result<UpstreamStream, ConnectError> {
        let is_https = dst.scheme() == Some(&Scheme::HTTPS);
        let host = dst
            .host()
            .ok_or_else(|| ConnectError::MissingHost(dst.clone()))?
            .to_string();
        let port = dst.port_u16().unwrap_or(if is_https { 443 } else { 80 });

        match (self.proxies.intercept(&dst), is_https) {
            (Some(proxy), true) => {
                tracing::debug!(%host, port, proxy = %proxy.uri(), "Tunnelling through proxy");
                let tcp = self.dial(proxy.uri().clone()).await?;
                let tunnel = tunnel(tcp, &host, port, proxy.basic_auth()).await?;
                let tls = self.handshake(tunnel, &host).await?;
                Ok(UpstreamStream::tls(tls))
            }
            (Some(proxy), false) => {
                tracing::debug!(%host, port, proxy = %proxy.uri(), "Forwarding through proxy");
                let tcp = self.dial(proxy.uri().clone()).await?;
                Ok(UpstreamStream::plain(tcp).via_proxy())
            }
            (None, true) => {
                let tcp = self.dial(dst).await?;
                let tls = self.handshake(Prebuffered::passthrough(tcp), &host).await?;
                Ok(UpstreamStream::tls(tls))
            }
            (None, false) => Ok(UpstreamStream::plain(self.dial(dst).await?)),
        }
    }

    async fn dial(&mut self, uri: Uri) -> Result<TcpStream, ConnectError> {
        let io = self
            .http
            .call(uri)
            .await
            .map_err(|e| ConnectError::Dial(e.into()))?;
        Ok(io.into_inner())
    }

    async fn handshake(
        &self,
        stream: TunnelStream,
        host: &str,
    ) -> Result<TlsStream<TunnelStream>, ConnectError> {
        let name = host.trim_start_matches('[').trim_end_matches(']');
        let server_name = ServerName::try_from(name.to_string())
            .map_err(|_| ConnectError::InvalidServerName(name.to_string()))?;

        match tokio::time::timeout(self.tls_handshake_timeout, self.tls.connect(server_name, stream))
            .await
        {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(ConnectError::Handshake {
                host: host.to_string(),
                source,
            }),
            Err(_) => Err(ConnectError::HandshakeTimeout {
                host: host.to_string(),
                timeout: self.tls_handshake_timeout,
            }),
        }
    }
}

impl Service<Uri> for UpstreamConnector {
    type Response = UpstreamStream;
    type Error = ConnectError;
    type Future = Pin<Box<dyn Future<Output = Result<UpstreamStream, ConnectError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        Box::pin(self.clone().connect(dst))
    }
}

fn client_tls_config() -> rustls::ClientConfig {
    let mut roots = rustls::RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for error in &native.errors {
        tracing::warn!(error = %error, "Failed to load a native root certificate");
    }
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    tracing::debug!(added, ignored, "Loaded native root certificates");

    let mut config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    config
}

/// Status line of a complete `CONNECT` reply head.
struct TunnelReply {
    header_len: usize,
    code: u16,
    reason: String,
}

/// Parse a `CONNECT` reply; `None` while the head is incomplete.
fn parse_tunnel_reply(buf: &[u8]) -> Result<Option<TunnelReply>, ConnectError> {
    let mut headers = [httparse::EMPTY_HEADER; 64];
    let mut reply = httparse::Response::new(&mut headers);
    match reply.parse(buf).map_err(ConnectError::TunnelReply)? {
        httparse::Status::Partial => Ok(None),
        httparse::Status::Complete(header_len) => Ok(Some(TunnelReply {
            header_len,
            code: reply.code.unwrap_or_default(),
            reason: reply.reason.unwrap_or_default().to_string(),
        })),
    }
}

/// Open a `CONNECT` tunnel to `host:port` over an established proxy connection.
///
/// Any 2xx reply opens the tunnel. Bytes the proxy sent after the reply head
/// stay readable on the returned stream.
async fn tunnel(
    tcp: TcpStream,
    host: &str,
    port: u16,
    authorization: Option<&HeaderValue>,
) -> Result<TunnelStream, ConnectError> {
    let mut stream = Prebuffered::new(tcp, MAX_TUNNEL_RESPONSE);

    let mut request = format!("CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n").into_bytes();
    if let Some(auth) = authorization {
        request.extend_from_slice(b"Proxy-Authorization: ");
        request.extend_from_slice(auth.as_bytes());
        request.extend_from_slice(b"\r\n");
    }
    request.extend_from_slice(b"\r\n");
    stream.write_all(&request).await?;

    let reply = loop {
        if stream.is_full() {
            return Err(ConnectError::TunnelRefused(
                "CONNECT response headers too large".to_string(),
            ));
        }
        if stream.buffer_more().await? == 0 {
            return Err(ConnectError::TunnelRefused(
                "connection closed during CONNECT".to_string(),
            ));
        }
        if let Some(reply) = parse_tunnel_reply(stream.buffer())? {
            break reply;
        }
    };
    stream.discard(reply.header_len);

    if (200..300).contains(&reply.code) {
        tracing::debug!(%host, port, status = reply.code, "Tunnel established");
        Ok(stream)
    } else {
        Err(ConnectError::TunnelRefused(format!("{} {}", reply.code, reply.reason)))
    }
}

enum MaybeTls {
    Plain(TokioIo<TcpStream>),
    Tls(Box<TokioIo<TlsStream<TunnelStream>>>),
}

/// A pooled upstream connection, plain or TLS.
pub struct UpstreamStream {
    io: MaybeTls,
    via_proxy: bool,
}

impl UpstreamStream {
    fn plain(tcp: TcpStream) -> Self {
        Self {
            io: MaybeTls::Plain(TokioIo::new(tcp)),
            via_proxy: false,
        }
    }

    fn tls(stream: TlsStream<TunnelStream>) -> Self {
        Self {
            io: MaybeTls::Tls(Box::new(TokioIo::new(stream))),
            via_proxy: false,
        }
    }

    /// Requests on this connection use absolute-form targets.
    fn via_proxy(mut self) -> Self {
        self.via_proxy = true;
        self
    }
}

impl Connection for UpstreamStream {
    fn connected(&self) -> Connected {
        let connected = match &self.io {
            MaybeTls::Plain(io) => io.inner().connected(),
            MaybeTls::Tls(io) => io.inner().get_ref().0.get_ref().connected(),
        };
        connected.proxy(self.via_proxy)
    }
}

impl Read for UpstreamStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.get_mut().io {
            MaybeTls::Plain(io) => Pin::new(io).poll_read(cx, buf),
            MaybeTls::Tls(io) => Pin::new(io.as_mut()).poll_read(cx, buf),
        }
    }
}

impl Write for UpstreamStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut self.get_mut().io {
            MaybeTls::Plain(io) => Pin::new(io).poll_write(cx, buf),
            MaybeTls::Tls(io) => Pin::new(io.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().io {
            MaybeTls::Plain(io) => Pin::new(io).poll_flush(cx),
            MaybeTls::Tls(io) => Pin::new(io.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().io {
            MaybeTls::Plain(io) => Pin::new(io).poll_shutdown(cx),
            MaybeTls::Tls(io) => Pin::new(io.as_mut()).poll_shutdown(cx),
        }
    }
}
