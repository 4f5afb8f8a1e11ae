//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::io::BufReader;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum_server::tls_rustls::RustlsConfig;
use relay_proxy::config::ServerConfig;
use relay_proxy::net::connector::UpstreamConnector;
use relay_proxy::net::{EnvProxy, Transport};
use relay_proxy::{Blacklist, RelayServer, Shutdown};
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::{TlsAcceptor, TlsConnector};

/// A raw-TCP upstream that answers every connection with the same bytes.
pub struct MockUpstream {
    pub addr: SocketAddr,
    accepts: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockUpstream {
    /// Connections accepted so far.
    pub fn accepts(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }

    /// Raw requests (head and body) received so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn authority(&self) -> String {
        self.addr.to_string()
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Build a complete HTTP/1.1 response with `Content-Length` and `Connection: close`.
pub fn http_response(status_line: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut raw = format!("HTTP/1.1 {}\r\n", status_line);
    for (name, value) in headers {
        raw.push_str(&format!("{}: {}\r\n", name, value));
    }
    raw.push_str(&format!("Content-Length: {}\r\nConnection: close\r\n\r\n", body.len()));
    let mut raw = raw.into_bytes();
    raw.extend_from_slice(body);
    raw
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return String::from_utf8_lossy(&data).into_owned(),
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    };

    let head = String::from_utf8_lossy(&data[..head_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while data.len() < head_end + content_length {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&data).into_owned()
}

/// Start a mock upstream on an ephemeral port that replies with `response`.
pub async fn start_mock_upstream(response: Vec<u8>) -> MockUpstream {
    start_delayed_upstream(response, Duration::ZERO).await
}

/// Like [`start_mock_upstream`], but every reply is held back for `delay`
/// after the request has been read.
pub async fn start_delayed_upstream(response: Vec<u8>, delay: Duration) -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));
    let response = Arc::new(response);

    let (a, r) = (accepts.clone(), requests.clone());
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            a.fetch_add(1, Ordering::SeqCst);
            let (r, response) = (r.clone(), response.clone());
            tokio::spawn(async move {
                let request = read_request(&mut socket).await;
                r.lock().unwrap().push(request);
                tokio::time::sleep(delay).await;
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    MockUpstream {
        addr,
        accepts,
        requests,
    }
}

/// Address of a port with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A proxy running in the background; stops when dropped.
pub struct ProxyHandle {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl ProxyHandle {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// reqwest client that sends every request through this proxy.
    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .proxy(reqwest::Proxy::all(self.url()).unwrap())
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap()
    }
}

impl Drop for ProxyHandle {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Relay server that never uses environment proxies.
pub fn relay_server(config: &ServerConfig, blacklist: Blacklist) -> RelayServer {
    let transport = Transport::with_proxies(&config.transport, EnvProxy::disabled());
    RelayServer::with_transport(config, blacklist, transport).unwrap()
}

/// Relay server whose upstream TLS trusts only the test CA.
pub fn trusting_relay_server(config: &ServerConfig, blacklist: Blacklist) -> RelayServer {
    let proxies = Arc::new(EnvProxy::disabled());
    let connector =
        UpstreamConnector::with_client_tls(&config.transport, proxies.clone(), test_client_tls());
    let transport = Transport::with_connector(&config.transport, connector, proxies);
    RelayServer::with_transport(config, blacklist, transport).unwrap()
}

/// Serve plaintext HTTP for `server` on a new ephemeral port.
pub async fn spawn_listener(server: &RelayServer, shutdown: &Shutdown) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (server, signal) = (server.clone(), shutdown.subscribe());
    tokio::spawn(async move {
        let _ = server.serve(listener, signal).await;
    });
    addr
}

/// Start the proxy on an ephemeral port, never using environment proxies.
pub async fn start_proxy(config: ServerConfig, blacklist: Blacklist) -> ProxyHandle {
    let server = relay_server(&config, blacklist);
    let shutdown = Shutdown::new();
    let addr = spawn_listener(&server, &shutdown).await;
    ProxyHandle { addr, shutdown }
}

/// Start `server` on an ephemeral HTTPS port using the test certificate.
pub async fn start_tls_proxy(server: RelayServer) -> ProxyHandle {
    let tls = RustlsConfig::from_pem_file(fixture_path("server.pem"), fixture_path("server.key"))
        .await
        .unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.serve_tls(listener, tls, signal).await;
    });

    ProxyHandle { addr, shutdown }
}

pub fn fixture_path(name: &str) -> PathBuf {
    [env!("CARGO_MANIFEST_DIR"), "tests", "fixtures", name].iter().collect()
}

fn fixture(name: &str) -> BufReader<std::fs::File> {
    BufReader::new(std::fs::File::open(fixture_path(name)).unwrap())
}

/// Client TLS config trusting only the test CA.
pub fn test_client_tls() -> rustls::ClientConfig {
    let mut roots = rustls::RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut fixture("ca.pem")) {
        roots.add(cert.unwrap()).unwrap();
    }
    rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth()
}

/// A TLS origin using the test certificate; replies with `response` and
/// closes. Returns the address and a count of completed handshakes.
pub async fn start_tls_upstream(response: Vec<u8>) -> (SocketAddr, Arc<AtomicUsize>) {
    let certs = rustls_pemfile::certs(&mut fixture("server.pem"))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let key = rustls_pemfile::private_key(&mut fixture("server.key"))
        .unwrap()
        .unwrap();
    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handshakes = Arc::new(AtomicUsize::new(0));
    let (count, response) = (handshakes.clone(), Arc::new(response));
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let (acceptor, count, response) = (acceptor.clone(), count.clone(), response.clone());
            tokio::spawn(async move {
                let Ok(mut tls) = acceptor.accept(socket).await else {
                    return;
                };
                count.fetch_add(1, Ordering::SeqCst);
                let _ = read_head(&mut tls).await;
                let _ = tls.write_all(&response).await;
                let _ = tls.shutdown().await;
            });
        }
    });
    (addr, handshakes)
}

async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> Vec<u8> {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];
    while !data.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    }
    data
}

/// Write `request` over TLS to the proxy at `proxy` and return the reply.
pub async fn tls_exchange(proxy: SocketAddr, request: &str) -> String {
    let connector = TlsConnector::from(Arc::new(test_client_tls()));
    let tcp = TcpStream::connect(proxy).await.unwrap();
    let name = ServerName::try_from("127.0.0.1").unwrap();
    let mut tls = connector.connect(name, tcp).await.unwrap();
    tls.write_all(request.as_bytes()).await.unwrap();
    read_until_close(&mut tls).await
}

async fn read_until_close<S: AsyncRead + Unpin>(stream: &mut S) -> String {
    let mut response = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match tokio::time::timeout(Duration::from_secs(10), stream.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => response.extend_from_slice(&buf[..n]),
            _ => break,
        }
    }
    String::from_utf8_lossy(&response).into_owned()
}

/// Write `request` to the proxy over a raw socket and return everything it sends back.
pub async fn raw_exchange(proxy: SocketAddr, request: &str) -> String {
    let mut socket = TcpStream::connect(proxy).await.unwrap();
    socket.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(10), socket.read_to_end(&mut response)).await;
    String::from_utf8_lossy(&response).into_owned()
}
