//! The relay handler: one inbound request in, one response out.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → log request line + headers
//!     → blacklist check            (hit: 418, nothing sent upstream)
//!     → resolve absolute target    (none: 400)
//!     → loop check                 (own address or own Via entry: 508)
//!     → stamp Via, Transport::forward (failure: UpstreamFailurePolicy)
//!     → ResponseSink: headers, cookies, then status
//!     → pump task: StreamCopier(upstream body → response body)
//! ```

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::SET_COOKIE, Method, Request, Response, StatusCode},
    Extension,
};

use crate::config::UpstreamFailurePolicy;
use crate::http::hops::is_self_target;
use crate::http::request::{request_host, target_uri};
use crate::http::response::ResponseSink;
use crate::http::server::{AppState, ListenerInfo};
use crate::observability::logging::log_request;

/// Fallback handler for every inbound request.
pub async fn relay_handler(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    Extension(listener): Extension<ListenerInfo>,
    mut request: Request<Body>,
) -> Response<Body> {
    log_request(remote, &request);

    let host = request_host(&request).map(str::to_owned);
    if let Some(host) = host.as_deref() {
        if state.blacklist.contains(host) {
            tracing::warn!(remote = %remote, host = %host, "Host in blacklist, refusing");
            return ResponseSink::new().finish(StatusCode::IM_A_TEAPOT);
        }
    }

    if request.method() == Method::CONNECT {
        tracing::warn!(remote = %remote, target = %request.uri(), "CONNECT tunnelling not supported");
        return ResponseSink::new().finish(StatusCode::METHOD_NOT_ALLOWED);
    }

    let Some(target) = target_uri(&request, &listener.scheme) else {
        tracing::warn!(remote = %remote, uri = %request.uri(), "No target host in request");
        return ResponseSink::new().finish(StatusCode::BAD_REQUEST);
    };

    if is_self_target(&target, listener.local_addr) || state.hop.seen_in(request.headers()) {
        tracing::warn!(remote = %remote, target = %target, "Request loops back into this proxy");
        return ResponseSink::new().finish(StatusCode::LOOP_DETECTED);
    }
    state.hop.stamp(request.headers_mut());

    let mut outbound = match state.transport.forward(request, target).await {
        Ok(response) => response,
        Err(e) => match state.upstream_failure {
            UpstreamFailurePolicy::BadGateway => {
                tracing::error!(remote = %remote, error = %e, connect = e.is_connect(), "Upstream request failed");
                return ResponseSink::new().finish(StatusCode::BAD_GATEWAY);
            }
            UpstreamFailurePolicy::Abort => {
                tracing::error!(
                    remote = %remote,
                    error = %e,
                    connect = e.is_connect(),
                    "Upstream request failed, dropping connection"
                );
                // Unwinds this connection's task only; the client sees a reset.
                panic!("upstream request failed: {e}");
            }
        },
    };

    let mut sink = ResponseSink::new();
    for (name, value) in outbound.headers.iter() {
        sink.append_header(name.clone(), value.clone());
    }
    for cookie in std::mem::take(&mut outbound.cookies) {
        sink.append_header(SET_COOKIE, cookie.raw().clone());
    }

    let status = outbound.status;
    let copier = state.copier;
    let (response, mut writer) = sink.write_status(status, copier.buffer_size());

    let mut body = outbound.into_body_reader();
    tokio::spawn(async move {
        match copier.copy(&mut body, &mut writer).await {
            Ok(bytes) => tracing::debug!(remote = %remote, status = %status, bytes, "Response streamed"),
            Err(e) if e.is_sink_closed() => {
                tracing::debug!(remote = %remote, error = %e, "Client went away mid-response")
            }
            Err(e) => tracing::warn!(remote = %remote, error = %e, "Response body copy failed"),
        }
    });

    response
}
