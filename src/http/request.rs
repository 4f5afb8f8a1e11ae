//! Request inspection.
//!
//! # Responsibilities
//! - Extract the host used for blacklist decisions
//! - Resolve the absolute upstream target of a request
//!
//! # Design Decisions
//! - Absolute-form URIs (the normal proxy case) win over the `Host` header
//! - User info is never part of the host or the upstream target
//! - Origin-form requests are resolved against the scheme of the listener
//!   that accepted them

use axum::http::{header::HOST, uri::Authority, uri::Scheme, Request, Uri};

fn strip_userinfo(authority: &Authority) -> &str {
    let raw = authority.as_str();
    raw.rsplit_once('@').map_or(raw, |(_, host)| host)
}

/// Host the client asked for, as `host[:port]`.
///
/// The authority of an absolute-form URI, otherwise the `Host` header.
pub fn request_host<B>(request: &Request<B>) -> Option<&str> {
    if let Some(authority) = request.uri().authority() {
        let host = strip_userinfo(authority);
        if !host.is_empty() {
            return Some(host);
        }
    }
    request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|h| !h.is_empty())
}

/// Absolute URI to forward `request` to.
///
/// `listener_scheme` fills in the scheme for origin-form requests. Returns
/// `None` when no host can be determined.
pub fn target_uri<B>(request: &Request<B>, listener_scheme: &Scheme) -> Option<Uri> {
    let uri = request.uri();
    let host = request_host(request)?;
    let scheme = uri.scheme().cloned().unwrap_or_else(|| listener_scheme.clone());
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());

    Uri::builder()
        .scheme(scheme)
        .authority(host)
        .path_and_query(path_and_query)
        .build()
        .ok()
}
