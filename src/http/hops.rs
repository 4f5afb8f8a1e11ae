//! Forwarding loop detection.
//!
//! # Responsibilities
//! - Recognise targets that point back at the listener that accepted them
//! - Stamp forwarded requests with a `Via` entry naming this process
//! - Recognise requests that already carry that entry
//!
//! # Design Decisions
//! - The address check catches the direct case (`Host` is our own
//!   `host:port`) before anything is dialled
//! - The `Via` check catches indirect loops (a name or address that resolves
//!   to us) after exactly one extra hop
//! - Each server instance has its own token, so two proxies chained in one
//!   process are not mistaken for a loop

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};

use axum::http::{header::VIA, uri::Scheme, HeaderMap, HeaderValue, Uri};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(0);

/// This proxy's entry in the `Via` header.
#[derive(Debug, Clone)]
pub struct HopMarker {
    token: String,
    entry: HeaderValue,
}

impl HopMarker {
    pub fn new() -> Self {
        let instance = NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed);
        let token = format!("relay-proxy-{:x}-{}", std::process::id(), instance);
        let entry = HeaderValue::from_str(&format!("1.1 {}", token))
            .unwrap_or_else(|_| HeaderValue::from_static("1.1 relay-proxy"));
        Self { token, entry }
    }

    /// Whether any `Via` entry in `headers` was added by this proxy.
    pub fn seen_in(&self, headers: &HeaderMap) -> bool {
        headers
            .get_all(VIA)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .filter_map(|entry| entry.split_whitespace().nth(1))
            .any(|received_by| received_by == self.token)
    }

    /// Append this proxy's `Via` entry, keeping earlier ones.
    pub fn stamp(&self, headers: &mut HeaderMap) {
        headers.append(VIA, self.entry.clone());
    }
}

impl Default for HopMarker {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `target` would be dialled back into the listener bound at `local`.
///
/// Only literal addresses and `localhost` are checked; names that resolve to
/// this host are left to the `Via` check.
pub fn is_self_target(target: &Uri, local: SocketAddr) -> bool {
    let Some(host) = target.host() else {
        return false;
    };
    let default_port = if target.scheme() == Some(&Scheme::HTTPS) { 443 } else { 80 };
    if target.port_u16().unwrap_or(default_port) != local.port() {
        return false;
    }

    let listens_on_loopback = local.ip().is_loopback() || local.ip().is_unspecified();
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.eq_ignore_ascii_case("localhost") {
        return listens_on_loopback;
    }
    match host.parse::<IpAddr>() {
        Ok(ip) => {
            ip == local.ip() || ip.is_unspecified() || (ip.is_loopback() && listens_on_loopback)
        }
        Err(_) => false,
    }
}
