//! Outbound proxy selection from the environment.
//!
//! Proxy URLs and `NO_PROXY` rules come from hyper-util's proxy [`Matcher`]
//! (`HTTP_PROXY`, `HTTPS_PROXY`, `ALL_PROXY`, `NO_PROXY`, upper case first),
//! read once at startup. On top of it:
//! - `localhost` and loopback addresses always connect directly
//! - only `http://` proxies are dialled; anything else is skipped with a warning

use std::net::IpAddr;

use axum::http::{uri::Scheme, Uri};
use hyper_util::client::proxy::matcher::{Intercept, Matcher};

/// Proxy rules applied to every outbound destination.
#[derive(Debug, Default)]
pub struct EnvProxy {
    matcher: Option<Matcher>,
}

impl EnvProxy {
    /// Never proxy.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        Self {
            matcher: Some(Matcher::from_env()),
        }
    }

    /// Build from explicit `HTTP_PROXY`, `HTTPS_PROXY` and `NO_PROXY` values.
    pub fn from_values(http: Option<&str>, https: Option<&str>, no_proxy: Option<&str>) -> Self {
        let matcher = Matcher::builder()
            .http(http.unwrap_or_default())
            .https(https.unwrap_or_default())
            .no(no_proxy.unwrap_or_default())
            .build();
        Self {
            matcher: Some(matcher),
        }
    }

    /// Proxy to use for `dst`, or `None` to connect directly.
    pub fn intercept(&self, dst: &Uri) -> Option<Intercept> {
        let host = dst.host()?;
        if is_local(host) {
            return None;
        }

        let intercept = self.matcher.as_ref()?.intercept(dst)?;
        if intercept.uri().scheme() != Some(&Scheme::HTTP) {
            tracing::warn!(proxy = ?intercept, destination = %dst, "Unsupported proxy scheme, connecting directly");
            return None;
        }
        Some(intercept)
    }
}

fn is_local(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host.eq_ignore_ascii_case("localhost")
        || host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}
