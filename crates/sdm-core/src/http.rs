//! HTTP client construction: redirect policy, timeouts, proxies.
//!
//! Proxy discovery (`HTTP_PROXY`/`HTTPS_PROXY`/`ALL_PROXY`/`NO_PROXY`)
//! is handled by the client library's system-proxy support.

use crate::config::SdmConfig;
use reqwest::redirect;

/// Maximum redirect hops before a request is failed.
pub const MAX_REDIRECTS: usize = 10;

/// Headers allowed to survive a cross-origin redirect. Everything else
/// (cookies, auth, custom headers) must be dropped.
pub const SAFE_CROSS_ORIGIN_HEADERS: [&str; 5] = [
    "user-agent",
    "accept",
    "accept-language",
    "accept-encoding",
    "range",
];

/// Decision for one redirect hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectCheck {
    Follow,
    /// http/https may not redirect to another protocol.
    CrossProtocol,
    TooManyHops,
}

/// Pure redirect decision: `previous` is the chain so far (first entry is
/// the original URL), `next` the redirect target.
pub fn check_redirect(previous: &[url::Url], next: &url::Url) -> RedirectCheck {
    if previous.len() >= MAX_REDIRECTS {
        return RedirectCheck::TooManyHops;
    }
    match next.scheme() {
        "http" | "https" => RedirectCheck::Follow,
        _ => RedirectCheck::CrossProtocol,
    }
}

/// True when `name` may be forwarded to a different origin.
pub fn is_safe_cross_origin_header(name: &str) -> bool {
    SAFE_CROSS_ORIGIN_HEADERS
        .iter()
        .any(|h| name.eq_ignore_ascii_case(h))
}

/// Drops request headers that must not cross an origin boundary.
pub fn strip_unsafe_cross_origin(headers: &[(String, String)]) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(name, _)| is_safe_cross_origin_header(name))
        .cloned()
        .collect()
}

/// True when `a` and `b` share scheme, host and port.
pub fn same_origin(a: &url::Url, b: &url::Url) -> bool {
    a.scheme() == b.scheme() && a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

/// Builds the shared HTTP client used by probes and segment transfers.
pub fn build_client(cfg: &SdmConfig) -> Result<reqwest::Client, reqwest::Error> {
    let policy = redirect::Policy::custom(|attempt| {
        match check_redirect(attempt.previous(), attempt.url()) {
            RedirectCheck::Follow => attempt.follow(),
            RedirectCheck::CrossProtocol => attempt.error("cross-protocol redirect refused"),
            RedirectCheck::TooManyHops => attempt.error("too many redirects"),
        }
    });

    let mut builder = reqwest::Client::builder().redirect(policy);
    if let Some(timeout) = cfg.per_request_timeout() {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(s: &str) -> url::Url {
        url::Url::parse(s).unwrap()
    }

    #[test]
    fn follows_within_http_family() {
        let prev = vec![u("http://a.example/x")];
        assert_eq!(
            check_redirect(&prev, &u("https://b.example/y")),
            RedirectCheck::Follow
        );
    }

    #[test]
    fn rejects_cross_protocol() {
        let prev = vec![u("https://a.example/x")];
        assert_eq!(
            check_redirect(&prev, &u("ftp://a.example/y")),
            RedirectCheck::CrossProtocol
        );
    }

    #[test]
    fn rejects_after_max_hops() {
        let prev: Vec<_> = (0..MAX_REDIRECTS)
            .map(|i| u(&format!("http://a.example/{i}")))
            .collect();
        assert_eq!(
            check_redirect(&prev, &u("http://a.example/final")),
            RedirectCheck::TooManyHops
        );
    }

    #[test]
    fn safe_header_set() {
        assert!(is_safe_cross_origin_header("User-Agent"));
        assert!(is_safe_cross_origin_header("range"));
        assert!(!is_safe_cross_origin_header("Authorization"));
        assert!(!is_safe_cross_origin_header("Cookie"));
    }

    #[test]
    fn strips_unsafe_headers() {
        let headers = vec![
            ("Accept".to_string(), "*/*".to_string()),
            ("Authorization".to_string(), "Bearer x".to_string()),
            ("Range".to_string(), "bytes=0-1".to_string()),
        ];
        let kept = strip_unsafe_cross_origin(&headers);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|(n, _)| n != "Authorization"));
    }

    #[test]
    fn origin_comparison() {
        assert!(same_origin(&u("http://a.example/x"), &u("http://a.example:80/y")));
        assert!(!same_origin(&u("http://a.example/x"), &u("https://a.example/x")));
        assert!(!same_origin(&u("http://a.example/x"), &u("http://b.example/x")));
    }
}
