//! Request-gating middleware: authentication, permission checks, rate
//! limiting, and audit recording.

pub mod audit;
pub mod auth;
pub mod permission;
pub mod rate_limit;

use axum::http::HeaderMap;

/// Best-effort client IP: first entry of `X-Forwarded-For`, else
/// `X-Real-IP`, else `"unknown"`. Rate limit keys and audit entries both
/// use this, so a proxied deployment must set one of the headers.
pub(crate) fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real = real.trim();
        if !real.is_empty() {
            return real.to_string();
        }
    }
    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), "203.0.113.7");
    }

    #[test]
    fn falls_back_to_real_ip_then_unknown() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers), "198.51.100.2");
        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }
}
