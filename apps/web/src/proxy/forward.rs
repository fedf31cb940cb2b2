use std::time::Duration;

use anyhow::Context;
use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    response::Response,
};
use reqwest::{redirect::Policy, Client};
use tracing::debug;

use crate::errors::AppError;
use crate::proxy::ProxyRule;

/// Largest request body forwarded upstream.
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Headers that only describe the current connection and must not cross the proxy.
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Builds the upstream HTTP client. Redirects are handed back to the browser.
pub fn build_client() -> anyhow::Result<Client> {
    Client::builder()
        .redirect(Policy::none())
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .context("Failed to build upstream HTTP client")
}

fn is_hop_by_hop(name: &header::HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Inbound headers rewritten for the upstream request.
///
/// Drops hop-by-hop headers and `Host`, points `Origin` at the target, and
/// re-attaches the browser's cookies when the rule forwards them.
pub fn upstream_headers(inbound: &HeaderMap, rule: &ProxyRule) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        if is_hop_by_hop(name) || name == header::HOST || name == header::COOKIE {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    if let Ok(origin) = HeaderValue::from_str(&rule.target_origin) {
        headers.insert(header::ORIGIN, origin);
    }

    if rule.forward_cookies {
        let cookies: Vec<&str> = inbound
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if !cookies.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&cookies.join("; ")) {
                headers.insert(header::COOKIE, value);
            }
        }
    }

    headers
}

/// Forwards one HTTP request and streams the upstream response back.
pub async fn forward(client: &Client, rule: &ProxyRule, req: Request) -> Result<Response, AppError> {
    let (parts, body) = req.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = rule.target_url(path_and_query);

    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| AppError::PayloadTooLarge {
            limit: MAX_BODY_BYTES,
        })?;

    debug!(prefix = rule.path_prefix, method = %parts.method, %url, "Forwarding request");

    let upstream = client
        .request(parts.method.clone(), &url)
        .headers(upstream_headers(&parts.headers, rule))
        .body(body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                AppError::UpstreamTimeout(format!("{url}: {e}"))
            } else {
                AppError::BadGateway(format!("{url}: {e}"))
            }
        })?;

    let mut response = Response::builder().status(upstream.status());
    if let Some(headers) = response.headers_mut() {
        for (name, value) in upstream.headers() {
            if !is_hop_by_hop(name) {
                headers.append(name.clone(), value.clone());
            }
        }
    }

    response
        .body(Body::from_stream(upstream.bytes_stream()))
        .map_err(|e| AppError::Internal(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProxyTable;
    use axum::http::StatusCode;

    fn rule() -> ProxyRule {
        ProxyTable::new("http://backend:8000")
            .match_path("/api/jobs")
            .unwrap()
            .clone()
    }

    #[test]
    fn test_headers_rewritten_for_upstream() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::HOST, HeaderValue::from_static("growiq.io"));
        inbound.insert(header::ORIGIN, HeaderValue::from_static("https://growiq.io"));
        inbound.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        inbound.insert(header::COOKIE, HeaderValue::from_static("session=abc"));
        inbound.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let headers = upstream_headers(&inbound, &rule());

        assert!(headers.get(header::HOST).is_none());
        assert!(headers.get(header::CONNECTION).is_none());
        assert_eq!(headers[header::ORIGIN], "http://backend:8000");
        assert_eq!(headers[header::COOKIE], "session=abc");
        assert_eq!(headers[header::ACCEPT], "application/json");
    }

    #[test]
    fn test_split_cookie_headers_are_joined() {
        let mut inbound = HeaderMap::new();
        inbound.append(header::COOKIE, HeaderValue::from_static("session=abc"));
        inbound.append(header::COOKIE, HeaderValue::from_static("theme=dark"));

        let headers = upstream_headers(&inbound, &rule());

        assert_eq!(headers.get_all(header::COOKIE).iter().count(), 1);
        assert_eq!(headers[header::COOKIE], "session=abc; theme=dark");
    }

    #[test]
    fn test_cookies_withheld_when_rule_does_not_forward_them() {
        let mut rule = rule();
        rule.forward_cookies = false;
        let mut inbound = HeaderMap::new();
        inbound.insert(header::COOKIE, HeaderValue::from_static("session=abc"));

        assert!(upstream_headers(&inbound, &rule).get(header::COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_bad_gateway() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let origin = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let table = ProxyTable::new(&origin);
        let rule = table.match_path("/api/jobs").unwrap();
        let req = Request::builder()
            .uri("/api/jobs")
            .body(Body::empty())
            .unwrap();

        let err = forward(&build_client().unwrap(), rule, req)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadGateway(_)));
        assert_eq!(
            axum::response::IntoResponse::into_response(err).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
