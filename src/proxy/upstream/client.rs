// Upstream client implementation
// Forwards proxied requests to backend map services

use axum::http::{header, HeaderMap, Method};
use bytes::Bytes;
use reqwest::{Client, Response};
use url::Url;

use crate::proxy::config::UpstreamProxyConfig;

/// Client headers passed through to the map service
pub const FORWARDED_HEADERS: [header::HeaderName; 3] =
    [header::USER_AGENT, header::ACCEPT, header::ACCEPT_ENCODING];

pub struct UpstreamClient {
    http_client: Client,
}

impl UpstreamClient {
    pub fn new(proxy_config: Option<&UpstreamProxyConfig>, timeout_secs: Option<u64>) -> Self {
        Self {
            http_client: crate::utils::http::create_client_with_proxy(timeout_secs, proxy_config),
        }
    }

    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    /// Copy the allowlisted headers (plus `Content-Type` when a body goes along)
    fn forwarded_headers(incoming: &HeaderMap, with_body: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for name in FORWARDED_HEADERS.iter() {
            if let Some(value) = incoming.get(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
        if with_body {
            if let Some(value) = incoming.get(header::CONTENT_TYPE) {
                headers.insert(header::CONTENT_TYPE, value.clone());
            }
        }
        headers
    }

    /// Send one request upstream. GET and HEAD never carry a body.
    pub async fn forward(
        &self,
        method: Method,
        url: Url,
        incoming_headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Response, reqwest::Error> {
        let with_body = method != Method::GET && method != Method::HEAD;
        let headers = Self::forwarded_headers(incoming_headers, with_body);

        let mut request = self
            .http_client
            .request(method, url)
            .headers(headers);
        if with_body {
            request = request.body(body);
        }

        request.send().await
    }
}
