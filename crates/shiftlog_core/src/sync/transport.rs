//! HTTP seam for the sync client.

use std::time::Duration;

/// Raw HTTP answer: status code and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Posts a JSON document and returns the raw response.
///
/// `Err` carries a transport failure message (connect, timeout, TLS).
pub trait SyncTransport {
    fn post_json(&self, url: &str, body: &str) -> Result<TransportResponse, String>;
}

/// Blocking `reqwest` transport.
///
/// Requests go out as `text/plain`, which script-hosted endpoints accept
/// without a CORS preflight.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| format!("failed to build http client: {err}"))?;
        Ok(Self { client })
    }
}

impl SyncTransport for HttpTransport {
    fn post_json(&self, url: &str, body: &str) -> Result<TransportResponse, String> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(body.to_string())
            .send()
            .map_err(|err| err.to_string())?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|err| err.to_string())?;
        Ok(TransportResponse { status, body })
    }
}
