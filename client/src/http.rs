//! reqwest-backed transport.

use crate::transport::{ApiRequest, ApiResponse, Method, Transport, TransportError};
use shopsync_core::session::{AccessToken, RefreshToken, Session};

/// Remote API transport over HTTPS.
///
/// Maps the remote's verdicts onto [`TransportError`]: a 401 is the
/// expired-credential signal, any other non-success status is a rejection
/// carrying the server's stated reason, and everything below the HTTP
/// layer is a network error.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Creates a transport for the API at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    fn reqwest_method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }

    /// Pulls the server's stated reason out of an error body.
    fn rejection_reason(body: &serde_json::Value, status: u16) -> String {
        body.get("error")
            .or_else(|| body.get("message"))
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| format!("HTTP {status}"), ToString::to_string)
    }

    async fn read_body(response: reqwest::Response) -> serde_json::Value {
        // An empty or non-JSON body is represented as Null; the verdict
        // was already carried by the status code.
        response
            .json::<serde_json::Value>()
            .await
            .unwrap_or(serde_json::Value::Null)
    }
}

impl Transport for HttpTransport {
    async fn execute(
        &self,
        request: &ApiRequest,
        token: &AccessToken,
    ) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .client
            .request(Self::reqwest_method(request.method), self.url(&request.path))
            .bearer_auth(token.as_str());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = Self::read_body(response).await;

        match status {
            200..=299 => Ok(ApiResponse { status, body }),
            401 => Err(TransportError::CredentialExpired),
            _ => Err(TransportError::Rejected {
                status,
                reason: Self::rejection_reason(&body, status),
            }),
        }
    }

    async fn renew(&self, refresh: &RefreshToken) -> Result<Session, TransportError> {
        let response = self
            .client
            .post(self.url("/auth/renew"))
            .json(&serde_json::json!({ "refreshToken": refresh.as_str() }))
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let status = response.status().as_u16();

        if (200..=299).contains(&status) {
            response
                .json::<Session>()
                .await
                .map_err(|e| TransportError::Network(format!("Malformed renewal response: {e}")))
        } else {
            let body = Self::read_body(response).await;
            Err(TransportError::Rejected {
                status,
                reason: Self::rejection_reason(&body, status),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let transport = HttpTransport::new("https://api.example.com/");
        assert_eq!(
            transport.url("/orders"),
            "https://api.example.com/orders"
        );
    }

    #[test]
    fn rejection_reason_prefers_server_error_field() {
        let body = serde_json::json!({"error": "order already cancelled"});
        assert_eq!(
            HttpTransport::rejection_reason(&body, 409),
            "order already cancelled"
        );
        assert_eq!(
            HttpTransport::rejection_reason(&serde_json::Value::Null, 500),
            "HTTP 500"
        );
    }
}
