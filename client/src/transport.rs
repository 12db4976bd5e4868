//! Transport seam between the request client and the wire.
//!
//! [`Transport`] abstracts the two remote surfaces the core needs: an
//! authenticated request dispatch and the credential-renewal endpoint.
//! Tests substitute a scripted implementation; production uses
//! [`crate::http::HttpTransport`].

use serde::de::DeserializeOwned;
use shopsync_core::session::{AccessToken, RefreshToken, Session};
use shopsync_core::SyncError;
use thiserror::Error;

/// HTTP method of an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl Method {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// An outbound request descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the API base URL.
    pub path: String,
    /// Optional JSON body.
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// A GET request for `path`.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    /// A POST request for `path` with a JSON body.
    #[must_use]
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }
}

/// A successful response from the remote API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body; `Null` when the server sent none.
    pub body: serde_json::Value,
}

impl ApiResponse {
    /// Deserializes the body into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Network`] if the body does not match `T`; a
    /// malformed body from the server is indistinguishable from a mangled
    /// response in transit.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, SyncError> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| SyncError::Network(format!("Malformed response body: {e}")))
    }
}

/// Failures at the transport boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The remote rejected the access credential as expired. The request
    /// client reacts by renewing; this variant never reaches callers.
    #[error("Access credential expired")]
    CredentialExpired,

    /// The remote refused the request for any other reason.
    #[error("Rejected ({status}): {reason}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// The server's stated reason.
        reason: String,
    },

    /// Connect, TLS or decode failure before a verdict was reached.
    #[error("Network error: {0}")]
    Network(String),
}

impl From<TransportError> for SyncError {
    fn from(err: TransportError) -> Self {
        match err {
            // Only reached when expiry survives a fresh renewal.
            TransportError::CredentialExpired => Self::SessionExpired,
            TransportError::Rejected { reason, .. } => Self::RemoteRejected { reason },
            TransportError::Network(reason) => Self::Network(reason),
        }
    }
}

/// The two remote surfaces the client core depends on.
pub trait Transport: Send + Sync {
    /// Dispatches `request` with `token` attached.
    ///
    /// # Errors
    ///
    /// - [`TransportError::CredentialExpired`] when the remote signals an
    ///   expired access credential
    /// - [`TransportError::Rejected`] for any other remote refusal
    /// - [`TransportError::Network`] for transport-level failures
    fn execute(
        &self,
        request: &ApiRequest,
        token: &AccessToken,
    ) -> impl Future<Output = Result<ApiResponse, TransportError>> + Send;

    /// Exchanges `refresh` for a fresh credential pair.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Rejected`] when the renewal credential itself is
    ///   refused (terminal for the session)
    /// - [`TransportError::Network`] for transport-level failures
    fn renew(
        &self,
        refresh: &RefreshToken,
    ) -> impl Future<Output = Result<Session, TransportError>> + Send;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn request_constructors() {
        let get = ApiRequest::get("/orders");
        assert_eq!(get.method, Method::Get);
        assert!(get.body.is_none());

        let post = ApiRequest::post("/orders/1/transition", serde_json::json!({"to": "SHIPPED"}));
        assert_eq!(post.method, Method::Post);
        assert_eq!(post.body.unwrap()["to"], "SHIPPED");
    }

    #[test]
    fn response_json_decodes() {
        let response = ApiResponse {
            status: 200,
            body: serde_json::json!({"id": "o-1", "status": "PENDING"}),
        };
        let record: shopsync_core::OrderRecord = response.json().unwrap();
        assert_eq!(record.id.as_str(), "o-1");
    }

    #[test]
    fn rejection_maps_to_remote_rejected() {
        let err: SyncError = TransportError::Rejected {
            status: 409,
            reason: "already cancelled".to_string(),
        }
        .into();
        assert_eq!(
            err,
            SyncError::RemoteRejected {
                reason: "already cancelled".to_string()
            }
        );
    }
}
