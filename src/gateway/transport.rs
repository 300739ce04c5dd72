//! Transport layer
//!
//! The gateway never talks to `reqwest` directly. It builds an [`ApiRequest`],
//! passes it through [`attach_auth`], hands it to a [`Transport`] and runs the
//! result through [`classify`]. Both helpers are pure.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ClientConfig;

/// Outgoing request, relative to the configured base address
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Some(body),
        }
    }

    /// Bearer token carried by this request, if any
    pub fn bearer(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}

/// Raw response: status plus the undecoded body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// The request never produced an HTTP response
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Something that can carry an [`ApiRequest`] to the backend
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Return a copy of `request` carrying `credential` as a bearer token.
///
/// The input is left untouched; without a credential the copy is identical.
pub fn attach_auth(request: &ApiRequest, credential: Option<&str>) -> ApiRequest {
    let mut out = request.clone();
    if let Some(token) = credential {
        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(value) => {
                out.headers.insert(AUTHORIZATION, value);
            }
            Err(_) => warn!("Stored credential is not a valid header value; sending request without it"),
        }
    }
    out
}

/// How the gateway should treat a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub ok: bool,
    pub invalidates_credential: bool,
}

pub fn classify(response: &ApiResponse) -> Classification {
    Classification {
        ok: (200..300).contains(&response.status),
        invalidates_credential: response.status == 401,
    }
}

/// `reqwest`-backed transport
pub struct HttpTransport {
    client: Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .default_headers(headers)
            .build()
            .map_err(|e| TransportError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone().normalized(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.config.endpoint_url(&request.path);
        debug!("{} {}", request.method, url);

        let mut builder = self
            .client
            .request(request.method, &url)
            .headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError(format!("Failed to read response from {}: {}", url, e)))?;

        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{HeaderMap as AxumHeaders, StatusCode},
        routing::{get, post},
        Json, Router,
    };

    #[test]
    fn test_attach_auth_leaves_original_untouched() {
        let request = ApiRequest::get("/auth/me");
        let authed = attach_auth(&request, Some("jwt-1"));

        assert_eq!(authed.bearer(), Some("jwt-1"));
        assert_eq!(request.bearer(), None);
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_attach_auth_without_credential() {
        let request = ApiRequest::post("/auth/login", serde_json::json!({"email": "a@b.c"}));
        let out = attach_auth(&request, None);
        assert!(out.headers.get(AUTHORIZATION).is_none());
        assert_eq!(out.body, request.body);
    }

    #[test]
    fn test_classify() {
        let ok = classify(&ApiResponse::new(201, "{}"));
        assert!(ok.ok && !ok.invalidates_credential);

        let unauthorized = classify(&ApiResponse::new(401, ""));
        assert!(!unauthorized.ok && unauthorized.invalidates_credential);

        let forbidden = classify(&ApiResponse::new(403, ""));
        assert!(!forbidden.ok && !forbidden.invalidates_credential);
    }

    async fn spawn_backend() -> String {
        async fn me(headers: AxumHeaders) -> (StatusCode, Json<serde_json::Value>) {
            match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                Some("Bearer good") => (
                    StatusCode::OK,
                    Json(serde_json::json!({"content_type": headers
                        .get("content-type")
                        .and_then(|v| v.to_str().ok())})),
                ),
                _ => (
                    StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({"msg": "Missing Authorization Header"})),
                ),
            }
        }

        async fn echo(Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
            Json(body)
        }

        let app = Router::new()
            .route("/api/auth/me", get(me))
            .route("/api/trades/execute", post(echo));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api/", addr)
    }

    #[tokio::test]
    async fn test_http_transport_round_trip() {
        let base = spawn_backend().await;
        let config = ClientConfig {
            api_base_url: base,
            ..Default::default()
        };
        let transport = HttpTransport::new(&config).unwrap();

        let request = attach_auth(&ApiRequest::get("/auth/me"), Some("good"));
        let response = transport.send(request).await.unwrap();
        assert_eq!(response.status, 200);
        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["content_type"], "application/json");

        let response = transport.send(ApiRequest::get("/auth/me")).await.unwrap();
        assert_eq!(response.status, 401);
        assert!(classify(&response).invalidates_credential);

        let payload = serde_json::json!({"symbol": "AAPL", "quantity": 2});
        let response = transport
            .send(ApiRequest::post("/trades/execute", payload.clone()))
            .await
            .unwrap();
        assert_eq!(serde_json::from_str::<serde_json::Value>(&response.body).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_http_transport_unreachable() {
        let config = ClientConfig {
            api_base_url: "http://127.0.0.1:1".to_string(),
            request_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        let result = transport.send(ApiRequest::get("/auth/me")).await;
        assert!(result.is_err());
    }
}
