//! Challenge Backend Gateway
//!
//! The single HTTP entry point. Every request picks up the current credential
//! from durable storage, and every 401 discards it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use urlencoding::encode;

use super::models::*;
use super::transport::{
    attach_auth, classify, ApiRequest, ApiResponse, HttpTransport, Transport,
};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::storage::DurableStore;

/// Shared client for all backend endpoints
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
    store: Arc<DurableStore>,
}

impl Gateway {
    pub fn new(transport: Arc<dyn Transport>, store: Arc<DurableStore>) -> Self {
        Self { transport, store }
    }

    /// Gateway over real HTTP using `config`
    pub fn http(config: &ClientConfig, store: Arc<DurableStore>) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(config).map_err(|e| ApiError::Transport(e.0))?;
        Ok(Self::new(Arc::new(transport), store))
    }

    pub fn store(&self) -> &Arc<DurableStore> {
        &self.store
    }

    /// Send `request` with the stored credential attached
    ///
    /// The credential is read fresh for each call. A 401 clears it from
    /// storage before the error is handed back.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let credential = self.store.credential();
        let request = attach_auth(&request, credential.as_deref());
        let path = request.path.clone();

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| ApiError::Transport(e.0))?;

        let verdict = classify(&response);
        if verdict.invalidates_credential {
            warn!("{} returned 401; discarding stored credential", path);
            if let Err(e) = self.store.clear_credential() {
                warn!("Failed to discard credential: {}", e);
            }
        }

        if !verdict.ok {
            debug!("{} failed with status {}", path, response.status);
            return Err(ApiError::from_status(response.status, &response.body));
        }

        Ok(response)
    }

    async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        let response = self.execute(ApiRequest::get(path)).await?;
        decode(path, &response)
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        let response = self.execute(post_request(path, body)?).await?;
        decode(path, &response)
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError> {
        let request = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        self.post("/auth/register", &request).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.post("/auth/login", &request).await
    }

    pub async fn current_user(&self) -> Result<Identity, ApiError> {
        let response: CurrentUserResponse = self.get("/auth/me").await?;
        Ok(response.user)
    }

    // ========================================================================
    // Payment
    // ========================================================================

    /// Purchase a challenge tier. The response body is not interpreted.
    pub async fn checkout(&self, plan_type: &str, payment_method: &str) -> Result<(), ApiError> {
        let request = CheckoutRequest {
            plan_type: plan_type.to_string(),
            payment_method: payment_method.to_string(),
        };
        self.execute(post_request("/payment/checkout", &request)?).await?;
        info!("Checkout accepted for plan '{}' via {}", plan_type, payment_method);
        Ok(())
    }

    // ========================================================================
    // Challenges & trades
    // ========================================================================

    pub async fn active_challenge(&self) -> Result<Challenge, ApiError> {
        let response: ActiveChallengeResponse = self.get("/challenges/active").await?;
        Ok(response.challenge)
    }

    pub async fn execute_trade<B: Serialize>(
        &self,
        intent: &B,
    ) -> Result<ExecuteTradeResponse, ApiError> {
        self.post("/trades/execute", intent).await
    }

    pub async fn trade_history(&self) -> Result<Vec<TradeRecord>, ApiError> {
        let response: TradeHistoryResponse = self.get("/trades/history").await?;
        Ok(response.trades)
    }

    // ========================================================================
    // Market data & signals
    // ========================================================================
    // Tickers come from user input and are percent-encoded as path segments.

    pub async fn live_price(&self, symbol: &str) -> Result<LivePrice, ApiError> {
        self.get(&format!("/market/live/{}", encode(symbol))).await
    }

    pub async fn chart(&self, symbol: &str) -> Result<Vec<Candle>, ApiError> {
        let response: ChartResponse = self.get(&format!("/market/chart/{}", encode(symbol))).await?;
        Ok(response.data.into_iter().map(Candle::from).collect())
    }

    pub async fn morocco_quote(&self, ticker: &str) -> Result<LivePrice, ApiError> {
        self.get(&format!("/market/morocco/{}", encode(ticker))).await
    }

    pub async fn signal(&self, symbol: &str) -> Result<Signal, ApiError> {
        self.get(&format!("/signals/{}", encode(symbol))).await
    }

    pub async fn morocco_signal(&self, ticker: &str) -> Result<Signal, ApiError> {
        self.get(&format!("/signals/morocco/{}", encode(ticker))).await
    }

    // ========================================================================
    // Leaderboard
    // ========================================================================

    /// Raw monthly ranking; see [`crate::leaderboard::normalize`]
    pub async fn monthly_leaderboard(&self) -> Result<serde_json::Value, ApiError> {
        self.get("/leaderboard/monthly").await
    }
}

fn post_request<B: Serialize>(path: &str, body: &B) -> Result<ApiRequest, ApiError> {
    let body = serde_json::to_value(body).map_err(|source| ApiError::Decode {
        path: path.to_string(),
        source,
    })?;
    Ok(ApiRequest::post(path, body))
}

fn decode<R: DeserializeOwned>(path: &str, response: &ApiResponse) -> Result<R, ApiError> {
    serde_json::from_str(&response.body).map_err(|source| ApiError::Decode {
        path: path.to_string(),
        source,
    })
}
