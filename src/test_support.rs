//! Scripted in-memory backend for unit tests

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::gateway::transport::{ApiRequest, ApiResponse, Transport, TransportError};

#[derive(Debug, Clone)]
enum Reply {
    Respond(ApiResponse),
    Fail(String),
}

/// Transport that answers from per-path scripts
///
/// Replies queued for a path are consumed in order; the last one sticks and
/// answers every further call. Unscripted paths get a 404.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    delays: Mutex<HashMap<String, Duration>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, path: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn respond(&self, path: &str, status: u16, body: serde_json::Value) {
        self.push(path, Reply::Respond(ApiResponse::new(status, body.to_string())));
    }

    pub fn respond_raw(&self, path: &str, status: u16, body: &str) {
        self.push(path, Reply::Respond(ApiResponse::new(status, body)));
    }

    pub fn fail(&self, path: &str, message: &str) {
        self.push(path, Reply::Fail(message.to_string()));
    }

    /// Drop every queued reply for `path`
    pub fn reset(&self, path: &str) {
        self.replies.lock().unwrap().remove(path);
    }

    /// Hold every response for `path` back by `delay`
    pub fn delay(&self, path: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(path.to_string(), delay);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    fn next_reply(&self, path: &str) -> Option<Reply> {
        let mut replies = self.replies.lock().unwrap();
        let queue = replies.get_mut(path)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let path = request.path.clone();
        self.requests.lock().unwrap().push(request);

        let reply = self.next_reply(&path);
        let delay = self.delays.lock().unwrap().get(&path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(message)) => Err(TransportError(message)),
            None => Ok(ApiResponse::new(404, r#"{"error": "not found"}"#)),
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn identity_json(id: i64, username: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "username": username,
        "email": format!("{}@example.com", username),
        "role": "user",
        "created_at": "2026-10-01T08:30:00",
        "is_active": true
    })
}

pub fn challenge_json(current_balance: f64) -> serde_json::Value {
    serde_json::json!({
        "id": 11,
        "status": "active",
        "plan_type": "starter",
        "initial_balance": 5000.0,
        "current_balance": current_balance,
        "daily_start_balance": 5000.0,
        "profit_target": 10.0,
        "max_daily_loss_percent": 5.0,
        "max_total_loss_percent": 10.0
    })
}

pub fn price_json(price: f64, currency: &str) -> serde_json::Value {
    serde_json::json!({
        "symbol": "X",
        "price": price,
        "change_percent": 0.42,
        "timestamp": "2026-10-19T10:00:00",
        "currency": currency
    })
}

pub fn signal_json(kind: &str) -> serde_json::Value {
    serde_json::json!({
        "signal": kind,
        "confidence": 64,
        "risk_level": "medium",
        "reason": "Momentum fading"
    })
}

pub fn chart_json(closes: &[f64]) -> serde_json::Value {
    let data: Vec<_> = closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            serde_json::json!({
                "timestamp": format!("2026-10-{:02}T00:00:00", i + 1),
                "open": close - 1.0,
                "high": close + 1.0,
                "low": close - 2.0,
                "close": close
            })
        })
        .collect();
    serde_json::json!({ "data": data, "count": closes.len() })
}
