//! Trade submission
//!
//! A trade posts the intent, reads the rule verdict embedded in the response,
//! and then re-fetches the challenge so balances reflect the backend's view.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

use crate::error::ApiError;
use crate::gateway::models::{Challenge, RuleCheck};
use crate::gateway::Gateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Body of `POST /trades/execute`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeIntent {
    pub symbol: String,
    pub action: TradeAction,
    pub quantity: u32,
    /// Last observed price, not re-fetched
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictStatus {
    Passed,
    Failed,
}

/// Terminal rule outcome worth interrupting the user for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeVerdict {
    pub status: VerdictStatus,
    pub reason: Option<String>,
}

/// Map the backend's `rule_check` onto a verdict.
///
/// Only `passed` and `failed` count; `active`, anything unknown, or no
/// `rule_check` at all yield `None`.
pub fn verdict_from(rule_check: Option<&RuleCheck>) -> Option<TradeVerdict> {
    let check = rule_check?;
    let status = match check.status.as_str() {
        "passed" => VerdictStatus::Passed,
        "failed" => VerdictStatus::Failed,
        _ => return None,
    };
    Some(TradeVerdict {
        status,
        reason: check.reason.clone(),
    })
}

/// What a successful submission produced
#[derive(Debug)]
pub struct TradeReport {
    pub verdict: Option<TradeVerdict>,
    /// Post-trade challenge state; the refresh can fail independently
    pub challenge: Result<Challenge, ApiError>,
}

pub async fn submit(gateway: &Gateway, intent: &TradeIntent) -> Result<TradeReport, ApiError> {
    info!(
        "Submitting {} {} x{} @ {:.2}",
        intent.action, intent.symbol, intent.quantity, intent.price
    );

    let response = gateway.execute_trade(intent).await?;
    let verdict = verdict_from(response.rule_check.as_ref());
    if let Some(verdict) = &verdict {
        info!(
            "Challenge {:?}: {}",
            verdict.status,
            verdict.reason.as_deref().unwrap_or("-")
        );
    }

    let challenge = gateway.active_challenge().await;
    Ok(TradeReport { verdict, challenge })
}

/// Result of asking for a trade
#[derive(Debug, Clone, PartialEq)]
pub enum TradeOutcome {
    /// Preconditions not met (no price, no challenge, already submitting); nothing sent
    Skipped,
    Completed { verdict: Option<TradeVerdict> },
    Failed { message: String },
    /// The submitting task ended without reporting
    Aborted,
}

/// Guarantees a completion message for a busy flag
///
/// If the guard is dropped before [`SubmitGuard::finish`] (error, panic,
/// cancellation), it sends the abort message instead.
pub struct SubmitGuard<T> {
    tx: mpsc::UnboundedSender<T>,
    abort: Option<T>,
}

impl<T> SubmitGuard<T> {
    pub fn new(tx: mpsc::UnboundedSender<T>, abort: T) -> Self {
        Self {
            tx,
            abort: Some(abort),
        }
    }

    pub fn finish(mut self, message: T) {
        self.abort = None;
        let _ = self.tx.send(message);
    }
}

impl<T> Drop for SubmitGuard<T> {
    fn drop(&mut self) {
        if let Some(message) = self.abort.take() {
            let _ = self.tx.send(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DurableStore;
    use crate::test_support::{challenge_json, MockTransport};
    use std::sync::Arc;

    fn intent() -> TradeIntent {
        TradeIntent {
            symbol: "AAPL".to_string(),
            action: TradeAction::Buy,
            quantity: 3,
            price: 190.25,
        }
    }

    #[test]
    fn test_verdict_mapping() {
        let failed = RuleCheck {
            status: "failed".to_string(),
            reason: Some("Max daily loss exceeded".to_string()),
        };
        assert_eq!(
            verdict_from(Some(&failed)),
            Some(TradeVerdict {
                status: VerdictStatus::Failed,
                reason: Some("Max daily loss exceeded".to_string())
            })
        );

        let active = RuleCheck {
            status: "active".to_string(),
            reason: None,
        };
        assert_eq!(verdict_from(Some(&active)), None);
        assert_eq!(verdict_from(None), None);
    }

    #[test]
    fn test_intent_wire_format() {
        let json = serde_json::to_value(intent()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"symbol": "AAPL", "action": "buy", "quantity": 3, "price": 190.25})
        );
    }

    #[tokio::test]
    async fn test_submit_reads_verdict_and_refreshes_challenge() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(
            "/trades/execute",
            200,
            serde_json::json!({"trade": null, "rule_check": {"status": "passed", "reason": "Profit target reached!"}}),
        );
        mock.respond("/challenges/active", 200, serde_json::json!({"challenge": challenge_json(5600.0)}));
        let gateway = Gateway::new(mock.clone(), Arc::new(DurableStore::in_memory()));

        let report = submit(&gateway, &intent()).await.unwrap();
        assert_eq!(report.verdict.unwrap().status, VerdictStatus::Passed);
        assert_eq!(report.challenge.unwrap().current_balance, 5600.0);
        assert_eq!(mock.count("/challenges/active"), 1);
    }

    #[tokio::test]
    async fn test_submit_ignores_shape_of_trade_payload() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(
            "/trades/execute",
            200,
            serde_json::json!({
                "trade": {"id": 1, "symbol": "AAPL"},
                "rule_check": {"status": "failed", "reason": "Max daily loss exceeded"}
            }),
        );
        mock.respond("/challenges/active", 200, serde_json::json!({"challenge": challenge_json(4700.0)}));
        let gateway = Gateway::new(mock.clone(), Arc::new(DurableStore::in_memory()));

        let report = submit(&gateway, &intent()).await.unwrap();
        assert_eq!(
            report.verdict,
            Some(TradeVerdict {
                status: VerdictStatus::Failed,
                reason: Some("Max daily loss exceeded".to_string())
            })
        );
        assert_eq!(report.challenge.unwrap().current_balance, 4700.0);
        assert_eq!(mock.count("/challenges/active"), 1);
    }

    #[tokio::test]
    async fn test_submit_failure_skips_refresh() {
        let mock = Arc::new(MockTransport::new());
        mock.respond("/trades/execute", 400, serde_json::json!({"error": "Solde insuffisant"}));
        let gateway = Gateway::new(mock.clone(), Arc::new(DurableStore::in_memory()));

        let err = submit(&gateway, &intent()).await.unwrap_err();
        assert_eq!(err.user_message("Failed to execute trade"), "Solde insuffisant");
        assert_eq!(mock.count("/challenges/active"), 0);
    }

    #[tokio::test]
    async fn test_submit_guard_reports_on_every_path() {
        let (tx, mut rx) = mpsc::unbounded_channel::<&'static str>();

        SubmitGuard::new(tx.clone(), "aborted").finish("done");
        assert_eq!(rx.recv().await, Some("done"));

        drop(SubmitGuard::new(tx.clone(), "aborted"));
        assert_eq!(rx.recv().await, Some("aborted"));

        let guard = SubmitGuard::new(tx.clone(), "aborted");
        let handle = tokio::spawn(async move {
            let _guard = guard;
            panic!("boom");
        });
        assert!(handle.await.is_err());
        assert_eq!(rx.recv().await, Some("aborted"));
        assert!(rx.try_recv().is_err());
    }
}
