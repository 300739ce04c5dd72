//! Challenge plans and checkout

use thiserror::Error;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::gateway::Gateway;

pub const SESSION_EXPIRED: &str = "Session expired. Please log in again.";
pub const PAYMENT_FALLBACK: &str = "Payment failed. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Starter,
    Pro,
    Elite,
}

impl Plan {
    pub const ALL: [Plan; 3] = [Plan::Starter, Plan::Pro, Plan::Elite];

    /// Wire value for `plan_type`
    pub fn plan_type(&self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Elite => "elite",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Starter => "Starter",
            Self::Pro => "Pro",
            Self::Elite => "Elite",
        }
    }

    /// Price in DH
    pub fn price(&self) -> u32 {
        match self {
            Self::Starter => 200,
            Self::Pro => 500,
            Self::Elite => 1000,
        }
    }

    /// Virtual starting balance in DH
    pub fn starting_balance(&self) -> u32 {
        match self {
            Self::Starter => 5_000,
            Self::Pro => 10_000,
            Self::Elite => 25_000,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.plan_type().eq_ignore_ascii_case(s.trim()))
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - {} DH ({} DH balance)",
            self.name(),
            self.price(),
            self.starting_balance()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Cmi,
    Crypto,
    Paypal,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [PaymentMethod::Cmi, PaymentMethod::Crypto, PaymentMethod::Paypal];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Cmi => "cmi",
            Self::Crypto => "crypto",
            Self::Paypal => "paypal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.code().eq_ignore_ascii_case(s.trim()))
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("{}", SESSION_EXPIRED)]
    SessionExpired,
    #[error("{0}")]
    Failed(String),
}

impl From<ApiError> for CheckoutError {
    fn from(err: ApiError) -> Self {
        if err.is_unauthorized() {
            Self::SessionExpired
        } else {
            Self::Failed(err.user_message(PAYMENT_FALLBACK))
        }
    }
}

/// Buy `plan` with `method`. A 401 has already discarded the credential by
/// the time [`CheckoutError::SessionExpired`] is returned.
pub async fn checkout(gateway: &Gateway, plan: Plan, method: PaymentMethod) -> Result<(), CheckoutError> {
    info!("Checking out {} plan via {}", plan.plan_type(), method);
    gateway
        .checkout(plan.plan_type(), method.code())
        .await
        .map_err(|e| {
            warn!("Checkout failed: {}", e);
            CheckoutError::from(e)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DurableStore;
    use crate::test_support::MockTransport;
    use serde_json::json;
    use std::sync::Arc;

    fn gateway(mock: &Arc<MockTransport>) -> Gateway {
        let store = Arc::new(DurableStore::in_memory());
        store.set_credential("jwt").unwrap();
        Gateway::new(mock.clone(), store)
    }

    #[test]
    fn test_plan_catalog() {
        assert_eq!(Plan::parse("PRO"), Some(Plan::Pro));
        assert_eq!(Plan::parse("gold"), None);
        assert_eq!(Plan::Elite.to_string(), "Elite - 1000 DH (25000 DH balance)");
        assert_eq!(PaymentMethod::parse("paypal"), Some(PaymentMethod::Paypal));
    }

    #[tokio::test]
    async fn test_checkout_sends_plan_and_method() {
        let mock = Arc::new(MockTransport::new());
        mock.respond("/payment/checkout", 200, json!({"message": "ok"}));
        let gateway = gateway(&mock);

        checkout(&gateway, Plan::Starter, PaymentMethod::Crypto).await.unwrap();
        assert_eq!(
            mock.requests()[0].body,
            Some(json!({"plan_type": "starter", "payment_method": "crypto"}))
        );
    }

    #[tokio::test]
    async fn test_checkout_401_is_session_expired() {
        let mock = Arc::new(MockTransport::new());
        mock.respond("/payment/checkout", 401, json!({"msg": "Token has expired"}));
        let gateway = gateway(&mock);

        let err = checkout(&gateway, Plan::Pro, PaymentMethod::Cmi).await.unwrap_err();
        assert_eq!(err, CheckoutError::SessionExpired);
        assert_eq!(err.to_string(), SESSION_EXPIRED);
        assert_eq!(gateway.store().credential(), None);
    }

    #[tokio::test]
    async fn test_checkout_failure_messages() {
        let mock = Arc::new(MockTransport::new());
        mock.respond("/payment/checkout", 400, json!({"message": "Challenge déjà actif"}));
        let gateway = gateway(&mock);
        let err = checkout(&gateway, Plan::Pro, PaymentMethod::Cmi).await.unwrap_err();
        assert_eq!(err, CheckoutError::Failed("Challenge déjà actif".to_string()));

        mock.reset("/payment/checkout");
        mock.fail("/payment/checkout", "connection reset");
        let err = checkout(&gateway, Plan::Pro, PaymentMethod::Cmi).await.unwrap_err();
        assert_eq!(err.to_string(), PAYMENT_FALLBACK);
    }
}
