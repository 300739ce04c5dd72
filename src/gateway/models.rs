//! Challenge Backend Data Models
//!
//! Request and response types for the challenge platform API.

use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Authentication
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Superadmin,
}

/// Authenticated user as returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: String,
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response from login and register
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: Identity,
}

/// Response from `/auth/me`
#[derive(Debug, Deserialize)]
pub struct CurrentUserResponse {
    pub user: Identity,
}

// ============================================================================
// Payment
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CheckoutRequest {
    pub plan_type: String,
    pub payment_method: String,
}

// ============================================================================
// Challenges
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Active,
    Passed,
    Failed,
}

/// A virtual-balance challenge instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: i64,
    pub status: ChallengeStatus,
    pub initial_balance: f64,
    pub current_balance: f64,
    #[serde(rename = "profit_target", alias = "profit_target_percent")]
    pub profit_target_percent: f64,
    pub max_daily_loss_percent: f64,
    pub max_total_loss_percent: f64,
}

/// Coarse standing of a challenge, used for the status banner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeHealth {
    OnTrack,
    /// Drawdown beyond 7%
    Warning,
    /// Up 10% or more
    TargetReached,
}

impl Challenge {
    /// Profit relative to the starting balance, in percent
    pub fn profit_percent(&self) -> f64 {
        if self.initial_balance == 0.0 {
            return 0.0;
        }
        (self.current_balance - self.initial_balance) / self.initial_balance * 100.0
    }

    pub fn health(&self) -> ChallengeHealth {
        let profit = self.profit_percent();
        if profit >= 10.0 {
            ChallengeHealth::TargetReached
        } else if profit < -7.0 {
            ChallengeHealth::Warning
        } else {
            ChallengeHealth::OnTrack
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ActiveChallengeResponse {
    pub challenge: Challenge,
}

// ============================================================================
// Trades
// ============================================================================

/// Outcome of the server-side rule evaluation after a trade
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuleCheck {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Executed trade as recorded by the backend
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TradeRecord {
    pub id: i64,
    pub symbol: String,
    pub action: String,
    pub quantity: f64,
    pub price: f64,
    #[serde(default)]
    pub profit_loss: f64,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteTradeResponse {
    #[serde(default)]
    pub rule_check: Option<RuleCheck>,
}

#[derive(Debug, Deserialize)]
pub struct TradeHistoryResponse {
    #[serde(default)]
    pub trades: Vec<TradeRecord>,
}

// ============================================================================
// Market data
// ============================================================================

/// Latest quote for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivePrice {
    pub price: f64,
    pub change_percent: f64,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub currency: Option<String>,
}

impl LivePrice {
    /// Price formatted for display: `MAD 123.45` for Moroccan quotes, `$123.45` otherwise
    pub fn display(&self) -> String {
        match self.currency.as_deref() {
            Some("MAD") => format!("MAD {:.2}", self.price),
            _ => format!("${:.2}", self.price),
        }
    }

    pub fn display_change(&self) -> String {
        let sign = if self.change_percent >= 0.0 { "+" } else { "" };
        format!("{}{:.2}%", sign, self.change_percent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalKind {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        match raw.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(serde::de::Error::unknown_variant(other, &["low", "medium", "high"])),
        }
    }
}

/// AI trading signal for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub signal: SignalKind,
    /// 0-100
    pub confidence: f64,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub reason: String,
}

/// Chart row as sent by the backend
#[derive(Debug, Clone, Deserialize)]
pub struct ChartRow {
    pub timestamp: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    #[serde(default)]
    pub data: Vec<ChartRow>,
}

/// One bar of the chart series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    pub time: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl From<ChartRow> for Candle {
    fn from(row: ChartRow) -> Self {
        Self {
            time: row.timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
        }
    }
}
