//! Symbol catalog and per-cycle market fetch
//!
//! Moroccan tickers are served by their own quote/signal endpoints and have
//! no chart. Everything else gets live price, signal and chart in parallel.

use futures::try_join;
use tracing::debug;

use crate::error::ApiError;
use crate::gateway::models::{Candle, LivePrice, Signal};
use crate::gateway::Gateway;

pub const INTERNATIONAL_SYMBOLS: [&str; 6] = ["AAPL", "TSLA", "BTC-USD", "ETH-USD", "MSFT", "GOOGL"];
pub const MOROCCO_SYMBOLS: [&str; 5] = ["IAM", "ATW", "BCP", "MNG", "SNEP"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Market {
    International,
    Morocco,
}

/// A tradable ticker and the market it is routed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    ticker: String,
    market: Market,
}

impl Symbol {
    pub fn new(ticker: &str) -> Self {
        let ticker = ticker.trim().to_ascii_uppercase();
        let market = if MOROCCO_SYMBOLS.contains(&ticker.as_str()) {
            Market::Morocco
        } else {
            Market::International
        };
        Self { ticker, market }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn market(&self) -> Market {
        self.market
    }

    pub fn has_chart(&self) -> bool {
        self.market == Market::International
    }

    /// All symbols offered in the sidebar, international first
    pub fn catalog() -> Vec<Symbol> {
        INTERNATIONAL_SYMBOLS
            .iter()
            .chain(MOROCCO_SYMBOLS.iter())
            .map(|t| Symbol::new(t))
            .collect()
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ticker)
    }
}

/// Everything one fetch cycle produces
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub price: LivePrice,
    pub signal: Signal,
    /// `None` for markets without chart data
    pub chart: Option<Vec<Candle>>,
}

/// Fetch price, signal and (where available) chart for `symbol`.
///
/// The requests run concurrently; if any of them fails the whole cycle fails
/// and nothing is returned.
pub async fn fetch_snapshot(gateway: &Gateway, symbol: &Symbol) -> Result<MarketSnapshot, ApiError> {
    let ticker = symbol.ticker();
    debug!("Fetching market snapshot for {}", ticker);

    match symbol.market() {
        Market::Morocco => {
            let (price, signal) =
                try_join!(gateway.morocco_quote(ticker), gateway.morocco_signal(ticker))?;
            Ok(MarketSnapshot {
                price,
                signal,
                chart: None,
            })
        }
        Market::International => {
            let (price, signal, chart) = try_join!(
                gateway.live_price(ticker),
                gateway.signal(ticker),
                gateway.chart(ticker)
            )?;
            Ok(MarketSnapshot {
                price,
                signal,
                chart: Some(chart),
            })
        }
    }
}
