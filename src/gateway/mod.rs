//! Challenge Backend Gateway
//!
//! Every component talks to the backend through [`Gateway`]; nothing else
//! sets an authorization header.
//!
//! # Components
//!
//! - [`transport`] - request/response types, the [`Transport`] seam, auth attachment and response classification
//! - [`client`] - the gateway itself with one method per endpoint
//! - [`models`] - request/response data types
//!
//! # Usage
//!
//! ```rust,ignore
//! use challenge_desk::{config::ClientConfig, gateway::Gateway, storage::DurableStore};
//!
//! let config = ClientConfig::from_env()?;
//! let store = Arc::new(DurableStore::open(&config.storage_path)?);
//! let gateway = Gateway::http(&config, store)?;
//!
//! let quote = gateway.live_price("AAPL").await?;
//! println!("{}", quote.display());
//! ```
//!
//! # API Endpoints Used
//!
//! - `POST /auth/register`, `POST /auth/login`, `GET /auth/me`
//! - `POST /payment/checkout`
//! - `GET /challenges/active`, `POST /trades/execute`, `GET /trades/history`
//! - `GET /market/live/{symbol}`, `GET /market/chart/{symbol}`, `GET /market/morocco/{ticker}`
//! - `GET /signals/{symbol}`, `GET /signals/morocco/{ticker}`
//! - `GET /leaderboard/monthly`

pub mod client;
pub mod models;
pub mod transport;

pub use client::Gateway;
pub use models::{Candle, Challenge, Identity, LivePrice, Signal};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport, TransportError};
