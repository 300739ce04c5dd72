// Library crate - challenge client SDK used by the terminal front-end

pub mod config;
pub mod error;
pub mod storage;
pub mod gateway;
pub mod session;
pub mod routes;
pub mod market;
pub mod poll;
pub mod trade;
pub mod dashboard;
pub mod leaderboard;
pub mod payment;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::ClientConfig;
pub use dashboard::{Dashboard, DashboardHandle, DashboardState};
pub use error::ApiError;
pub use gateway::Gateway;
pub use leaderboard::{Leaderboard, LeaderboardEntry, LeaderboardHandle, LeaderboardState};
pub use routes::{Navigator, Route, Screen};
pub use session::{Session, SessionStore};
pub use storage::{DurableStore, Preferences};
