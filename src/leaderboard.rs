//! Monthly leaderboard
//!
//! The backend's rows are loosely shaped, so every payload goes through
//! [`normalize`] before it is shown. A mounted [`Leaderboard`] refetches on a
//! fixed interval until unmounted.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::gateway::Gateway;
use crate::poll::{CycleClock, Ticker, Ticket};

pub const LEADERBOARD_FALLBACK: &str = "Failed to fetch leaderboard data.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub username: String,
    pub profit_percent: f64,
    pub total_trades: u64,
}

/// Normalize a raw leaderboard payload.
///
/// Each field is read on its own, so a missing or oddly typed field falls
/// back to its default instead of losing the row. Missing ranks become the
/// 1-based array position, `profit_percent` falls back to
/// `avg_profit_percent` and then to zero, and `total_trades` defaults to
/// zero. Anything that is not an array yields no rows; array elements that
/// are not objects are skipped.
pub fn normalize(raw: &Value) -> Vec<LeaderboardEntry> {
    let Some(rows) = raw.as_array() else {
        return Vec::new();
    };

    rows.iter()
        .enumerate()
        .filter_map(|(idx, value)| {
            let Some(row) = value.as_object() else {
                debug!("Skipping leaderboard row {}: not an object", idx);
                return None;
            };
            let number = |key: &str| row.get(key).and_then(Value::as_f64);
            let position = u32::try_from(idx + 1).unwrap_or(u32::MAX);

            Some(LeaderboardEntry {
                rank: row
                    .get("rank")
                    .and_then(Value::as_u64)
                    .and_then(|r| u32::try_from(r).ok())
                    .unwrap_or(position),
                username: row
                    .get("username")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                profit_percent: number("profit_percent")
                    .or_else(|| number("avg_profit_percent"))
                    .unwrap_or(0.0),
                total_trades: number("total_trades")
                    .filter(|n| *n >= 0.0)
                    .map(|n| n as u64)
                    .unwrap_or(0),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardState {
    /// True until the first fetch settles
    pub loading: bool,
    pub error: Option<String>,
    /// Last successfully loaded rows; kept across failures
    pub rows: Vec<LeaderboardEntry>,
}

impl Default for LeaderboardState {
    fn default() -> Self {
        Self {
            loading: true,
            error: None,
            rows: Vec::new(),
        }
    }
}

/// What to render; the three cases are mutually exclusive
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LeaderboardView<'a> {
    Loading,
    Error(&'a str),
    Rows(&'a [LeaderboardEntry]),
}

impl LeaderboardState {
    pub fn view(&self) -> LeaderboardView<'_> {
        if self.loading {
            LeaderboardView::Loading
        } else if let Some(error) = &self.error {
            LeaderboardView::Error(error)
        } else {
            LeaderboardView::Rows(&self.rows)
        }
    }
}

enum Command {
    Refresh,
}

pub struct Leaderboard;

impl Leaderboard {
    /// Fetch now and then on every `leaderboard_poll_interval`
    pub fn mount(gateway: Gateway, config: &ClientConfig) -> LeaderboardHandle {
        let (publish, state_rx) = watch::channel(LeaderboardState::default());
        let (command_tx, command_rx) = mpsc::channel(8);

        let poller = Poller {
            gateway,
            state: LeaderboardState::default(),
            clock: CycleClock::new(),
            ticker: Ticker::new(config.leaderboard_poll_interval),
            publish,
        };
        let task = tokio::spawn(poller.run(command_rx));

        LeaderboardHandle {
            commands: command_tx,
            state: state_rx,
            task,
        }
    }
}

pub struct LeaderboardHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<LeaderboardState>,
    task: JoinHandle<()>,
}

impl LeaderboardHandle {
    /// Fetch immediately, outside the regular schedule
    pub async fn refresh(&self) {
        if self.commands.send(Command::Refresh).await.is_err() {
            debug!("Leaderboard task has stopped; refresh ignored");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LeaderboardState> {
        self.state.clone()
    }

    pub fn snapshot(&self) -> LeaderboardState {
        self.state.borrow().clone()
    }

    pub async fn unmount(self) {
        let Self { commands, task, .. } = self;
        drop(commands);
        if let Err(e) = task.await {
            warn!("Leaderboard task ended abnormally: {}", e);
        }
    }
}

struct Poller {
    gateway: Gateway,
    state: LeaderboardState,
    clock: CycleClock,
    ticker: Ticker,
    publish: watch::Sender<LeaderboardState>,
}

impl Poller {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let (results_tx, mut results) = mpsc::unbounded_channel();
        info!("Leaderboard mounted");

        self.spawn_fetch(&results_tx);
        self.ticker.restart();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Refresh) => self.spawn_fetch(&results_tx),
                    None => break,
                },
                Some((ticket, result)) = results.recv() => self.apply(ticket, result),
                _ = self.ticker.tick() => self.spawn_fetch(&results_tx),
            }
        }

        info!("Leaderboard unmounted");
    }

    fn spawn_fetch(
        &mut self,
        results: &mpsc::UnboundedSender<(Ticket, Result<Value, ApiError>)>,
    ) {
        let ticket = self.clock.issue();
        let gateway = self.gateway.clone();
        let results = results.clone();
        tokio::spawn(async move {
            let result = gateway.monthly_leaderboard().await;
            let _ = results.send((ticket, result));
        });
    }

    fn apply(&mut self, ticket: Ticket, result: Result<Value, ApiError>) {
        if !self.clock.accept(ticket) {
            debug!("Dropping stale leaderboard cycle {}", ticket.seq);
            return;
        }

        self.state.loading = false;
        match result {
            Ok(raw) => {
                self.state.rows = normalize(&raw);
                self.state.error = None;
                debug!("Leaderboard loaded with {} rows", self.state.rows.len());
            }
            Err(e) => {
                warn!("Failed to fetch leaderboard: {}", e);
                self.state.error = Some(LEADERBOARD_FALLBACK.to_string());
            }
        }
        self.publish.send_replace(self.state.clone());
    }
}
