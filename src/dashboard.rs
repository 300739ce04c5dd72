//! Live trading dashboard
//!
//! A mounted dashboard is a task that owns all view state. It fetches market
//! data for the selected symbol on mount, on every symbol switch or polling
//! toggle, and on each tick of a single repeating timer while polling is on.
//! Fetches and trades run as their own tasks and report back as events, so a
//! slow response never holds up the timer.

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::gateway::models::{Candle, Challenge, LivePrice, Signal};
use crate::gateway::Gateway;
use crate::market::{fetch_snapshot, MarketSnapshot, Symbol};
use crate::poll::{CycleClock, Ticker, Ticket};
use crate::trade::{self, SubmitGuard, TradeAction, TradeIntent, TradeOutcome, TradeReport, TradeVerdict};

pub const FETCH_FALLBACK: &str = "Failed to fetch data";
pub const CHALLENGE_FALLBACK: &str = "Failed to fetch challenge";
pub const TRADE_FALLBACK: &str = "Failed to execute trade";

/// Everything the dashboard shows
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    pub symbol: Symbol,
    pub polling: bool,
    pub live_price: Option<LivePrice>,
    pub signal: Option<Signal>,
    /// `None` while loading and for markets without charts
    pub chart: Option<Vec<Candle>>,
    pub challenge: Option<Challenge>,
    pub submitting: bool,
    pub error: Option<String>,
    /// Pending rule verdict; stays until dismissed
    pub verdict: Option<TradeVerdict>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DashboardState {
    fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            polling: true,
            live_price: None,
            signal: None,
            chart: None,
            challenge: None,
            submitting: false,
            error: None,
            verdict: None,
            updated_at: None,
        }
    }

    /// Whether the buy/sell controls are enabled
    pub fn can_trade(&self) -> bool {
        self.live_price.is_some() && self.challenge.is_some() && !self.submitting
    }
}

enum Command {
    SelectSymbol(Symbol),
    SetPolling(bool),
    TogglePolling,
    Trade {
        action: TradeAction,
        quantity: u32,
        reply: oneshot::Sender<TradeOutcome>,
    },
    DismissVerdict,
}

enum Event {
    Market {
        ticket: Ticket,
        result: Result<MarketSnapshot, ApiError>,
    },
    Challenge(Result<Challenge, ApiError>),
    /// `None` when the trade task ended without reporting
    TradeSettled(Option<Result<TradeReport, ApiError>>),
}

/// Entry point for mounting a dashboard
pub struct Dashboard;

impl Dashboard {
    /// Spawn the dashboard task on the current runtime
    pub fn mount(gateway: Gateway, config: &ClientConfig) -> DashboardHandle {
        let symbol = Symbol::new(&config.default_symbol);
        let state = DashboardState::new(symbol);
        let (publish, state_rx) = watch::channel(state.clone());
        let (command_tx, command_rx) = mpsc::channel(32);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let task = DashboardTask {
            gateway,
            state,
            clock: CycleClock::new(),
            ticker: Ticker::new(config.market_poll_interval),
            events_tx,
            pending_reply: None,
            publish,
        };
        let task = tokio::spawn(task.run(command_rx, events_rx));

        DashboardHandle {
            commands: command_tx,
            state: state_rx,
            task,
        }
    }
}

/// Control surface of a mounted dashboard
///
/// Dropping the handle unmounts the dashboard as well; [`DashboardHandle::unmount`]
/// additionally waits for the task to finish.
pub struct DashboardHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<DashboardState>,
    task: JoinHandle<()>,
}

impl DashboardHandle {
    async fn send(&self, command: Command) {
        if self.commands.send(command).await.is_err() {
            debug!("Dashboard task has stopped; command ignored");
        }
    }

    pub async fn select_symbol(&self, ticker: &str) {
        self.send(Command::SelectSymbol(Symbol::new(ticker))).await;
    }

    pub async fn set_polling(&self, enabled: bool) {
        self.send(Command::SetPolling(enabled)).await;
    }

    pub async fn toggle_polling(&self) {
        self.send(Command::TogglePolling).await;
    }

    /// Submit a trade at the last observed price and wait for it to settle
    pub async fn trade(&self, action: TradeAction, quantity: u32) -> TradeOutcome {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Trade {
            action,
            quantity,
            reply,
        })
        .await;
        rx.await.unwrap_or(TradeOutcome::Aborted)
    }

    pub async fn dismiss_verdict(&self) {
        self.send(Command::DismissVerdict).await;
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.clone()
    }

    pub fn snapshot(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    /// Stop the timer and the task. In-flight responses are discarded.
    pub async fn unmount(self) {
        let Self { commands, task, .. } = self;
        drop(commands);
        if let Err(e) = task.await {
            warn!("Dashboard task ended abnormally: {}", e);
        }
    }
}

struct DashboardTask {
    gateway: Gateway,
    state: DashboardState,
    clock: CycleClock,
    ticker: Ticker,
    events_tx: mpsc::UnboundedSender<Event>,
    pending_reply: Option<oneshot::Sender<TradeOutcome>>,
    publish: watch::Sender<DashboardState>,
}

impl DashboardTask {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        info!("Dashboard mounted on {}", self.state.symbol);
        self.spawn_challenge_fetch();
        self.restart_cycle();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event),
                _ = self.ticker.tick() => self.spawn_market_fetch(),
            }
            self.publish();
        }

        info!("Dashboard unmounted");
    }

    fn publish(&self) {
        let current = &self.state;
        self.publish.send_if_modified(|shown| {
            if shown != current {
                *shown = current.clone();
                true
            } else {
                false
            }
        });
    }

    /// Fetch now, then (re)arm the timer if polling is enabled
    fn restart_cycle(&mut self) {
        self.spawn_market_fetch();
        if self.state.polling {
            self.ticker.restart();
        } else {
            self.ticker.stop();
        }
    }

    fn spawn_market_fetch(&mut self) {
        let ticket = self.clock.issue();
        let gateway = self.gateway.clone();
        let symbol = self.state.symbol.clone();
        let events = self.events_tx.clone();

        debug!("Market cycle {} for {}", ticket.seq, symbol);
        tokio::spawn(async move {
            let result = fetch_snapshot(&gateway, &symbol).await;
            let _ = events.send(Event::Market { ticket, result });
        });
    }

    fn spawn_challenge_fetch(&self) {
        let gateway = self.gateway.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = gateway.active_challenge().await;
            let _ = events.send(Event::Challenge(result));
        });
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SelectSymbol(symbol) => {
                if symbol == self.state.symbol {
                    return;
                }
                info!("Switching dashboard to {}", symbol);
                self.clock.advance_epoch();
                self.state.symbol = symbol;
                self.state.live_price = None;
                self.state.signal = None;
                self.state.chart = None;
                self.restart_cycle();
            }
            Command::SetPolling(enabled) => self.set_polling(enabled),
            Command::TogglePolling => self.set_polling(!self.state.polling),
            Command::Trade {
                action,
                quantity,
                reply,
            } => self.start_trade(action, quantity, reply),
            Command::DismissVerdict => self.state.verdict = None,
        }
    }

    fn set_polling(&mut self, enabled: bool) {
        if enabled == self.state.polling {
            return;
        }
        info!("Polling {}", if enabled { "resumed" } else { "paused" });
        self.state.polling = enabled;
        self.restart_cycle();
    }

    fn start_trade(
        &mut self,
        action: TradeAction,
        quantity: u32,
        reply: oneshot::Sender<TradeOutcome>,
    ) {
        let price = match (&self.state.live_price, &self.state.challenge) {
            (Some(price), Some(_)) if !self.state.submitting && quantity >= 1 => price.price,
            _ => {
                debug!("Trade ignored: preconditions not met");
                let _ = reply.send(TradeOutcome::Skipped);
                return;
            }
        };

        let intent = TradeIntent {
            symbol: self.state.symbol.ticker().to_string(),
            action,
            quantity,
            price,
        };

        self.state.submitting = true;
        self.pending_reply = Some(reply);

        let guard = SubmitGuard::new(self.events_tx.clone(), Event::TradeSettled(None));
        let gateway = self.gateway.clone();
        tokio::spawn(async move {
            let result = trade::submit(&gateway, &intent).await;
            guard.finish(Event::TradeSettled(Some(result)));
        });
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Market { ticket, result } => {
                if !self.clock.accept(ticket) {
                    debug!("Dropping stale market cycle {}", ticket.seq);
                    return;
                }
                match result {
                    Ok(snapshot) => {
                        self.state.live_price = Some(snapshot.price);
                        self.state.signal = Some(snapshot.signal);
                        self.state.chart = snapshot.chart;
                        self.state.error = None;
                        self.state.updated_at = Some(Utc::now());
                    }
                    Err(e) => {
                        warn!("Market cycle for {} failed: {}", self.state.symbol, e);
                        self.state.error = Some(e.user_message(FETCH_FALLBACK));
                    }
                }
            }
            Event::Challenge(Ok(challenge)) => self.state.challenge = Some(challenge),
            Event::Challenge(Err(e)) => {
                warn!("Failed to load active challenge: {}", e);
                self.state.error = Some(e.user_message(CHALLENGE_FALLBACK));
            }
            Event::TradeSettled(settled) => {
                self.state.submitting = false;
                let outcome = self.apply_trade(settled);
                if let Some(reply) = self.pending_reply.take() {
                    let _ = reply.send(outcome);
                }
            }
        }
    }

    fn apply_trade(&mut self, settled: Option<Result<TradeReport, ApiError>>) -> TradeOutcome {
        match settled {
            None => {
                self.state.error = Some(TRADE_FALLBACK.to_string());
                TradeOutcome::Aborted
            }
            Some(Err(e)) => {
                warn!("Trade failed: {}", e);
                let message = e.user_message(TRADE_FALLBACK);
                self.state.error = Some(message.clone());
                TradeOutcome::Failed { message }
            }
            Some(Ok(report)) => {
                if report.verdict.is_some() {
                    self.state.verdict = report.verdict.clone();
                }
                match report.challenge {
                    Ok(challenge) => {
                        self.state.challenge = Some(challenge);
                        self.state.error = None;
                    }
                    Err(e) => {
                        warn!("Challenge refresh after trade failed: {}", e);
                        self.state.error = Some(e.user_message(TRADE_FALLBACK));
                    }
                }
                TradeOutcome::Completed {
                    verdict: report.verdict,
                }
            }
        }
    }
}
