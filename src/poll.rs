//! Polling primitives shared by the dashboard and the leaderboard
//!
//! Fetch cycles run as their own tasks, so a slow response can overlap the
//! next tick. [`CycleClock`] decides which results are still wanted:
//! a result is applied only if it was issued in the current epoch and is
//! newer than the last one applied (last issued wins).

use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Identifies one fetch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub epoch: u64,
    pub seq: u64,
}

#[derive(Debug, Default)]
pub struct CycleClock {
    epoch: u64,
    issued: u64,
    applied: Option<u64>,
}

impl CycleClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> Ticket {
        self.issued += 1;
        Ticket {
            epoch: self.epoch,
            seq: self.issued,
        }
    }

    /// Invalidate every ticket issued so far
    pub fn advance_epoch(&mut self) {
        self.epoch += 1;
        self.applied = None;
    }

    /// Whether a result carrying `ticket` may be applied; records it if so
    pub fn accept(&mut self, ticket: Ticket) -> bool {
        if ticket.epoch != self.epoch {
            return false;
        }
        if self.applied.is_some_and(|applied| ticket.seq <= applied) {
            return false;
        }
        self.applied = Some(ticket.seq);
        true
    }
}

/// At most one repeating timer
#[derive(Debug)]
pub struct Ticker {
    period: Duration,
    interval: Option<Interval>,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// Drop any existing timer and start a fresh one; first tick is one period out
    pub fn restart(&mut self) {
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    pub fn stop(&mut self) {
        self.interval = None;
    }

    /// Wait for the next tick; pends forever while stopped
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_issued_wins() {
        let mut clock = CycleClock::new();
        let first = clock.issue();
        let second = clock.issue();

        assert!(clock.accept(second));
        // older cycle resolving late is dropped
        assert!(!clock.accept(first));
        assert!(!clock.accept(second));
    }

    #[test]
    fn test_epoch_change_invalidates_in_flight() {
        let mut clock = CycleClock::new();
        let stale = clock.issue();
        clock.advance_epoch();
        let fresh = clock.issue();

        assert!(!clock.accept(stale));
        assert!(clock.accept(fresh));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_restart_delays_first_tick() {
        let mut ticker = Ticker::new(Duration::from_secs(30));
        assert!(!ticker.is_running());

        ticker.restart();
        let start = Instant::now();
        ticker.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(30));

        ticker.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_ticker_never_fires() {
        let mut ticker = Ticker::new(Duration::from_secs(1));
        ticker.restart();
        ticker.stop();

        let fired = tokio::time::timeout(Duration::from_secs(10), ticker.tick()).await;
        assert!(fired.is_err());
    }
}
