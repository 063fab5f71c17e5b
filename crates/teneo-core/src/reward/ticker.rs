//! Recurring reward estimate.
//!
//! Re-evaluates [`estimate`] against the stored heartbeat and persists the
//! countdown label and point estimate. Runs once on start, then once per
//! period until stopped.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::estimator::{estimate, BonusPolicy, RewardEstimate};
use crate::error::StorageError;
use crate::periodic::TaskSlot;
use crate::storage::{PersistedState, StateStore};

pub struct RewardTicker {
    store: StateStore,
    period: Duration,
    bonus: BonusPolicy,
    task: TaskSlot,
}

impl RewardTicker {
    pub fn new(store: StateStore, period: Duration, bonus: BonusPolicy) -> Self {
        Self {
            store,
            period,
            bonus,
            task: TaskSlot::default(),
        }
    }

    /// Evaluate and persist once, synchronously.
    pub fn tick_once(&self) -> Result<RewardEstimate, StorageError> {
        tick(&self.store, &self.bonus, &mut rand::thread_rng())
    }

    /// Tick now, then every period. Restarting replaces the running task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        self.stop();
        if let Err(e) = self.tick_once() {
            warn!(error = %e, "reward tick failed");
        }

        let store = self.store.clone();
        let bonus = self.bonus;
        let period = self.period;
        self.task.replace(tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = tick(&store, &bonus, &mut rng) {
                    warn!(error = %e, "reward tick failed");
                }
            }
        }));
        debug!(period_ms = self.period.as_millis() as u64, "reward ticker started");
    }

    /// Idempotent.
    pub fn stop(&self) {
        if self.task.stop() {
            debug!("reward ticker stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }
}

fn tick<R: Rng + ?Sized>(
    store: &StateStore,
    bonus: &BonusPolicy,
    rng: &mut R,
) -> Result<RewardEstimate, StorageError> {
    let state = store.read()?;
    let est = estimate(Utc::now(), state.last_heartbeat_at, bonus, rng);
    store.merge(PersistedState {
        estimated_points: est.points,
        countdown_label: est.countdown.clone(),
        ..Default::default()
    })?;
    Ok(est)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reward::CALCULATING;
    use tempfile::TempDir;

    fn ticker(dir: &TempDir, period: Duration) -> (StateStore, RewardTicker) {
        let store = StateStore::at(dir.path().join("state.json"));
        let ticker = RewardTicker::new(store.clone(), period, BonusPolicy::disabled());
        (store, ticker)
    }

    #[test]
    fn tick_once_without_heartbeat_persists_label_only() {
        let dir = TempDir::new().unwrap();
        let (store, ticker) = ticker(&dir, Duration::from_secs(1));
        let est = ticker.tick_once().unwrap();
        assert_eq!(est.countdown, CALCULATING);
        let state = store.read().unwrap();
        assert_eq!(state.countdown_label, CALCULATING);
        assert_eq!(state.estimated_points, 0.0);
    }

    #[test]
    fn tick_once_persists_estimate() {
        let dir = TempDir::new().unwrap();
        let (store, ticker) = ticker(&dir, Duration::from_secs(1));
        store
            .merge(PersistedState {
                last_heartbeat_at: Some(Utc::now() - chrono::Duration::minutes(20)),
                ..Default::default()
            })
            .unwrap();
        ticker.tick_once().unwrap();
        let state = store.read().unwrap();
        assert_eq!(state.estimated_points, 25.0);
        assert_eq!(state.countdown_label, CALCULATING);
    }

    /// Let spawned tasks run after the paused clock moved.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn start_ticks_immediately_then_every_period() {
        let dir = TempDir::new().unwrap();
        let (store, ticker) = ticker(&dir, Duration::from_secs(1));

        ticker.start();
        settle().await;
        assert!(ticker.is_running());
        assert_eq!(store.read().unwrap().countdown_label, CALCULATING);

        store
            .merge(PersistedState {
                last_heartbeat_at: Some(Utc::now()),
                ..Default::default()
            })
            .unwrap();
        tokio::time::advance(Duration::from_millis(500)).await;
        settle().await;
        assert_eq!(store.read().unwrap().countdown_label, CALCULATING);

        tokio::time::advance(Duration::from_millis(600)).await;
        settle().await;
        let label = store.read().unwrap().countdown_label;
        assert_ne!(label, CALCULATING);
        assert!(label.starts_with("14m") || label == "15m 0s", "label: {label}");

        ticker.stop();
        assert!(!ticker.is_running());
        ticker.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn restart_keeps_one_task() {
        let dir = TempDir::new().unwrap();
        let (_store, ticker) = ticker(&dir, Duration::from_secs(1));
        ticker.start();
        ticker.start();
        assert!(ticker.is_running());
        tokio::time::advance(Duration::from_secs(3)).await;
        settle().await;
        assert!(ticker.is_running());
        ticker.stop();
        assert!(!ticker.is_running());
    }

    #[tokio::test]
    async fn stop_without_start_is_noop() {
        let dir = TempDir::new().unwrap();
        let (_store, ticker) = ticker(&dir, Duration::from_secs(1));
        ticker.stop();
        assert!(!ticker.is_running());
    }
}
