//! Local reward estimate.
//!
//! The node credits up to [`MAX_POINTS`] per heartbeat window of
//! [`HEARTBEAT_WINDOW_MINUTES`]. Between
//! authoritative pushes from the server the client approximates progress
//! linearly from the last heartbeat, with an occasional random bonus.
//!
//! ```text
//! no heartbeat            -> "Calculating...", 0
//! deadline still ahead    -> "{m}m {s}s",      min(25, elapsed/15 * 25)
//! deadline reached/passed -> "Calculating...", 25
//! ```

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Points available per heartbeat window.
pub const MAX_POINTS: f64 = 25.0;

/// Minutes between heartbeat deadlines.
pub const HEARTBEAT_WINDOW_MINUTES: i64 = 15;

/// Label shown when there is no live countdown.
pub const CALCULATING: &str = "Calculating...";

/// Random bonus applied to the estimate on some ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BonusPolicy {
    /// Chance per tick, 0.0 ..= 1.0.
    pub probability: f64,
    /// Exclusive upper bound of the uniform bonus.
    pub max: f64,
}

impl BonusPolicy {
    pub const fn disabled() -> Self {
        Self {
            probability: 0.0,
            max: 0.0,
        }
    }
}

impl Default for BonusPolicy {
    fn default() -> Self {
        Self {
            probability: 0.1,
            max: 2.0,
        }
    }
}

/// Result of one estimator evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardEstimate {
    pub countdown: String,
    pub points: f64,
}

/// Compute the countdown and point estimate at `now`.
pub fn estimate<R: Rng + ?Sized>(
    now: DateTime<Utc>,
    last_heartbeat_at: Option<DateTime<Utc>>,
    bonus: &BonusPolicy,
    rng: &mut R,
) -> RewardEstimate {
    let Some(last) = last_heartbeat_at else {
        return RewardEstimate {
            countdown: CALCULATING.to_string(),
            points: 0.0,
        };
    };

    let window = Duration::minutes(HEARTBEAT_WINDOW_MINUTES);
    let remaining = (last + window) - now;
    if remaining <= Duration::zero() {
        return RewardEstimate {
            countdown: CALCULATING.to_string(),
            points: MAX_POINTS,
        };
    }

    let elapsed_minutes = ((now - last).num_milliseconds() as f64 / 60_000.0).max(0.0);
    let mut points = floor_cents(
        (elapsed_minutes / HEARTBEAT_WINDOW_MINUTES as f64 * MAX_POINTS).min(MAX_POINTS),
    );

    if bonus.probability > 0.0 && rng.gen::<f64>() < bonus.probability {
        let extra = rng.gen::<f64>() * bonus.max;
        points = floor_cents((points + extra).min(MAX_POINTS));
    }

    RewardEstimate {
        countdown: format_countdown(remaining),
        points,
    }
}

/// [`estimate`] with the bonus switched off.
pub fn estimate_base(
    now: DateTime<Utc>,
    last_heartbeat_at: Option<DateTime<Utc>>,
) -> RewardEstimate {
    estimate(now, last_heartbeat_at, &BonusPolicy::disabled(), &mut rand::thread_rng())
}

/// `"{minutes}m {seconds}s"`, both truncated.
pub fn format_countdown(remaining: Duration) -> String {
    let total_ms = remaining.num_milliseconds().max(0);
    let minutes = total_ms / 60_000;
    let seconds = (total_ms / 1_000) % 60;
    format!("{minutes}m {seconds}s")
}

fn floor_cents(value: f64) -> f64 {
    (value * 100.0).floor() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn no_bonus(now: DateTime<Utc>, last: Option<DateTime<Utc>>) -> RewardEstimate {
        estimate(now, last, &BonusPolicy::disabled(), &mut StdRng::seed_from_u64(0))
    }

    #[test]
    fn no_heartbeat_is_calculating_with_zero() {
        let est = no_bonus(Utc::now(), None);
        assert_eq!(est.countdown, CALCULATING);
        assert_eq!(est.points, 0.0);
    }

    #[test]
    fn fresh_heartbeat_shows_full_window() {
        let now = Utc::now();
        let est = no_bonus(now, Some(now));
        assert_eq!(est.countdown, "15m 0s");
        assert_eq!(est.points, 0.0);
    }

    #[test]
    fn deadline_reached_gives_full_reward() {
        let now = Utc::now();
        let est = no_bonus(now, Some(now - Duration::minutes(15)));
        assert_eq!(est.countdown, CALCULATING);
        assert_eq!(est.points, 25.0);

        let est = no_bonus(now, Some(now - Duration::hours(3)));
        assert_eq!(est.points, 25.0);
    }

    #[test]
    fn halfway_through_window() {
        let now = Utc::now();
        let est = no_bonus(now, Some(now - Duration::seconds(450)));
        assert_eq!(est.countdown, "7m 30s");
        assert_eq!(est.points, 12.5);
    }

    #[test]
    fn estimate_is_floored_to_cents() {
        let now = Utc::now();
        // 1 minute elapsed: 25/15 = 1.6666..
        let est = no_bonus(now, Some(now - Duration::minutes(1)));
        assert_eq!(est.points, 1.66);
        assert_eq!(est.countdown, "14m 0s");
    }

    #[test]
    fn countdown_truncates_partial_seconds() {
        let now = Utc::now();
        let est = no_bonus(now, Some(now - Duration::milliseconds(1_500)));
        assert_eq!(est.countdown, "14m 58s");
    }

    #[test]
    fn future_heartbeat_never_goes_negative() {
        let now = Utc::now();
        let est = no_bonus(now, Some(now + Duration::minutes(2)));
        assert_eq!(est.points, 0.0);
        assert_eq!(est.countdown, "17m 0s");
    }

    #[test]
    fn certain_bonus_stays_within_bounds() {
        let now = Utc::now();
        let always = BonusPolicy {
            probability: 1.0,
            max: 2.0,
        };
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let est = estimate(now, Some(now - Duration::seconds(450)), &always, &mut rng);
            assert!(est.points >= 12.5 && est.points < 14.5, "{}", est.points);
        }
        for _ in 0..200 {
            let est = estimate(now, Some(now - Duration::seconds(890)), &always, &mut rng);
            assert!(est.points <= MAX_POINTS);
        }
    }

    #[test]
    fn default_bonus_fires_on_a_minority_of_ticks() {
        let now = Utc::now();
        let last = Some(now - Duration::seconds(450));
        let mut rng = StdRng::seed_from_u64(7);
        let boosted = (0..2_000)
            .map(|_| estimate(now, last, &BonusPolicy::default(), &mut rng))
            .filter(|est| est.points > 12.5)
            .count();
        // Expect ~10%; allow a wide band.
        assert!(boosted > 100 && boosted < 320, "boosted = {boosted}");
    }
}
