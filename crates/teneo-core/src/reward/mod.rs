mod estimator;
mod ticker;

pub use estimator::{
    estimate, estimate_base, format_countdown, BonusPolicy, RewardEstimate, CALCULATING,
    HEARTBEAT_WINDOW_MINUTES, MAX_POINTS,
};
pub use ticker::RewardTicker;
