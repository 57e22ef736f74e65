use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::conf::ReplayConfig;
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayMode {
    /// Follow the original spacing of the activities.
    Real,
    /// Emit in fixed batches, ignoring the original spacing.
    Fast,
}

impl FromStr for ReplayMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "real" => Ok(ReplayMode::Real),
            "fast" => Ok(ReplayMode::Fast),
            other => Err(EngineError::InvalidArgument(format!(
                "unknown replay mode `{}` (expected `real` or `fast`)",
                other
            ))),
        }
    }
}

impl fmt::Display for ReplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReplayMode::Real => "real",
            ReplayMode::Fast => "fast",
        })
    }
}

/// Pace of a replay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Throttle {
    /// Emit each activity when the unpaused wall clock reaches its original
    /// start, scaled by `speed_percent / 100`.
    Real { speed_percent: u32 },
    /// Emit `batch_size` activities, then sleep `pause`.
    Fast { batch_size: usize, pause: Duration },
}

impl Throttle {
    pub fn from_config(mode: ReplayMode, config: &ReplayConfig) -> Self {
        match mode {
            ReplayMode::Real => Throttle::Real {
                speed_percent: config.speed_percent.max(1),
            },
            ReplayMode::Fast => Throttle::Fast {
                batch_size: config.fast_batch_size.max(1),
                pause: Duration::from_millis(config.fast_batch_sleep_ms),
            },
        }
    }

    /// How long after the replay start (paused time excluded) the
    /// `index`-th activity, starting `offset_secs` after the first one, is due.
    pub(crate) fn due(&self, index: usize, offset_secs: f64) -> Duration {
        match *self {
            Throttle::Real { speed_percent } => {
                let scaled = offset_secs.max(0.0) * 100.0 / f64::from(speed_percent.max(1));
                Duration::from_secs_f64(scaled)
            }
            Throttle::Fast { batch_size, pause } => {
                let batches = (index / batch_size.max(1)) as u32;
                pause.saturating_mul(batches)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!("real".parse::<ReplayMode>().unwrap(), ReplayMode::Real);
        assert_eq!("FAST".parse::<ReplayMode>().unwrap(), ReplayMode::Fast);
        assert!("slow".parse::<ReplayMode>().is_err());
    }

    #[test]
    fn test_real_due_scales_with_speed() {
        let normal = Throttle::Real { speed_percent: 100 };
        assert_eq!(normal.due(3, 2.0), Duration::from_secs(2));
        let double = Throttle::Real { speed_percent: 200 };
        assert_eq!(double.due(3, 2.0), Duration::from_secs(1));
    }

    #[test]
    fn test_fast_due_counts_batches() {
        let fast = Throttle::Fast {
            batch_size: 4,
            pause: Duration::from_millis(50),
        };
        assert_eq!(fast.due(0, 99.0), Duration::ZERO);
        assert_eq!(fast.due(3, 99.0), Duration::ZERO);
        assert_eq!(fast.due(4, 0.0), Duration::from_millis(50));
        assert_eq!(fast.due(9, 0.0), Duration::from_millis(100));
    }

    #[test]
    fn test_from_config() {
        let config = ReplayConfig::default();
        assert_eq!(
            Throttle::from_config(ReplayMode::Real, &config),
            Throttle::Real { speed_percent: 100 }
        );
        assert_eq!(
            Throttle::from_config(ReplayMode::Fast, &config),
            Throttle::Fast {
                batch_size: 64,
                pause: Duration::from_millis(50)
            }
        );
    }
}
