//! Sliding time windows.

use crate::lattice::TimeLattice;
use crate::params::CommonParams;
use crate::registry::Method;
use serde::{Deserialize, Serialize};
use tessera_core::{Points, TessellationError};

/// Upper bound on the number of windows grown from one reference set.
const MAX_WINDOWS: usize = 10_000_000;

/// Settings of the sliding window method.
///
/// Windows start at the earliest reference timestamp and advance by
/// `shift` until one covers the latest timestamp.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Window width, in seconds or frames.
    pub duration: f64,
    /// Step between consecutive window starts. Defaults to `duration`
    /// (contiguous, non-overlapping windows).
    pub shift: Option<f64>,
    /// Interpret `duration` and `shift` as frame counts.
    pub frames: bool,
    /// Seconds per frame. Estimated from the reference timestamps when
    /// unset.
    pub frame_interval: Option<f64>,
}

impl WindowConfig {
    /// Windows of `duration` seconds, advancing by `shift` seconds.
    pub fn seconds(duration: f64, shift: f64) -> Self {
        Self {
            duration,
            shift: Some(shift),
            frames: false,
            frame_interval: None,
        }
    }

    /// Windows of `duration` frames, advancing by `shift` frames.
    pub fn frames(duration: f64, shift: f64) -> Self {
        Self {
            duration,
            shift: Some(shift),
            frames: true,
            frame_interval: None,
        }
    }

    /// Check that widths and steps are positive.
    pub fn validate(&self) -> Result<(), TessellationError> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(TessellationError::config(format!(
                    "window {name} must be finite and positive, got {v}"
                )))
            }
        };
        positive("duration", self.duration)?;
        if let Some(shift) = self.shift {
            positive("shift", shift)?;
        }
        if let Some(dt) = self.frame_interval {
            positive("frame_interval", dt)?;
        }
        Ok(())
    }

    /// Lay windows over the time range of `reference`.
    pub fn tessellate(
        &self,
        reference: &Points,
        common: &CommonParams,
    ) -> Result<TimeLattice, TessellationError> {
        self.validate()?;
        common.validate()?;
        if reference.is_empty() {
            return Err(TessellationError::EmptyReference);
        }
        let times = reference.times().ok_or(TessellationError::MissingTimestamps)?;
        let (t_min, t_max) = reference
            .time_range()
            .ok_or(TessellationError::MissingTimestamps)?;

        let unit = if self.frames {
            match self.frame_interval {
                Some(dt) => dt,
                None => estimate_frame_interval(times).ok_or_else(|| {
                    TessellationError::config(
                        "frame_interval cannot be estimated from a single timestamp",
                    )
                })?,
            }
        } else {
            1.0
        };
        let duration = self.duration * unit;
        let shift = self.shift.unwrap_or(self.duration) * unit;

        let mut segments = Vec::new();
        loop {
            let start = t_min + segments.len() as f64 * shift;
            let end = start + duration;
            segments.push((start, end));
            if end > t_max {
                break;
            }
            if segments.len() >= MAX_WINDOWS {
                return Err(TessellationError::config(format!(
                    "shift {shift} over [{t_min}, {t_max}] yields more than {MAX_WINDOWS} windows"
                )));
            }
        }
        Ok(TimeLattice::new(Method::Window, segments))
    }
}

/// Smallest positive gap between distinct timestamps.
fn estimate_frame_interval(times: &[f64]) -> Option<f64> {
    let mut sorted = times.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|dt| *dt > 0.0)
        .min_by(f64::total_cmp)
}
