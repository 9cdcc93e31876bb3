use std::time::Duration;

use crate::scenario::model::Stage;

/// Turns a stage timeline into a target concurrency for any point of the run.
///
/// Within a stage the target moves linearly from the previous stage's target
/// (or `start_target` for the first stage) to the stage's own target. Outside
/// the timeline the target is 0. The result depends only on `elapsed`.
#[derive(Debug, Clone)]
pub struct RampScheduler {
    stages: Vec<Stage>,
    start_target: u32,
    total: Duration,
}

impl RampScheduler {
    pub fn new(stages: Vec<Stage>, start_target: u32) -> Self {
        let total = stages.iter().map(|s| s.duration).sum();
        Self {
            stages,
            start_target,
            total,
        }
    }

    /// Sum of all stage durations.
    pub fn total_duration(&self) -> Duration {
        self.total
    }

    /// Whether `elapsed` lies past the end of the last stage.
    pub fn is_finished(&self, elapsed: Duration) -> bool {
        elapsed >= self.total
    }

    /// Index of the stage active at `elapsed`, if any.
    pub fn stage_index(&self, elapsed: Duration) -> Option<usize> {
        let mut window_start = Duration::ZERO;
        for (idx, stage) in self.stages.iter().enumerate() {
            let window_end = window_start + stage.duration;
            if elapsed < window_end {
                return Some(idx);
            }
            window_start = window_end;
        }
        None
    }

    /// Target concurrency at `elapsed` since the start of the run.
    pub fn target_at(&self, elapsed: Duration) -> u32 {
        let mut window_start = Duration::ZERO;
        let mut anchor = self.start_target;
        for stage in &self.stages {
            let window_end = window_start + stage.duration;
            if elapsed < window_end {
                let progress = (elapsed - window_start).as_secs_f64()
                    / stage.duration.as_secs_f64();
                let from = f64::from(anchor);
                let to = f64::from(stage.target);
                let value = from + (to - from) * progress;
                return value.round().clamp(0.0, f64::from(u32::MAX)) as u32;
            }
            window_start = window_end;
            anchor = stage.target;
        }
        0
    }
}
