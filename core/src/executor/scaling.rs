use std::time::Duration;

use tokio::time::Instant;

use crate::config::ScalingConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalingSignal {
    ScaleUp { ratio: f64 },
    ScaleDown { ratio: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Band {
    Inside,
    Above { since: Instant, fired: bool },
    Below { since: Instant, fired: bool },
}

/// Watermark detector over the ready-tasks / healthy-workers ratio.
///
/// A signal fires once the ratio has stayed outside the band for the
/// debounce window, and only once per excursion. Returning inside the band
/// re-arms it. Acting on the signal is up to the subscriber.
#[derive(Debug, Clone)]
pub struct ScalingDetector {
    enabled: bool,
    high: f64,
    low: f64,
    debounce: Duration,
    band: Band,
}

impl ScalingDetector {
    pub fn new(config: &ScalingConfig) -> Self {
        Self {
            enabled: config.enabled,
            high: config.high_watermark,
            low: config.low_watermark,
            debounce: config.debounce(),
            band: Band::Inside,
        }
    }

    /// `None` when the ratio is undefined (no workers, nothing ready).
    pub fn ratio(ready_unassigned: usize, healthy_workers: usize) -> Option<f64> {
        match (ready_unassigned, healthy_workers) {
            (0, 0) => None,
            (_, 0) => Some(f64::INFINITY),
            (ready, healthy) => Some(ready as f64 / healthy as f64),
        }
    }

    pub fn observe(
        &mut self,
        ready_unassigned: usize,
        healthy_workers: usize,
        now: Instant,
    ) -> Option<ScalingSignal> {
        if !self.enabled {
            return None;
        }
        let Some(ratio) = Self::ratio(ready_unassigned, healthy_workers) else {
            self.band = Band::Inside;
            return None;
        };

        if ratio > self.high {
            let (since, fired) = match self.band {
                Band::Above { since, fired } => (since, fired),
                _ => (now, false),
            };
            let fire = !fired && now.saturating_duration_since(since) >= self.debounce;
            self.band = Band::Above {
                since,
                fired: fired || fire,
            };
            fire.then_some(ScalingSignal::ScaleUp { ratio })
        } else if ratio < self.low {
            let (since, fired) = match self.band {
                Band::Below { since, fired } => (since, fired),
                _ => (now, false),
            };
            let fire = !fired && now.saturating_duration_since(since) >= self.debounce;
            self.band = Band::Below {
                since,
                fired: fired || fire,
            };
            fire.then_some(ScalingSignal::ScaleDown { ratio })
        } else {
            self.band = Band::Inside;
            None
        }
    }
}
