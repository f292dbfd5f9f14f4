// Hand axis: wrist height against a calibrated baseline.
//
// The first seconds of the clip establish where the wrist rests. Afterwards
// every frame read counts towards the denominator, and sampled frames whose
// wrist strays further than the movement threshold count as movement.

use crate::config::AnalysisConfig;
use crate::pipeline::aggregate::{mean, MetricAxis};
use crate::pipeline::detection::DetectorKind;
use crate::pipeline::geometry::wrist_y;
use crate::pipeline::types::{AxisRun, HandReport, LandmarkSet, Sample};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HandAxis {
    pub skip_rate: usize,
    pub calibration_window: Duration,
    pub movement_threshold: f64,
}

/// Resting wrist height, fixed once calibration ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline(f64);

impl Baseline {
    pub fn from_samples(samples: &[Sample<f64>]) -> Option<Self> {
        mean(samples.iter().map(|s| s.value)).map(Baseline)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn moved(self, y: f64, threshold: f64) -> bool {
        (y - self.0).abs() > threshold
    }
}

impl HandAxis {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            skip_rate: config.hand_skip_rate,
            calibration_window: config.calibration_window(),
            movement_threshold: config.movement_threshold,
        }
    }
}

impl MetricAxis for HandAxis {
    type Value = f64;
    type Output = HandReport;

    fn name(&self) -> &'static str {
        "hand"
    }

    fn detector_kind(&self) -> DetectorKind {
        DetectorKind::Hand
    }

    fn skip_rate(&self) -> usize {
        self.skip_rate
    }

    fn calibration_window(&self) -> Option<Duration> {
        Some(self.calibration_window)
    }

    fn extract(&self, landmarks: &LandmarkSet) -> Option<f64> {
        wrist_y(landmarks)
    }

    fn reduce(&self, run: &AxisRun<f64>) -> HandReport {
        let Some(baseline) = Baseline::from_samples(&run.calibration) else {
            return self.no_detection();
        };
        if run.tracked_frames == 0 {
            tracing::debug!("hand: no frames left to track after calibration");
            return HandReport { hand: 0.0 };
        }

        let moving = run
            .tracking
            .iter()
            .filter(|s| baseline.moved(s.value, self.movement_threshold))
            .count();

        tracing::debug!(
            "hand: baseline={:.4}, moving={}, tracked={}",
            baseline.value(),
            moving,
            run.tracked_frames
        );

        HandReport {
            hand: 100.0 * moving as f64 / run.tracked_frames as f64,
        }
    }

    fn no_detection(&self) -> HandReport {
        HandReport { hand: 0.0 }
    }
}
