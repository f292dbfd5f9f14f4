// Analysis tunables
//
// Defaults are the values the service ships with. None of them is an
// invariant of the algorithms; all can be overridden from the command line.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Width every decoded frame is resized to before it is queued.
pub const DEFAULT_PROCESS_WIDTH: i32 = 240;
/// Capacity of the reader -> analysis frame queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;
pub const DEFAULT_SKIP_RATE: usize = 10;
pub const DEFAULT_CALIBRATION_SECS: f64 = 3.0;
pub const DEFAULT_MOVEMENT_THRESHOLD: f64 = 0.05;
pub const DEFAULT_TRANSCODE_TIMEOUT_SECS: u64 = 300;

/// Confidence contract handed to a landmark model.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct DetectorSettings {
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

/// Label cutoffs for an averaged ratio. Both comparisons are strict.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct LabelThresholds {
    pub upper: f64,
    pub lower: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AnalysisConfig {
    pub process_width: i32,
    pub queue_capacity: usize,
    pub mood_skip_rate: usize,
    pub hand_skip_rate: usize,
    pub calibration_secs: f64,
    pub movement_threshold: f64,
    /// Positive above `upper`, Negative below `lower`
    pub mood_thresholds: LabelThresholds,
    /// Smiling above `upper`, Sad below `lower`
    pub smile_thresholds: LabelThresholds,
    pub face_detector: DetectorSettings,
    pub hand_detector: DetectorSettings,
    pub face_model: Option<PathBuf>,
    pub hand_model: Option<PathBuf>,
    pub transcode_timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            process_width: DEFAULT_PROCESS_WIDTH,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            mood_skip_rate: DEFAULT_SKIP_RATE,
            hand_skip_rate: DEFAULT_SKIP_RATE,
            calibration_secs: DEFAULT_CALIBRATION_SECS,
            movement_threshold: DEFAULT_MOVEMENT_THRESHOLD,
            mood_thresholds: LabelThresholds {
                upper: 0.55,
                lower: 0.35,
            },
            smile_thresholds: LabelThresholds {
                upper: 0.4,
                lower: 0.2,
            },
            face_detector: DetectorSettings {
                min_detection_confidence: 0.5,
                min_tracking_confidence: 0.3,
            },
            hand_detector: DetectorSettings {
                min_detection_confidence: 0.5,
                min_tracking_confidence: 0.5,
            },
            face_model: None,
            hand_model: None,
            transcode_timeout_secs: DEFAULT_TRANSCODE_TIMEOUT_SECS,
        }
    }
}

impl AnalysisConfig {
    pub fn calibration_window(&self) -> Duration {
        Duration::from_secs_f64(self.calibration_secs.max(0.0))
    }

    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode_timeout_secs)
    }
}
