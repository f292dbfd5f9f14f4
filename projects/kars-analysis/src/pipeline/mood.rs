// Mood axis: face mesh -> mouth/eye ratios -> averaged mood and smile labels.

use crate::config::{AnalysisConfig, LabelThresholds};
use crate::pipeline::aggregate::{mean, MetricAxis};
use crate::pipeline::detection::DetectorKind;
use crate::pipeline::geometry::{mood_ratio, smile_ratio};
use crate::pipeline::types::{AxisRun, LandmarkSet, MoodReport};

const NO_DETECTION: &str = "No Detection";

/// Face ratios measured on one frame. Each is absent when its geometry is degenerate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceMetrics {
    pub mood: Option<f64>,
    pub smile: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct MoodAxis {
    pub skip_rate: usize,
    pub mood_thresholds: LabelThresholds,
    pub smile_thresholds: LabelThresholds,
}

impl MoodAxis {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            skip_rate: config.mood_skip_rate,
            mood_thresholds: config.mood_thresholds,
            smile_thresholds: config.smile_thresholds,
        }
    }

    pub fn mood_label(&self, average: f64) -> &'static str {
        if average > self.mood_thresholds.upper {
            "Positive"
        } else if average < self.mood_thresholds.lower {
            "Negative"
        } else {
            "Neutral"
        }
    }

    pub fn expression_label(&self, average: f64) -> &'static str {
        if average > self.smile_thresholds.upper {
            "Smiling"
        } else if average < self.smile_thresholds.lower {
            "Sad"
        } else {
            "Neutral Expression"
        }
    }
}

impl MetricAxis for MoodAxis {
    type Value = FaceMetrics;
    type Output = MoodReport;

    fn name(&self) -> &'static str {
        "mood"
    }

    fn detector_kind(&self) -> DetectorKind {
        DetectorKind::Face
    }

    fn skip_rate(&self) -> usize {
        self.skip_rate
    }

    fn extract(&self, landmarks: &LandmarkSet) -> Option<FaceMetrics> {
        let metrics = FaceMetrics {
            mood: mood_ratio(landmarks),
            smile: smile_ratio(landmarks),
        };
        (metrics.mood.is_some() || metrics.smile.is_some()).then_some(metrics)
    }

    fn reduce(&self, run: &AxisRun<FaceMetrics>) -> MoodReport {
        let samples = &run.tracking;
        let mood = mean(samples.iter().filter_map(|s| s.value.mood));
        let smile = mean(samples.iter().filter_map(|s| s.value.smile));

        let (mood, mood_score) = match mood {
            Some(avg) => (self.mood_label(avg), avg),
            None => (NO_DETECTION, 0.0),
        };
        let (expression, smile_score) = match smile {
            Some(avg) => (self.expression_label(avg), avg),
            None => (NO_DETECTION, 0.0),
        };

        MoodReport {
            mood: format!("OVERALL: {}", mood),
            mood_score,
            expression: expression.to_string(),
            smile_score,
        }
    }

    fn no_detection(&self) -> MoodReport {
        MoodReport {
            mood: format!("OVERALL: {}", NO_DETECTION),
            mood_score: 0.0,
            expression: NO_DETECTION.to_string(),
            smile_score: 0.0,
        }
    }
}
