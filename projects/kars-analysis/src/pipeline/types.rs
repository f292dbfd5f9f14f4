use opencv::core::Mat;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A 2D point in normalized coordinates [0, 1]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A decoded frame, already resized to the processing width.
pub struct Frame {
    /// Position in presentation order, starting at 0
    pub id: usize,
    pub mat: Mat,
}

/// Landmarks of the single subject (face or hand) found in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn get(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Axis-aligned bounds as (min, max), or None for an empty set.
    pub fn bounds(&self) -> Option<(Point, Point)> {
        if self.points.is_empty() {
            return None;
        }

        let mut min = Point::new(f32::MAX, f32::MAX);
        let mut max = Point::new(f32::MIN, f32::MIN);
        for p in &self.points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some((min, max))
    }
}

/// A metric value and the frame it was measured on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample<T> {
    pub frame_index: usize,
    pub value: T,
}

/// Everything one aggregation run collected, handed to the reduction step.
#[derive(Debug, Clone)]
pub struct AxisRun<T> {
    pub calibration: Vec<Sample<T>>,
    pub tracking: Vec<Sample<T>>,
    /// Frames dequeued from the stream (sampled or not)
    pub frames_read: usize,
    /// Frames handed to the landmark detector
    pub frames_sampled: usize,
    /// Frames dequeued after calibration (sampled or not)
    pub tracked_frames: usize,
    /// Sampled frames the detector failed on
    pub detect_errors: usize,
    pub elapsed: Duration,
}

impl<T> Default for AxisRun<T> {
    fn default() -> Self {
        Self {
            calibration: Vec::new(),
            tracking: Vec::new(),
            frames_read: 0,
            frames_sampled: 0,
            tracked_frames: 0,
            detect_errors: 0,
            elapsed: Duration::ZERO,
        }
    }
}

/// Mood axis output, serialized as the `mood` member of a response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MoodReport {
    pub mood: String,
    pub mood_score: f64,
    pub expression: String,
    pub smile_score: f64,
}

/// Hand axis output: share of tracked frames with noticeable wrist movement (0-100).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HandReport {
    pub hand: f64,
}

/// Merged response; axes that were not requested are omitted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct AnalysisReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<MoodReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand: Option<HandReport>,
}

/// Body of an analysis request.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
}

/// Which axes a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisMode {
    Mood,
    Hand,
    #[default]
    Both,
}

impl AnalysisMode {
    /// Unrecognized values select both axes.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("mood") => AnalysisMode::Mood,
            Some("hand") => AnalysisMode::Hand,
            _ => AnalysisMode::Both,
        }
    }

    pub fn wants_mood(self) -> bool {
        matches!(self, AnalysisMode::Mood | AnalysisMode::Both)
    }

    pub fn wants_hand(self) -> bool {
        matches!(self, AnalysisMode::Hand | AnalysisMode::Both)
    }
}
