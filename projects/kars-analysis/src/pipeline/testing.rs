// Synthetic frame sources, detectors and backends for driving the pipeline in tests.

use crate::config::AnalysisConfig;
use crate::pipeline::detection::{DetectorKind, LandmarkDetector};
use crate::pipeline::geometry::face;
use crate::pipeline::orchestrator::MediaBackend;
use crate::pipeline::types::{Frame, LandmarkSet, Point};
use crate::video::{SourceUnavailable, VideoReader};
use anyhow::{bail, Result};
use opencv::core::{Mat, Scalar, CV_8UC3};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn blank_mat(width: i32, height: i32) -> Mat {
    Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::all(0.0)).unwrap()
}

/// Yields `count` black frames, optionally failing or pausing along the way.
pub struct SyntheticReader {
    count: usize,
    width: i32,
    height: i32,
    position: usize,
    fail_at: Option<usize>,
    delay: Duration,
    released: Arc<AtomicBool>,
}

impl SyntheticReader {
    pub fn new(count: usize, width: i32, height: i32) -> Self {
        Self {
            count,
            width,
            height,
            position: 0,
            fail_at: None,
            delay: Duration::ZERO,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Report a decode error instead of frame `index`.
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Sleep before producing each frame.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set once the reader has been dropped.
    pub fn released_flag(&self) -> Arc<AtomicBool> {
        self.released.clone()
    }
}

impl VideoReader for SyntheticReader {
    fn frame_count(&self) -> Result<usize> {
        Ok(self.count)
    }

    fn source_fps(&self) -> Result<f64> {
        Ok(30.0)
    }

    fn next_frame(&mut self) -> Result<Option<Mat>> {
        if self.fail_at == Some(self.position) {
            bail!("synthetic decode failure at frame {}", self.position);
        }
        if self.position >= self.count {
            return Ok(None);
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.position += 1;
        Ok(Some(blank_mat(self.width, self.height)))
    }
}

impl Drop for SyntheticReader {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

pub type CallLog = Arc<Mutex<Vec<usize>>>;

type Script = Box<dyn FnMut(&Frame) -> Result<Option<LandmarkSet>> + Send>;

/// Answers each frame from a closure keyed on the frame, recording the ids it saw.
pub struct ScriptedDetector {
    script: Script,
    calls: Option<CallLog>,
}

impl ScriptedDetector {
    pub fn new(mut script: impl FnMut(&Frame) -> Option<LandmarkSet> + Send + 'static) -> Self {
        Self {
            script: Box::new(move |frame: &Frame| Ok(script(frame))),
            calls: None,
        }
    }

    /// Inference errors on every frame whose id matches `fails`; other frames see a resting hand.
    pub fn failing_on(fails: fn(usize) -> bool) -> Self {
        Self {
            script: Box::new(move |frame: &Frame| -> Result<Option<LandmarkSet>> {
                if fails(frame.id) {
                    bail!("inference failed on frame {}", frame.id);
                }
                Ok(Some(hand_at(0.5)))
            }),
            calls: None,
        }
    }

    pub fn logging_to(mut self, calls: CallLog) -> Self {
        self.calls = Some(calls);
        self
    }
}

impl LandmarkDetector for ScriptedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>> {
        if let Some(calls) = &self.calls {
            calls.lock().unwrap().push(frame.id);
        }
        (self.script)(frame)
    }
}

/// 21 hand points with the wrist at height `y`.
pub fn hand_at(y: f32) -> LandmarkSet {
    let mut points = vec![Point::new(0.5, 0.5); 21];
    points[0] = Point::new(0.5, y);
    LandmarkSet::new(points)
}

pub fn constant_hand(y: f32) -> impl FnMut(&Frame) -> Option<LandmarkSet> + Send + 'static {
    move |_: &Frame| Some(hand_at(y))
}

/// 468 face points whose mouth/eye geometry gives the requested ratios.
///
/// Inner eyes sit 0.4 apart; the mouth width is `mood * 0.4`, and the mouth
/// is lowered until the eye-to-corner distance yields `smile`.
pub fn face_with_ratios(mood: f64, smile: f64) -> LandmarkSet {
    let eye_gap = 0.4;
    let mouth_width = mood * eye_gap;
    let side = (mouth_width / smile).powi(2) - ((eye_gap - mouth_width) / 2.0).powi(2);
    let drop = side.max(0.0).sqrt();

    let mut points = vec![Point::new(0.5, 0.5); 468];
    points[face::LEFT_EYE_INNER] = Point::new((0.5 - eye_gap / 2.0) as f32, 0.3);
    points[face::RIGHT_EYE_INNER] = Point::new((0.5 + eye_gap / 2.0) as f32, 0.3);
    points[face::MOUTH_LEFT] = Point::new((0.5 - mouth_width / 2.0) as f32, (0.3 + drop) as f32);
    points[face::MOUTH_RIGHT] = Point::new((0.5 + mouth_width / 2.0) as f32, (0.3 + drop) as f32);
    LandmarkSet::new(points)
}

pub type FrameScript = fn(&Frame) -> Option<LandmarkSet>;

/// Synthetic media: any existing path opens to `frames` blank frames and
/// detectors follow fixed per-kind scripts.
pub struct SyntheticBackend {
    pub frames: usize,
    pub frame_delay: Duration,
    pub face: FrameScript,
    pub hand: FrameScript,
    /// Refuse to load the detector of this kind
    pub broken_detector: Option<DetectorKind>,
}

impl SyntheticBackend {
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            frame_delay: Duration::ZERO,
            face: |_| None,
            hand: |_| None,
            broken_detector: None,
        }
    }
}

impl MediaBackend for SyntheticBackend {
    fn open_source(&self, path: &Path) -> Result<Box<dyn VideoReader>, SourceUnavailable> {
        if !path.exists() {
            return Err(SourceUnavailable {
                path: path.display().to_string(),
                reason: "file does not exist".into(),
            });
        }
        Ok(Box::new(
            SyntheticReader::new(self.frames, 320, 240).with_delay(self.frame_delay),
        ))
    }

    fn open_detector(
        &self,
        kind: DetectorKind,
        _config: &AnalysisConfig,
    ) -> Result<Box<dyn LandmarkDetector>> {
        if self.broken_detector == Some(kind) {
            bail!("{} model failed to load", kind.name());
        }
        let script = match kind {
            DetectorKind::Face => self.face,
            DetectorKind::Hand => self.hand,
        };
        Ok(Box::new(ScriptedDetector::new(script)))
    }
}
