use crate::config::{AnalysisConfig, DetectorSettings};
use crate::pipeline::types::{Frame, LandmarkSet, Point};
use anyhow::{anyhow, bail, Context, Result};
use opencv::core::{Mat, Rect, Size};
use opencv::imgproc;
use opencv::prelude::*;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use std::path::Path;

/// A landmark model: given a frame, at most one subject's landmarks.
/// A frame without a subject yields `Ok(None)`, not an error.
pub trait LandmarkDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectorKind {
    Face,
    Hand,
}

impl DetectorKind {
    pub fn name(self) -> &'static str {
        match self {
            DetectorKind::Face => "face",
            DetectorKind::Hand => "hand",
        }
    }

    pub fn model_spec(self) -> LandmarkModelSpec {
        match self {
            DetectorKind::Face => LandmarkModelSpec {
                input_size: 192,
                point_count: 468,
                input_range: InputRange::SignedUnit,
                landmarks_output: "Identity",
                presence_output: "Identity_1",
                presence_is_logit: true,
            },
            DetectorKind::Hand => LandmarkModelSpec {
                input_size: 224,
                point_count: 21,
                input_range: InputRange::Unit,
                landmarks_output: "Identity",
                presence_output: "Identity_1",
                presence_is_logit: false,
            },
        }
    }

    pub fn settings(self, config: &AnalysisConfig) -> DetectorSettings {
        match self {
            DetectorKind::Face => config.face_detector,
            DetectorKind::Hand => config.hand_detector,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRange {
    /// Pixels scaled to [-1, 1]
    SignedUnit,
    /// Pixels scaled to [0, 1]
    Unit,
}

/// Tensor layout of a MediaPipe landmark model exported to ONNX.
/// Input is NHWC RGB `[1, size, size, 3]`; landmarks come back as
/// `point_count * 3` values (x, y, z) in input pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkModelSpec {
    pub input_size: i32,
    pub point_count: usize,
    pub input_range: InputRange,
    pub landmarks_output: &'static str,
    pub presence_output: &'static str,
    pub presence_is_logit: bool,
}

/// Open the detector for `kind` using the model path from the config.
pub fn open_detector(kind: DetectorKind, config: &AnalysisConfig) -> Result<Box<dyn LandmarkDetector>> {
    let model_path = match kind {
        DetectorKind::Face => config.face_model.as_deref(),
        DetectorKind::Hand => config.hand_model.as_deref(),
    }
    .ok_or_else(|| anyhow!("No {} landmark model configured", kind.name()))?;

    let detector = OnnxLandmarkDetector::load(kind, model_path, kind.settings(config))?;
    Ok(Box::new(detector))
}

/// ONNX Runtime wrapper for a single-subject landmark model.
///
/// Searches the whole frame until a subject is found with
/// `min_detection_confidence`, then re-uses the previous landmarks' bounding
/// box as region of interest while presence stays above
/// `min_tracking_confidence`. A miss drops back to full-frame search.
pub struct OnnxLandmarkDetector {
    session: Session,
    spec: LandmarkModelSpec,
    settings: DetectorSettings,
    tracked_roi: Option<Rect>,
}

impl OnnxLandmarkDetector {
    pub fn load(kind: DetectorKind, model_path: &Path, settings: DetectorSettings) -> Result<Self> {
        if !model_path.exists() {
            bail!(
                "{} landmark model not found at {}",
                kind.name(),
                model_path.display()
            );
        }

        let session = Session::builder()
            .map_err(|e| anyhow!("ORT session builder: {e}"))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| anyhow!("ORT opt level: {e}"))?
            .commit_from_file(model_path)
            .map_err(|e| anyhow!("ORT load model {}: {e}", model_path.display()))?;

        tracing::debug!(
            "Loaded {} landmark model from {}",
            kind.name(),
            model_path.display()
        );

        Ok(Self {
            session,
            spec: kind.model_spec(),
            settings,
            tracked_roi: None,
        })
    }

    fn run_model(&mut self, crop: &Mat) -> Result<(f32, Vec<f32>)> {
        let tensor = mat_to_input_tensor(crop, &self.spec)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| anyhow!("ORT run failed: {e}"))?;

        let presence = outputs
            .get(self.spec.presence_output)
            .ok_or_else(|| anyhow!("Model returned no '{}' output", self.spec.presence_output))?;
        let (_, presence) = presence
            .try_extract_tensor::<f32>()
            .map_err(|e| anyhow!("ORT extract presence: {e}"))?;
        let presence = *presence
            .first()
            .ok_or_else(|| anyhow!("Empty presence output"))?;

        let landmarks = outputs
            .get(self.spec.landmarks_output)
            .ok_or_else(|| anyhow!("Model returned no '{}' output", self.spec.landmarks_output))?;
        let (_, coords) = landmarks
            .try_extract_tensor::<f32>()
            .map_err(|e| anyhow!("ORT extract landmarks: {e}"))?;

        let presence = if self.spec.presence_is_logit {
            sigmoid(presence)
        } else {
            presence
        };
        Ok((presence, coords.to_vec()))
    }
}

impl LandmarkDetector for OnnxLandmarkDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>> {
        let (cols, rows) = (frame.mat.cols(), frame.mat.rows());
        if cols <= 0 || rows <= 0 {
            return Ok(None);
        }

        let full = Rect::new(0, 0, cols, rows);
        let (roi, threshold) = match self.tracked_roi {
            Some(roi) => (roi, self.settings.min_tracking_confidence),
            None => (full, self.settings.min_detection_confidence),
        };

        let crop = if roi == full {
            frame.mat.try_clone()?
        } else {
            Mat::roi(&frame.mat, roi)?.try_clone()?
        };

        let (presence, coords) = self.run_model(&crop)?;
        if presence < threshold {
            self.tracked_roi = None;
            return Ok(None);
        }

        let landmarks = decode_landmarks(&coords, &self.spec, roi, cols, rows)?;
        self.tracked_roi = tracking_roi(&landmarks, cols, rows);
        Ok(Some(landmarks))
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Resize, convert BGR to RGB and normalize a crop into an NHWC tensor.
fn mat_to_input_tensor(crop_bgr: &Mat, spec: &LandmarkModelSpec) -> Result<Value> {
    let size = spec.input_size;
    let mut resized = Mat::default();
    imgproc::resize(
        crop_bgr,
        &mut resized,
        Size::new(size, size),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )
    .context("Failed to resize model input")?;

    let mut rgb = Mat::default();
    imgproc::cvt_color_def(&resized, &mut rgb, imgproc::COLOR_BGR2RGB)?;
    if !rgb.is_continuous() {
        bail!("Mat is not continuous");
    }

    let data = rgb.data_bytes()?;
    let input: Vec<f32> = data
        .iter()
        .map(|&v| {
            let unit = v as f32 / 255.0;
            match spec.input_range {
                InputRange::SignedUnit => unit * 2.0 - 1.0,
                InputRange::Unit => unit,
            }
        })
        .collect();

    let shape = vec![1usize, size as usize, size as usize, 3];
    Tensor::from_array((shape, input.into_boxed_slice()))
        .map(Value::from)
        .map_err(|e| anyhow!("ORT tensor: {e}"))
}

/// Map model-space landmark coordinates back to frame-normalized points.
fn decode_landmarks(
    coords: &[f32],
    spec: &LandmarkModelSpec,
    roi: Rect,
    frame_cols: i32,
    frame_rows: i32,
) -> Result<LandmarkSet> {
    let needed = spec.point_count * 3;
    if coords.len() < needed {
        bail!(
            "Landmark output has {} values, expected at least {}",
            coords.len(),
            needed
        );
    }

    let size = spec.input_size as f32;
    let points = coords
        .chunks_exact(3)
        .take(spec.point_count)
        .map(|c| {
            let x = roi.x as f32 + c[0] / size * roi.width as f32;
            let y = roi.y as f32 + c[1] / size * roi.height as f32;
            Point::new(x / frame_cols as f32, y / frame_rows as f32)
        })
        .collect();

    Ok(LandmarkSet::new(points))
}

/// Square pixel ROI around the landmarks, padded by 25% and clamped to the frame.
fn tracking_roi(landmarks: &LandmarkSet, frame_cols: i32, frame_rows: i32) -> Option<Rect> {
    let (min, max) = landmarks.bounds()?;
    let w = (max.x - min.x) * frame_cols as f32;
    let h = (max.y - min.y) * frame_rows as f32;
    let side = w.max(h) * 1.25;

    let cx = (min.x + max.x) / 2.0 * frame_cols as f32;
    let cy = (min.y + max.y) / 2.0 * frame_rows as f32;

    let x1 = (cx - side / 2.0).max(0.0);
    let y1 = (cy - side / 2.0).max(0.0);
    let x2 = (cx + side / 2.0).min(frame_cols as f32);
    let y2 = (cy + side / 2.0).min(frame_rows as f32);

    let (x, y) = (x1.round() as i32, y1.round() as i32);
    let width = (x2.round() as i32 - x).min(frame_cols - x);
    let height = (y2.round() as i32 - y).min(frame_rows - y);

    if width < 8 || height < 8 {
        return None;
    }
    Some(Rect::new(x, y, width, height))
}
