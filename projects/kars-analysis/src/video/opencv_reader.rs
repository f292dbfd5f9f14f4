use super::{SourceUnavailable, VideoReader};
use anyhow::Result;
use opencv::{
    prelude::*,
    videoio::{VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT},
};
use std::path::Path;

pub struct OpencvReader {
    capture: VideoCapture,
    source_fps: f64,
    total_frames: usize,
}

impl OpencvReader {
    pub fn open(path: &Path) -> Result<Self, SourceUnavailable> {
        let path_str = path.to_string_lossy().to_string();
        let unavailable = |reason: String| SourceUnavailable {
            path: path_str.clone(),
            reason,
        };

        if !path.exists() {
            return Err(unavailable("file not found".to_string()));
        }

        let capture =
            VideoCapture::from_file(&path_str, CAP_ANY).map_err(|e| unavailable(e.to_string()))?;
        if !capture.is_opened().map_err(|e| unavailable(e.to_string()))? {
            return Err(unavailable("decoder refused the container".to_string()));
        }

        let mut fps = capture.get(CAP_PROP_FPS).unwrap_or(0.0);
        if fps <= 0.0 {
            tracing::warn!("OpencvReader: Failed to get FPS from metadata, falling back to 30.0");
            fps = 30.0;
        }
        let raw_count = capture.get(CAP_PROP_FRAME_COUNT).unwrap_or(0.0).max(0.0) as usize;

        tracing::info!(
            "OpencvReader: opened {}, duration={:.2}s, fps={:.2}, stream_frames={}",
            path_str,
            raw_count as f64 / fps,
            fps,
            raw_count
        );

        Ok(Self {
            capture,
            source_fps: fps,
            total_frames: raw_count,
        })
    }
}

impl VideoReader for OpencvReader {
    fn frame_count(&self) -> Result<usize> {
        Ok(self.total_frames)
    }

    fn source_fps(&self) -> Result<f64> {
        Ok(self.source_fps)
    }

    fn next_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        let success = self.capture.read(&mut frame)?;
        if !success || frame.empty() {
            return Ok(None);
        }

        Ok(Some(frame))
    }
}

impl Drop for OpencvReader {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            tracing::warn!("OpencvReader: failed to release capture: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_source_unavailable() {
        let err = OpencvReader::open(Path::new("/definitely/not/here.mp4"))
            .err()
            .expect("open should fail");
        assert_eq!(err.path, "/definitely/not/here.mp4");
        assert!(err.to_string().contains("cannot open video source"));
    }
}
