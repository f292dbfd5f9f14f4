pub mod opencv_reader;

use anyhow::Result;
use opencv::core::Mat;
use thiserror::Error;

/// The decoder could not open the requested path.
#[derive(Debug, Error)]
#[error("cannot open video source {path}: {reason}")]
pub struct SourceUnavailable {
    pub path: String,
    pub reason: String,
}

pub trait VideoReader: Send {
    fn frame_count(&self) -> Result<usize>;
    fn source_fps(&self) -> Result<f64>;
    /// Next frame in presentation order, `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Mat>>;
}
