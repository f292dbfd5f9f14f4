// Sampling/aggregation loop shared by every analysis axis.
//
// An axis supplies the detector kind, the skip rate, an optional calibration
// window, a metric extractor and a reduction. The loop drives a FrameStream
// through CALIBRATING (optional) -> TRACKING -> DONE.

use crate::pipeline::detection::{DetectorKind, LandmarkDetector};
use crate::pipeline::reader::FrameStream;
use crate::pipeline::types::{AxisRun, Frame, LandmarkSet, Sample};
use std::time::{Duration, Instant};

pub trait MetricAxis: Sync {
    type Value: Copy + Send;
    type Output: Send;

    fn name(&self) -> &'static str;
    fn detector_kind(&self) -> DetectorKind;
    /// Analyze every Nth frame
    fn skip_rate(&self) -> usize;
    /// Wall-clock warm-up before tracking starts; `None` skips calibration.
    fn calibration_window(&self) -> Option<Duration> {
        None
    }
    fn extract(&self, landmarks: &LandmarkSet) -> Option<Self::Value>;
    fn reduce(&self, run: &AxisRun<Self::Value>) -> Self::Output;
    /// Result reported when nothing usable could be measured.
    fn no_detection(&self) -> Self::Output;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Calibrating { started: Instant, window: Duration },
    Tracking,
    Done,
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome<T> {
    Completed(AxisRun<T>),
    /// Calibration collected no sample; tracking never started.
    CalibrationFailed(AxisRun<T>),
}

/// Drive `stream` to completion, sampling every `skip_rate`-th frame.
/// A frame the detector fails on is logged and contributes no sample.
pub fn run_axis<A: MetricAxis>(
    axis: &A,
    stream: &FrameStream,
    detector: &mut dyn LandmarkDetector,
) -> RunOutcome<A::Value> {
    let skip = axis.skip_rate().max(1);
    let start = Instant::now();
    let mut run = AxisRun::default();

    let mut phase = match axis.calibration_window() {
        Some(window) => Phase::Calibrating {
            started: Instant::now(),
            window,
        },
        None => Phase::Tracking,
    };

    while phase != Phase::Done {
        phase = match phase {
            Phase::Calibrating { started, window } => {
                if started.elapsed() >= window || !stream.has_more() {
                    if run.calibration.is_empty() {
                        run.elapsed = start.elapsed();
                        return RunOutcome::CalibrationFailed(run);
                    }
                    Phase::Tracking
                } else {
                    match stream.take() {
                        Some(frame) => {
                            if let Some(sample) = observe(axis, detector, &frame, skip, &mut run) {
                                run.calibration.push(sample);
                            }
                            phase
                        }
                        None => Phase::Calibrating {
                            started,
                            window: Duration::ZERO,
                        },
                    }
                }
            }
            Phase::Tracking => {
                if !stream.has_more() {
                    Phase::Done
                } else {
                    match stream.take() {
                        Some(frame) => {
                            run.tracked_frames += 1;
                            if let Some(sample) = observe(axis, detector, &frame, skip, &mut run) {
                                run.tracking.push(sample);
                            }
                            Phase::Tracking
                        }
                        None => Phase::Done,
                    }
                }
            }
            Phase::Done => Phase::Done,
        };
    }

    run.elapsed = start.elapsed();
    RunOutcome::Completed(run)
}

/// Count the frame and, when it falls on the sampling grid, measure it.
fn observe<A: MetricAxis>(
    axis: &A,
    detector: &mut dyn LandmarkDetector,
    frame: &Frame,
    skip: usize,
    run: &mut AxisRun<A::Value>,
) -> Option<Sample<A::Value>> {
    run.frames_read += 1;
    if frame.id % skip != 0 {
        return None;
    }

    run.frames_sampled += 1;
    let landmarks = match detector.detect(frame) {
        Ok(landmarks) => landmarks?,
        Err(e) => {
            run.detect_errors += 1;
            tracing::warn!("{} detection failed on frame {}: {:#}", axis.name(), frame.id, e);
            return None;
        }
    };

    axis.extract(&landmarks).map(|value| Sample {
        frame_index: frame.id,
        value,
    })
}

/// Run `axis` over `stream`, folding every failure into the axis' degraded result.
pub fn analyze_stream<A: MetricAxis>(
    axis: &A,
    stream: &FrameStream,
    detector: &mut dyn LandmarkDetector,
) -> A::Output {
    match run_axis(axis, stream, detector) {
        RunOutcome::Completed(run) => {
            tracing::info!(
                "{} analysis finished: frames_read={}, frames_sampled={}, detect_errors={}, calibration_samples={}, tracking_samples={}, elapsed={:.2}s",
                axis.name(),
                run.frames_read,
                run.frames_sampled,
                run.detect_errors,
                run.calibration.len(),
                run.tracking.len(),
                run.elapsed.as_secs_f64()
            );
            axis.reduce(&run)
        }
        RunOutcome::CalibrationFailed(run) => {
            tracing::warn!(
                "{} calibration failed: no subject detected in {} sampled frames",
                axis.name(),
                run.frames_sampled
            );
            axis.no_detection()
        }
    }
}

/// Arithmetic mean, `None` when empty.
pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
