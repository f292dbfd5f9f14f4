// Pipeline orchestrator: fetches the media for a request, then runs the
// requested axes concurrently, each over its own decoder, queue and detector.

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::media;
use crate::pipeline::aggregate::{analyze_stream, MetricAxis};
use crate::pipeline::detection::{self, DetectorKind, LandmarkDetector};
use crate::pipeline::hand::HandAxis;
use crate::pipeline::mood::MoodAxis;
use crate::pipeline::reader::FrameStream;
use crate::pipeline::types::{AnalysisMode, AnalysisReport, AnalysisRequest};
use crate::video::opencv_reader::OpencvReader;
use crate::video::{SourceUnavailable, VideoReader};
use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::thread;

/// Where frame sources and landmark detectors come from.
pub trait MediaBackend: Send + Sync {
    fn open_source(&self, path: &Path) -> Result<Box<dyn VideoReader>, SourceUnavailable>;
    fn open_detector(
        &self,
        kind: DetectorKind,
        config: &AnalysisConfig,
    ) -> Result<Box<dyn LandmarkDetector>>;
}

/// OpenCV decoding plus ONNX Runtime landmark models.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpencvOnnxBackend;

impl MediaBackend for OpencvOnnxBackend {
    fn open_source(&self, path: &Path) -> Result<Box<dyn VideoReader>, SourceUnavailable> {
        Ok(Box::new(OpencvReader::open(path)?))
    }

    fn open_detector(
        &self,
        kind: DetectorKind,
        config: &AnalysisConfig,
    ) -> Result<Box<dyn LandmarkDetector>> {
        detection::open_detector(kind, config)
    }
}

/// Run one axis end to end. Every failure degrades into the axis' "No Detection" result.
fn process_axis<A: MetricAxis>(
    axis: &A,
    path: &Path,
    config: &AnalysisConfig,
    backend: &dyn MediaBackend,
) -> A::Output {
    let mut detector = match backend.open_detector(axis.detector_kind(), config) {
        Ok(detector) => detector,
        Err(e) => {
            tracing::error!("{} detector unavailable: {:#}", axis.name(), e);
            return axis.no_detection();
        }
    };

    let reader = match backend.open_source(path) {
        Ok(reader) => reader,
        Err(e) => {
            tracing::warn!("{}: {}", axis.name(), e);
            return axis.no_detection();
        }
    };

    let stream = match FrameStream::spawn(reader, config.queue_capacity, config.process_width, axis.name()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!("{} reader could not start: {:#}", axis.name(), e);
            return axis.no_detection();
        }
    };

    analyze_stream(axis, &stream, detector.as_mut())
}

/// Analyze the video at `path` for the axes `mode` asks for. Mood and hand run
/// on separate threads and are joined before the report is assembled.
pub fn analyze_video(
    path: &Path,
    mode: AnalysisMode,
    config: &AnalysisConfig,
    backend: &dyn MediaBackend,
) -> Result<AnalysisReport> {
    let mood_axis = MoodAxis::from_config(config);
    let hand_axis = HandAxis::from_config(config);

    thread::scope(|scope| -> Result<AnalysisReport> {
        let mood = if mode.wants_mood() {
            Some(
                thread::Builder::new()
                    .name("analysis-mood".into())
                    .spawn_scoped(scope, || process_axis(&mood_axis, path, config, backend))
                    .context("Failed to spawn mood worker")?,
            )
        } else {
            None
        };

        let hand = if mode.wants_hand() {
            Some(
                thread::Builder::new()
                    .name("analysis-hand".into())
                    .spawn_scoped(scope, || process_axis(&hand_axis, path, config, backend))
                    .context("Failed to spawn hand worker")?,
            )
        } else {
            None
        };

        let mood = mood
            .map(|worker| worker.join().map_err(|_| anyhow!("mood worker panicked")))
            .transpose()?;
        let hand = hand
            .map(|worker| worker.join().map_err(|_| anyhow!("hand worker panicked")))
            .transpose()?;

        Ok(AnalysisReport { mood, hand })
    })
}

/// Everything a request needs: tunables, the media backend and an HTTP client.
#[derive(Clone)]
pub struct Analyzer {
    config: Arc<AnalysisConfig>,
    backend: Arc<dyn MediaBackend>,
    client: reqwest::Client,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig, backend: Arc<dyn MediaBackend>) -> Result<Self> {
        Ok(Self {
            config: Arc::new(config),
            backend,
            client: media::http_client()?,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Validate the request, fetch the video into a private temp directory and
    /// analyze it. The directory and everything in it is removed on return.
    pub async fn analyze(&self, request: AnalysisRequest) -> AnalysisResult<AnalysisReport> {
        let url = request
            .video_url
            .filter(|url| !url.is_empty())
            .ok_or(AnalysisError::MissingInput)?;
        let mode = AnalysisMode::parse(request.mode.as_deref());
        tracing::info!("Analyzing {} (mode {:?})", url, mode);

        let workdir = tempfile::Builder::new()
            .prefix("kars-")
            .tempdir()
            .map_err(|e| AnalysisError::analysis(format!("Failed to create temp dir: {}", e)))?;

        let video = media::fetch_video(
            &self.client,
            &url,
            workdir.path(),
            self.config.transcode_timeout(),
        )
        .await?;

        let config = self.config.clone();
        let backend = self.backend.clone();
        let report = tokio::task::spawn_blocking(move || {
            analyze_video(&video, mode, &config, backend.as_ref())
        })
        .await
        .map_err(|e| AnalysisError::analysis(e.to_string()))?
        .map_err(|e| AnalysisError::analysis(format!("{:#}", e)))?;

        if let Err(e) = workdir.close() {
            tracing::debug!("Temp dir cleanup failed: {}", e);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::testing::serve_clip;
    use crate::pipeline::testing::{face_with_ratios, hand_at, SyntheticBackend};
    use crate::pipeline::types::{HandReport, MoodReport};

    fn smiling(_: &crate::pipeline::types::Frame) -> Option<crate::pipeline::types::LandmarkSet> {
        Some(face_with_ratios(0.7, 0.8))
    }

    fn still_hand(_: &crate::pipeline::types::Frame) -> Option<crate::pipeline::types::LandmarkSet> {
        Some(hand_at(0.5))
    }

    fn clip() -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not really a video").unwrap();
        file
    }

    fn no_detection() -> MoodReport {
        MoodAxis::from_config(&AnalysisConfig::default()).no_detection()
    }

    #[test]
    fn test_concurrent_matches_sequential() {
        let backend = SyntheticBackend {
            face: smiling,
            hand: still_hand,
            ..SyntheticBackend::new(80)
        };
        let config = AnalysisConfig::default();
        let file = clip();

        let both = analyze_video(file.path(), AnalysisMode::Both, &config, &backend).unwrap();
        let mood = analyze_video(file.path(), AnalysisMode::Mood, &config, &backend).unwrap();
        let hand = analyze_video(file.path(), AnalysisMode::Hand, &config, &backend).unwrap();

        assert_eq!(both.mood, mood.mood);
        assert_eq!(both.hand, hand.hand);
        assert!(mood.hand.is_none());
        assert!(hand.mood.is_none());
        assert_eq!(both.mood.unwrap().mood, "OVERALL: Positive");
    }

    #[test]
    fn test_unreadable_source_degrades_both_axes() {
        let backend = SyntheticBackend::new(10);
        let report = analyze_video(
            Path::new("/no/such/video.mp4"),
            AnalysisMode::Both,
            &AnalysisConfig::default(),
            &backend,
        )
        .unwrap();

        assert_eq!(report.mood, Some(no_detection()));
        assert_eq!(report.hand, Some(HandReport { hand: 0.0 }));
    }

    #[test]
    fn test_broken_detector_only_degrades_its_axis() {
        let backend = SyntheticBackend {
            face: smiling,
            broken_detector: Some(DetectorKind::Hand),
            ..SyntheticBackend::new(30)
        };
        let file = clip();
        let report =
            analyze_video(file.path(), AnalysisMode::Both, &AnalysisConfig::default(), &backend).unwrap();

        assert_eq!(report.hand, Some(HandReport { hand: 0.0 }));
        assert_eq!(report.mood.unwrap().expression, "Smiling");
    }

    fn hand_raised_halfway(
        frame: &crate::pipeline::types::Frame,
    ) -> Option<crate::pipeline::types::LandmarkSet> {
        Some(hand_at(if frame.id < 50 { 0.5 } else { 0.8 }))
    }

    #[test]
    fn test_hand_calibrates_on_paced_video() {
        // 5ms per frame against a 100ms window: calibration ends around frame 20
        let backend = SyntheticBackend {
            hand: hand_raised_halfway,
            frame_delay: std::time::Duration::from_millis(5),
            ..SyntheticBackend::new(100)
        };
        let config = AnalysisConfig {
            calibration_secs: 0.1,
            ..AnalysisConfig::default()
        };
        let file = clip();

        let report = analyze_video(file.path(), AnalysisMode::Hand, &config, &backend).unwrap();
        assert!(report.mood.is_none());
        // Five moving samples over the 51..=99 frames read after calibration
        let hand = report.hand.unwrap().hand;
        assert!(hand > 5.0 && hand < 10.0, "hand = {}", hand);
    }

    fn analyzer(backend: SyntheticBackend) -> Analyzer {
        Analyzer::new(AnalysisConfig::default(), Arc::new(backend)).unwrap()
    }

    #[tokio::test]
    async fn test_missing_url_is_rejected() {
        let analyzer = analyzer(SyntheticBackend::new(10));
        let err = analyzer.analyze(AnalysisRequest::default()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::MissingInput));

        let err = analyzer
            .analyze(AnalysisRequest {
                video_url: Some(String::new()),
                mode: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MissingInput));
    }

    #[tokio::test]
    async fn test_downloaded_video_without_subjects() {
        let base = serve_clip(vec![0u8; 2048]).await;
        let analyzer = analyzer(SyntheticBackend::new(50));

        let report = analyzer
            .analyze(AnalysisRequest {
                video_url: Some(format!("{}/clip.mp4", base)),
                mode: Some("both".into()),
            })
            .await
            .unwrap();

        assert_eq!(report.mood, Some(no_detection()));
        assert_eq!(report.hand, Some(HandReport { hand: 0.0 }));
    }

    #[tokio::test]
    async fn test_unknown_host_fails_with_details() {
        let analyzer = analyzer(SyntheticBackend::new(10));
        let err = analyzer
            .analyze(AnalysisRequest {
                video_url: Some("http://nonexistent.invalid/video.mp4".into()),
                mode: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::DownloadFailed { .. }));
        assert!(err.details().is_some_and(|d| !d.is_empty()));
    }
}
