// Reader worker: decodes frames on a dedicated thread and hands them to the
// analysis loop through a bounded FIFO channel.

use crate::pipeline::types::Frame;
use crate::video::VideoReader;
use anyhow::{Context, Result};
use crossbeam::channel::{self, Receiver, Sender};
use opencv::core::{Mat, Size};
use opencv::imgproc;
use opencv::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Flags shared between a reader worker and its consumer.
#[derive(Debug, Default)]
pub struct ReaderControl {
    /// Set by the worker once it will enqueue nothing more
    pub stopped: AtomicBool,
    /// Set by the consumer to ask the worker to exit early
    pub shutdown: AtomicBool,
}

/// Marks the stream stopped however the worker exits, panics included.
struct StoppedGuard<'a>(&'a AtomicBool);

impl Drop for StoppedGuard<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Reads frames until end of stream or a decode failure, resizing each one to
/// `process_width` before it is queued. Blocks while the queue is full.
/// Returns the number of frames enqueued.
pub fn read_worker(
    mut reader: Box<dyn VideoReader>,
    tx: Sender<Frame>,
    control: Arc<ReaderControl>,
    process_width: i32,
) -> Result<usize> {
    let _stopped = StoppedGuard(&control.stopped);
    let mut id = 0usize;

    loop {
        if control.shutdown.load(Ordering::Relaxed) {
            break;
        }

        let mat = match reader.next_frame() {
            Ok(Some(mat)) => mat,
            Ok(None) => break,
            Err(e) => {
                // Mid-stream decode errors end the stream like EOF does
                tracing::debug!("Reader worker: decode failed at frame {}: {}", id, e);
                break;
            }
        };

        let mat = resize_to_width(mat, process_width)?;
        if tx.send(Frame { id, mat }).is_err() {
            break; // Receiver closed
        }
        id += 1;
    }

    // Release the decoder before signalling completion
    drop(reader);
    Ok(id)
}

/// Scale a frame to `width` pixels wide, preserving aspect ratio.
pub fn resize_to_width(mat: Mat, width: i32) -> Result<Mat> {
    let (cols, rows) = (mat.cols(), mat.rows());
    if width <= 0 || cols <= 0 || cols == width {
        return Ok(mat);
    }

    let height = ((rows as f64 * width as f64 / cols as f64).round() as i32).max(1);
    let mut resized = Mat::default();
    imgproc::resize(
        &mat,
        &mut resized,
        Size::new(width, height),
        0.0,
        0.0,
        imgproc::INTER_AREA,
    )
    .context("Failed to resize frame")?;
    Ok(resized)
}

/// Consumer side of the bounded frame queue.
pub struct FrameQueue {
    rx: Receiver<Frame>,
    control: Arc<ReaderControl>,
}

impl FrameQueue {
    /// True while frames are buffered or the producer may still send more.
    pub fn has_more(&self) -> bool {
        if !self.rx.is_empty() {
            return true;
        }
        if !self.control.stopped.load(Ordering::Acquire) {
            return true;
        }
        // The producer may have queued its last frames between the two loads.
        !self.rx.is_empty()
    }

    /// Next frame in FIFO order. Blocks until one is available; `None` once the
    /// producer has finished and the queue is drained.
    pub fn take(&self) -> Option<Frame> {
        self.rx.recv().ok()
    }
}

/// A running reader worker plus the queue it feeds. Dropping the stream stops
/// the worker and waits for it, so the decoder is always released.
pub struct FrameStream {
    queue: FrameQueue,
    worker: Option<JoinHandle<()>>,
}

impl FrameStream {
    pub fn spawn(
        reader: Box<dyn VideoReader>,
        capacity: usize,
        process_width: i32,
        label: &str,
    ) -> Result<Self> {
        let (tx, rx) = channel::bounded::<Frame>(capacity.max(1));
        let control = Arc::new(ReaderControl::default());

        let total_frames = reader.frame_count().unwrap_or(0);
        let source_fps = reader.source_fps().unwrap_or(0.0);

        let worker_control = control.clone();
        let worker_label = label.to_string();
        let worker = thread::Builder::new()
            .name(format!("reader-{}", label))
            .spawn(move || {
                tracing::info!(
                    "Spawning {} reader worker ({} frames @ {:.1} fps)",
                    worker_label,
                    total_frames,
                    source_fps
                );
                match read_worker(reader, tx, worker_control, process_width) {
                    Ok(frames) => tracing::info!(
                        "{} reader worker finished gracefully after {} frames",
                        worker_label,
                        frames
                    ),
                    Err(e) => tracing::error!("{} reader worker failed: {}", worker_label, e),
                }
            })
            .context("Failed to spawn reader worker")?;

        Ok(Self {
            queue: FrameQueue { rx, control },
            worker: Some(worker),
        })
    }

    pub fn has_more(&self) -> bool {
        self.queue.has_more()
    }

    pub fn take(&self) -> Option<Frame> {
        self.queue.take()
    }
}

impl Drop for FrameStream {
    fn drop(&mut self) {
        self.queue.control.shutdown.store(true, Ordering::Relaxed);
        // Disconnect so a producer blocked on a full queue wakes up
        drop(std::mem::replace(&mut self.queue.rx, channel::never()));
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Reader worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::SyntheticReader;

    #[test]
    fn test_frames_arrive_in_order_and_resized() {
        let reader = SyntheticReader::new(40, 640, 480);
        let stream = FrameStream::spawn(Box::new(reader), 4, 240, "test").unwrap();

        let mut ids = Vec::new();
        while stream.has_more() {
            let Some(frame) = stream.take() else { break };
            assert_eq!(frame.mat.cols(), 240);
            assert_eq!(frame.mat.rows(), 180);
            ids.push(frame.id);
        }

        assert_eq!(ids, (0..40).collect::<Vec<_>>());
        assert!(!stream.has_more());
        assert!(stream.take().is_none());
    }

    #[test]
    fn test_decode_error_ends_stream() {
        let reader = SyntheticReader::new(30, 320, 240).failing_at(12);
        let stream = FrameStream::spawn(Box::new(reader), 128, 240, "test").unwrap();

        let mut count = 0;
        while stream.has_more() {
            if stream.take().is_none() {
                break;
            }
            count += 1;
        }
        assert_eq!(count, 12);
    }

    #[test]
    fn test_early_drop_releases_blocked_producer() {
        let reader = SyntheticReader::new(10_000, 64, 48);
        let released = reader.released_flag();
        let stream = FrameStream::spawn(Box::new(reader), 2, 64, "test").unwrap();

        let first = stream.take().unwrap();
        assert_eq!(first.id, 0);
        drop(stream);

        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_resize_keeps_matching_width() {
        let mat = crate::pipeline::testing::blank_mat(240, 100);
        let out = resize_to_width(mat, 240).unwrap();
        assert_eq!((out.cols(), out.rows()), (240, 100));
    }
}
