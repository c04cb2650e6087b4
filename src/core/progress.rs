/*!
 * Progress event publisher for byte-stream reads
 *
 * Digesting and uploading both stream a file in fixed-size blocks; each block
 * read may be reported here. Events carry percent complete and throughput so
 * the terminal collaborator can render them without touching engine state.
 * The throughput clock is lazy: it starts on the first read of each tracked
 * stream, and every tracked stream gets a fresh tracker, so a re-digested or
 * re-uploaded file restarts its sequence from zero.
 */

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;

/// Progress event types
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// First block of a stream was read
    ReadStart { source: PathBuf, total_bytes: u64 },

    /// Integer percent-complete changed
    ReadProgress {
        source: PathBuf,
        bytes_read: u64,
        total_bytes: u64,
        percent: u8,
        throughput_bps: f64,
    },

    /// Stream fully consumed
    ReadComplete {
        source: PathBuf,
        total_bytes: u64,
        duration_ms: u64,
    },
}

/// Progress publisher - sends events to subscribers
#[derive(Debug, Clone)]
pub struct ProgressPublisher {
    sender: Option<Sender<ProgressEvent>>,
}

impl ProgressPublisher {
    /// Create a new publisher with bounded channel
    pub fn new(buffer_size: usize) -> (Self, ProgressSubscriber) {
        let (tx, rx) = bounded(buffer_size);
        (
            ProgressPublisher { sender: Some(tx) },
            ProgressSubscriber { receiver: rx },
        )
    }

    /// Create a new publisher with unbounded channel
    pub fn unbounded() -> (Self, ProgressSubscriber) {
        let (tx, rx) = unbounded();
        (
            ProgressPublisher { sender: Some(tx) },
            ProgressSubscriber { receiver: rx },
        )
    }

    /// Create a no-op publisher (for when progress tracking is disabled)
    pub fn noop() -> Self {
        ProgressPublisher { sender: None }
    }

    /// Publish an event
    pub fn publish(&self, event: ProgressEvent) {
        if let Some(ref tx) = self.sender {
            let _ = tx.send(event); // Ignore send errors (subscriber may have dropped)
        }
    }
}

/// Progress subscriber - receives events
pub struct ProgressSubscriber {
    receiver: Receiver<ProgressEvent>,
}

impl ProgressSubscriber {
    /// Try to receive an event (non-blocking)
    pub fn try_recv(&self) -> Option<ProgressEvent> {
        self.receiver.try_recv().ok()
    }

    /// Receive an event (blocking)
    pub fn recv(&self) -> Option<ProgressEvent> {
        self.receiver.recv().ok()
    }

    /// Iterate over events until every publisher clone is dropped
    pub fn iter(&self) -> impl Iterator<Item = ProgressEvent> + '_ {
        self.receiver.iter()
    }
}

/// Per-stream tracker that turns raw block reads into gated progress events.
///
/// An event is published only when the integer percentage changes, so a large
/// stream produces at most ~100 progress events regardless of block count.
pub struct ProgressTracker {
    publisher: ProgressPublisher,
    source: PathBuf,
    total_bytes: u64,
    started: Option<Instant>,
    bytes_read: u64,
    last_percent: u8,
}

impl ProgressTracker {
    pub fn new(publisher: ProgressPublisher, source: PathBuf, total_bytes: u64) -> Self {
        Self {
            publisher,
            source,
            total_bytes,
            started: None,
            bytes_read: 0,
            last_percent: 0,
        }
    }

    /// Record one block read of `n` bytes
    pub fn record(&mut self, n: usize) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
            self.publisher.publish(ProgressEvent::ReadStart {
                source: self.source.clone(),
                total_bytes: self.total_bytes,
            });
        }

        self.bytes_read += n as u64;
        let percent = self.percent();
        if percent != self.last_percent {
            self.last_percent = percent;
            self.publisher.publish(ProgressEvent::ReadProgress {
                source: self.source.clone(),
                bytes_read: self.bytes_read,
                total_bytes: self.total_bytes,
                percent,
                throughput_bps: self.throughput(),
            });
        }
    }

    /// Publish the completion event for this stream
    pub fn finish(&mut self) {
        let duration_ms = self
            .started
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        self.publisher.publish(ProgressEvent::ReadComplete {
            source: self.source.clone(),
            total_bytes: self.total_bytes,
            duration_ms,
        });
    }

    fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        ((self.bytes_read * 100) / self.total_bytes).min(100) as u8
    }

    fn throughput(&self) -> f64 {
        let elapsed = self
            .started
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        if elapsed > 0.0 {
            self.bytes_read as f64 / elapsed
        } else {
            0.0
        }
    }
}

/// Reader adapter that reports every block read to a tracker.
///
/// Used as an upload request body, so the same gated events flow whether the
/// stream is being digested or sent over the wire. The completion event fires
/// once at end of stream.
pub struct ProgressReader<R: Read> {
    inner: R,
    tracker: ProgressTracker,
    finished: bool,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(inner: R, tracker: ProgressTracker) -> Self {
        Self {
            inner,
            tracker,
            finished: false,
        }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 {
            if !self.finished {
                self.finished = true;
                self.tracker.finish();
            }
        } else {
            self.tracker.record(n);
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_publisher() {
        let publisher = ProgressPublisher::noop();
        // Should not panic
        publisher.publish(ProgressEvent::ReadStart {
            source: PathBuf::from("/data/file.bin"),
            total_bytes: 100,
        });
    }

    #[test]
    fn test_tracker_event_sequence() {
        let (publisher, subscriber) = ProgressPublisher::unbounded();
        let mut tracker =
            ProgressTracker::new(publisher, PathBuf::from("/data/file.bin"), 100);

        tracker.record(50);
        tracker.record(50);
        tracker.finish();

        let events: Vec<_> = std::iter::from_fn(|| subscriber.try_recv()).collect();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], ProgressEvent::ReadStart { .. }));
        assert!(matches!(
            events[1],
            ProgressEvent::ReadProgress { percent: 50, .. }
        ));
        assert!(matches!(
            events[2],
            ProgressEvent::ReadProgress { percent: 100, .. }
        ));
        assert!(matches!(events[3], ProgressEvent::ReadComplete { .. }));
    }

    #[test]
    fn test_progress_gated_on_percent_change() {
        let (publisher, subscriber) = ProgressPublisher::unbounded();
        let mut tracker =
            ProgressTracker::new(publisher, PathBuf::from("/data/big.bin"), 1_000_000);

        // 100 tiny reads stay below 1 percent
        for _ in 0..100 {
            tracker.record(10);
        }

        let events: Vec<_> = std::iter::from_fn(|| subscriber.try_recv()).collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ProgressEvent::ReadStart { .. }));
    }

    #[test]
    fn test_zero_length_stream_is_complete() {
        let (publisher, subscriber) = ProgressPublisher::unbounded();
        let mut tracker = ProgressTracker::new(publisher, PathBuf::from("/data/empty"), 0);
        tracker.finish();

        let events: Vec<_> = std::iter::from_fn(|| subscriber.try_recv()).collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            ProgressEvent::ReadComplete { total_bytes: 0, .. }
        ));
    }

    #[test]
    fn test_progress_reader_reports_blocks() {
        let (publisher, subscriber) = ProgressPublisher::unbounded();
        let tracker = ProgressTracker::new(publisher, PathBuf::from("/data/file.bin"), 10);
        let mut reader = ProgressReader::new(&b"0123456789"[..], tracker);

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out.len(), 10);

        let events: Vec<_> = std::iter::from_fn(|| subscriber.try_recv()).collect();
        assert!(matches!(events[0], ProgressEvent::ReadStart { .. }));
        assert!(matches!(
            events.last().unwrap(),
            ProgressEvent::ReadComplete { .. }
        ));
    }
}
