/*!
 * Streaming content digests for probe-before-transfer deduplication
 */

use md5::{Digest, Md5};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Instant;

use crate::core::progress::{ProgressPublisher, ProgressTracker};
use crate::error::Result;

/// Fixed block size bounding memory use regardless of source size
pub const DIGEST_BLOCK_SIZE: usize = 64 * 1024;

/// Digest a byte source to completion, reporting each block read.
///
/// Never returns a partial digest: any read error aborts the whole
/// computation.
pub fn stream_digest<R: Read>(mut reader: R, mut tracker: ProgressTracker) -> Result<String> {
    let mut hasher = Md5::new();
    let mut buffer = [0u8; DIGEST_BLOCK_SIZE];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        tracker.record(n);
    }

    tracker.finish();
    Ok(hex::encode(hasher.finalize()))
}

/// Digest a file, with progress reported against its on-disk size
pub fn file_digest(path: &Path, publisher: &ProgressPublisher) -> Result<String> {
    let file = File::open(path)?;
    let total_bytes = file.metadata()?.len();
    let tracker = ProgressTracker::new(publisher.clone(), path.to_path_buf(), total_bytes);

    let start = Instant::now();
    let digest = stream_digest(BufReader::new(file), tracker)?;
    tracing::debug!(
        path = %path.display(),
        digest = %digest,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "computed content digest"
    );
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::progress::ProgressEvent;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn digest_bytes(data: &[u8]) -> String {
        let tracker = ProgressTracker::new(
            ProgressPublisher::noop(),
            std::path::PathBuf::from("mem"),
            data.len() as u64,
        );
        stream_digest(data, tracker).unwrap()
    }

    #[test]
    fn test_empty_input_digest() {
        assert_eq!(digest_bytes(b""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            digest_bytes(b"hello world"),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
    }

    #[test]
    fn test_digest_is_deterministic() {
        let data = b"the same bytes every time";
        assert_eq!(digest_bytes(data), digest_bytes(data));
    }

    #[test]
    fn test_file_digest() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"hello world").unwrap();
        temp.flush().unwrap();

        let digest = file_digest(temp.path(), &ProgressPublisher::noop()).unwrap();
        assert_eq!(digest, "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn test_file_digest_missing_file() {
        let result = file_digest(
            Path::new("/definitely/not/here.bin"),
            &ProgressPublisher::noop(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_digest_reports_progress() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(&vec![7u8; 1024]).unwrap();
        temp.flush().unwrap();

        let (publisher, subscriber) = ProgressPublisher::unbounded();
        file_digest(temp.path(), &publisher).unwrap();
        drop(publisher);

        let events: Vec<_> = subscriber.iter().collect();
        assert!(matches!(events.first(), Some(ProgressEvent::ReadStart { .. })));
        assert!(matches!(
            events.last(),
            Some(ProgressEvent::ReadComplete { .. })
        ));
    }
}
