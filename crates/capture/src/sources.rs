//! File-backed sensing sources.
//!
//! Device capture lives outside glimpse: a screenshot tool or recorder writes
//! files, and these sources pick them up on each tick.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use glimpse_core::error::CaptureError;
use glimpse_core::sensing::{AudioSource, FrameSource, MediaPayload, TextExtractor};
use tracing::debug;

/// MIME type from a file extension.
pub fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "txt" | "md" | "log" => "text/plain",
        "webm" => "audio/webm",
        "ogg" | "opus" => "audio/ogg",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "flac" => "audio/flac",
        _ => return None,
    };
    Some(mime)
}

/// Reads the same file every tick (e.g. a screenshot that an external tool
/// keeps overwriting, or a text dump of the active window).
pub struct FileFrameSource {
    path: PathBuf,
}

impl FileFrameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FrameSource for FileFrameSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn capture_frame(&self) -> Result<Option<MediaPayload>, CaptureError> {
        let mime = mime_for(&self.path).ok_or_else(|| {
            CaptureError::InvalidInput(format!("unsupported frame file {}", self.path.display()))
        })?;

        match tokio::fs::read(&self.path).await {
            Ok(data) if data.is_empty() => Ok(None),
            Ok(data) => Ok(Some(MediaPayload::new(mime, data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(CaptureError::NoSource),
            Err(e) => Err(CaptureError::Failed(format!(
                "reading {}: {e}",
                self.path.display()
            ))),
        }
    }
}

/// Yields each audio file dropped into a spool directory exactly once,
/// oldest file name first.
pub struct SpoolAudioSource {
    dir: PathBuf,
    consumed: Mutex<HashSet<PathBuf>>,
}

impl SpoolAudioSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            consumed: Mutex::new(HashSet::new()),
        }
    }

    async fn pending(&self) -> Result<Vec<PathBuf>, CaptureError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(CaptureError::NoSource),
            Err(e) => return Err(CaptureError::Failed(e.to_string())),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CaptureError::Failed(e.to_string()))?
        {
            let path = entry.path();
            if mime_for(&path).is_some_and(|m| m.starts_with("audio/")) {
                files.push(path);
            }
        }

        let mut consumed = self.consumed.lock().unwrap_or_else(|e| e.into_inner());
        // Forget segments that have since been removed from the spool
        consumed.retain(|p| files.contains(p));
        files.retain(|p| !consumed.contains(p));
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl AudioSource for SpoolAudioSource {
    fn name(&self) -> &str {
        "spool"
    }

    async fn next_segment(&self) -> Result<Option<MediaPayload>, CaptureError> {
        for path in self.pending().await? {
            let data = tokio::fs::read(&path)
                .await
                .map_err(|e| CaptureError::Failed(format!("reading {}: {e}", path.display())))?;
            // Still being written; try again next tick
            if data.is_empty() {
                continue;
            }

            self.consumed
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(path.clone());
            debug!(path = %path.display(), bytes = data.len(), "Picked up audio segment");

            let mime = mime_for(&path).unwrap_or("application/octet-stream");
            return Ok(Some(MediaPayload::new(mime, data)));
        }
        Ok(None)
    }
}

/// Extractor for frames that already are text. Used when no vision model is
/// configured.
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    fn name(&self) -> &str {
        "plain-text"
    }

    async fn extract_text(&self, frame: &MediaPayload) -> Result<String, CaptureError> {
        if !frame.is_valid() {
            return Err(CaptureError::InvalidInput("empty frame".into()));
        }
        if !frame.is_text() {
            return Err(CaptureError::NotConfigured(format!(
                "no OCR backend for {}",
                frame.mime_type
            )));
        }
        Ok(String::from_utf8_lossy(&frame.data).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_detection() {
        assert_eq!(mime_for(Path::new("shot.PNG")), Some("image/png"));
        assert_eq!(mime_for(Path::new("a/b/seg-001.webm")), Some("audio/webm"));
        assert_eq!(mime_for(Path::new("window.txt")), Some("text/plain"));
        assert_eq!(mime_for(Path::new("README")), None);
        assert_eq!(mime_for(Path::new("archive.zip")), None);
    }

    #[tokio::test]
    async fn file_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screen.txt");
        let source = FileFrameSource::new(&path);

        assert!(matches!(source.capture_frame().await, Err(CaptureError::NoSource)));

        std::fs::write(&path, "").unwrap();
        assert_eq!(source.capture_frame().await.unwrap(), None);

        std::fs::write(&path, "vim src/lib.rs").unwrap();
        let frame = source.capture_frame().await.unwrap().unwrap();
        assert_eq!(frame.mime_type, "text/plain");
        assert_eq!(frame.data, b"vim src/lib.rs");
    }

    #[tokio::test]
    async fn unsupported_frame_file_is_invalid() {
        let source = FileFrameSource::new("/tmp/frame.bin");
        assert!(matches!(
            source.capture_frame().await,
            Err(CaptureError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn spool_yields_each_segment_once_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("002.webm"), b"second").unwrap();
        std::fs::write(dir.path().join("001.webm"), b"first").unwrap();
        std::fs::write(dir.path().join("003.webm"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"not audio").unwrap();

        let source = SpoolAudioSource::new(dir.path());
        assert_eq!(source.next_segment().await.unwrap().unwrap().data, b"first");
        assert_eq!(source.next_segment().await.unwrap().unwrap().data, b"second");
        assert_eq!(source.next_segment().await.unwrap(), None);

        // The partially written file is picked up once it has content
        std::fs::write(dir.path().join("003.webm"), b"third").unwrap();
        let segment = source.next_segment().await.unwrap().unwrap();
        assert_eq!(segment.data, b"third");
        assert_eq!(segment.mime_type, "audio/webm");
    }

    #[tokio::test]
    async fn removed_segments_are_forgotten() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("001.wav"), b"one").unwrap();
        std::fs::write(dir.path().join("002.wav"), b"two").unwrap();

        let source = SpoolAudioSource::new(dir.path());
        source.next_segment().await.unwrap().unwrap();
        source.next_segment().await.unwrap().unwrap();
        assert_eq!(source.consumed.lock().unwrap().len(), 2);

        std::fs::remove_file(dir.path().join("001.wav")).unwrap();
        assert_eq!(source.next_segment().await.unwrap(), None);
        assert_eq!(source.consumed.lock().unwrap().len(), 1);

        // A segment re-recorded under a removed name counts as new
        std::fs::write(dir.path().join("001.wav"), b"again").unwrap();
        assert_eq!(source.next_segment().await.unwrap().unwrap().data, b"again");
    }

    #[tokio::test]
    async fn missing_spool_is_no_source() {
        let source = SpoolAudioSource::new("/definitely/not/here");
        assert!(matches!(source.next_segment().await, Err(CaptureError::NoSource)));
    }

    #[tokio::test]
    async fn plain_text_extractor() {
        let text = MediaPayload::new("text/plain", b"  hello \n".to_vec());
        assert_eq!(PlainTextExtractor.extract_text(&text).await.unwrap(), "hello");

        let image = MediaPayload::new("image/png", vec![1]);
        assert!(matches!(
            PlainTextExtractor.extract_text(&image).await,
            Err(CaptureError::NotConfigured(_))
        ));
    }
}
