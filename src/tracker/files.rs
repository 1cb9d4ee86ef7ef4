//! Live upload handles and their persisted metadata projection.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Extension to MIME type for the formats the backend accepts.
const SUPPORTED_TYPES: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("pdf", "application/pdf"),
    ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
    ("doc", "application/msword"),
    ("rtf", "application/rtf"),
    ("mp3", "audio/mpeg"),
    ("m4a", "audio/mp4"),
    ("wav", "audio/wav"),
    ("aac", "audio/aac"),
    ("ogg", "audio/ogg"),
    ("mp4", "video/mp4"),
    ("mpeg", "video/mpeg"),
    ("mov", "video/quicktime"),
];

/// Descriptive metadata for a selected file. This is the only part of a
/// selection that is persisted; the handle itself never is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    /// Epoch milliseconds of the file's last modification.
    pub last_modified: i64,
}

/// A file selected for a documents-mode generation.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub mime_type: String,
    pub last_modified: i64,
}

impl UploadedFile {
    /// Build a handle from a path on disk.
    pub fn from_path(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let meta = std::fs::metadata(&path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let last_modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .and_then(|d| i64::try_from(d.as_millis()).ok())
            .unwrap_or_default();
        let mime_type = mime_for_path(&path)
            .unwrap_or("application/octet-stream")
            .to_string();
        Ok(Self {
            name,
            path,
            size: meta.len(),
            mime_type,
            last_modified,
        })
    }

    /// The metadata-only projection stored in the persisted record.
    #[must_use]
    pub fn metadata(&self) -> FileMetadata {
        FileMetadata {
            name: self.name.clone(),
            size: self.size,
            mime_type: self.mime_type.clone(),
            last_modified: self.last_modified,
        }
    }
}

/// Whether the backend accepts this file, judged by extension.
#[must_use]
pub fn is_supported_file(path: &Path) -> bool {
    mime_for_path(path).is_some()
}

/// Extensions the backend accepts, for error messages.
#[must_use]
pub fn supported_extensions() -> Vec<&'static str> {
    SUPPORTED_TYPES.iter().map(|(ext, _)| *ext).collect()
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    SUPPORTED_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_file(Path::new("notes.txt")));
        assert!(is_supported_file(Path::new("report.PDF")));
        assert!(is_supported_file(Path::new("episode.mp3")));
        assert!(!is_supported_file(Path::new("archive.zip")));
        assert!(!is_supported_file(Path::new("no_extension")));
    }

    #[test]
    fn test_from_path_derives_mime_and_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.pdf");
        std::fs::write(&path, vec![0u8; 1000]).unwrap();

        let file = UploadedFile::from_path(&path).unwrap();
        assert_eq!(file.name, "a.pdf");
        assert_eq!(file.size, 1000);
        assert_eq!(file.mime_type, "application/pdf");
        assert!(file.last_modified > 0);
    }

    #[test]
    fn test_unknown_extension_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        std::fs::write(&path, b"data").unwrap();

        let file = UploadedFile::from_path(&path).unwrap();
        assert_eq!(file.mime_type, "application/octet-stream");
    }

    #[test]
    fn test_metadata_projection() {
        let file = UploadedFile {
            name: "a.pdf".to_string(),
            path: PathBuf::from("/tmp/a.pdf"),
            size: 1000,
            mime_type: "application/pdf".to_string(),
            last_modified: 123,
        };
        let meta = file.metadata();
        assert_eq!(meta.name, "a.pdf");
        assert_eq!(meta.size, 1000);
        assert_eq!(meta.mime_type, "application/pdf");
        assert_eq!(meta.last_modified, 123);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(UploadedFile::from_path("/definitely/not/here.txt").is_err());
    }
}
