//! User-supplied media files.

use super::source::CaptureError;
use std::path::Path;

/// Broad class of an uploaded file, decided by its MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// `image/*`
    Image,
    /// `video/*`
    Video,
}

impl MediaKind {
    /// Classifies a MIME type. Anything that is not `image/*` or
    /// `video/*` is rejected.
    pub fn sniff(mime_type: &str) -> Option<Self> {
        let top = mime_type.split('/').next()?.trim().to_ascii_lowercase();
        match top.as_str() {
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// An uploaded file held in memory.
#[derive(Clone)]
pub struct Upload {
    /// Display name (usually the file name).
    pub name: String,
    /// Declared MIME type.
    pub mime_type: String,
    /// Raw file contents.
    pub data: Vec<u8>,
}

impl Upload {
    /// Creates an upload from raw parts.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Reads a file and infers its MIME type from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let mime_type = mime_for_path(path).ok_or_else(|| {
            CaptureError::UnsupportedMedia(format!("unrecognised file type: {}", path.display()))
        })?;
        let data = std::fs::read(path)
            .map_err(|e| CaptureError::Decode(format!("{}: {}", path.display(), e)))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, mime_type, data))
    }

    /// Reads a file as a video upload regardless of its extension.
    ///
    /// Animated images (GIF, APNG, WebP) are valid video sources.
    pub fn video_from_path(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let mut upload = Self::from_path(path)?;
        if MediaKind::sniff(&upload.mime_type) == Some(MediaKind::Image) {
            upload.mime_type = format!("video/{}", subtype(&upload.mime_type));
        }
        Ok(upload)
    }

    /// Classifies the upload.
    pub fn kind(&self) -> Result<MediaKind, CaptureError> {
        MediaKind::sniff(&self.mime_type)
            .ok_or_else(|| CaptureError::UnsupportedMedia(self.mime_type.clone()))
    }
}

impl std::fmt::Debug for Upload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upload")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

fn subtype(mime_type: &str) -> &str {
    mime_type.split('/').nth(1).unwrap_or("octet-stream")
}

/// Maps a file extension to a MIME type.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "apng" => "video/apng",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff() {
        assert_eq!(MediaKind::sniff("image/png"), Some(MediaKind::Image));
        assert_eq!(MediaKind::sniff("Video/MP4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::sniff("application/pdf"), None);
        assert_eq!(MediaKind::sniff(""), None);
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("a/b/frame.JPG")), Some("image/jpeg"));
        assert_eq!(mime_for_path(Path::new("clip.webm")), Some("video/webm"));
        assert_eq!(mime_for_path(Path::new("notes.txt")), None);
        assert_eq!(mime_for_path(Path::new("noext")), None);
    }

    #[test]
    fn test_upload_kind() {
        let upload = Upload::new("x.bin", "application/octet-stream", vec![]);
        assert!(matches!(
            upload.kind(),
            Err(CaptureError::UnsupportedMedia(_))
        ));

        let upload = Upload::new("x.gif", "image/gif", vec![]);
        assert_eq!(upload.kind().unwrap(), MediaKind::Image);
    }
}
