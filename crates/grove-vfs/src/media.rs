//! Media classification and metadata.
//!
//! Media kind is derived from the file extension; richer metadata (pixel
//! dimensions, duration) is produced by an out-of-process probe worker and
//! attached to indexed files after the fact, keyed by fingerprint.

use serde::{Deserialize, Serialize};

/// Media class of a file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
}

/// Probe-supplied media attributes, attached without blocking indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMeta {
    pub kind: MediaKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Playback duration in milliseconds, for audio/video.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Extension category constants
// ---------------------------------------------------------------------------

pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "webp", "heic", "heif", "raw", "arw", "cr2",
    "orf", "raf",
];

pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mov", "avi", "mkv", "wmv", "webm", "flv", "mpg", "mpeg", "3gp", "ts", "mts",
];

pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "aac", "ogg", "opus", "wma", "m4a", "aiff",
];

pub const DOCUMENT_EXTENSIONS: &[&str] = &[
    "txt", "md", "doc", "docx", "rtf", "odt", "pdf", "ppt", "pptx", "xls", "xlsx", "csv",
];

/// Extension set for a query class shortcut (`image`, `video`, ...).
pub fn class_extensions(class: &str) -> Option<&'static [&'static str]> {
    match class {
        "image" | "images" | "picture" | "pictures" | "photo" | "photos" => Some(IMAGE_EXTENSIONS),
        "video" | "videos" | "movie" | "movies" => Some(VIDEO_EXTENSIONS),
        "audio" | "audios" | "music" => Some(AUDIO_EXTENSIONS),
        "doc" | "docs" | "document" | "documents" => Some(DOCUMENT_EXTENSIONS),
        _ => None,
    }
}

/// Lowercase extension of a file name, if any.
pub fn extension_of(name: &str) -> Option<String> {
    let dot = name.rfind('.')?;
    if dot == 0 || dot + 1 >= name.len() {
        return None;
    }
    Some(name[dot + 1..].to_ascii_lowercase())
}

/// Media kind a file name belongs to, if its extension is recognized.
pub fn media_kind_of(name: &str) -> Option<MediaKind> {
    let ext = extension_of(name)?;
    let ext = ext.as_str();
    if IMAGE_EXTENSIONS.contains(&ext) {
        Some(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        Some(MediaKind::Video)
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        Some(MediaKind::Audio)
    } else if DOCUMENT_EXTENSIONS.contains(&ext) {
        Some(MediaKind::Document)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_edge_cases() {
        assert_eq!(extension_of("a.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension_of(".bashrc"), None);
        assert_eq!(extension_of("trailing."), None);
        assert_eq!(extension_of("noext"), None);
    }

    #[test]
    fn media_kind_lookup() {
        assert_eq!(media_kind_of("IMG_0001.HEIC"), Some(MediaKind::Image));
        assert_eq!(media_kind_of("clip.mkv"), Some(MediaKind::Video));
        assert_eq!(media_kind_of("song.flac"), Some(MediaKind::Audio));
        assert_eq!(media_kind_of("report.pdf"), Some(MediaKind::Document));
        assert_eq!(media_kind_of("archive.zip"), None);
    }

    #[test]
    fn class_aliases() {
        assert_eq!(class_extensions("photos"), Some(IMAGE_EXTENSIONS));
        assert_eq!(class_extensions("music"), Some(AUDIO_EXTENSIONS));
        assert_eq!(class_extensions("spreadsheet"), None);
    }
}
