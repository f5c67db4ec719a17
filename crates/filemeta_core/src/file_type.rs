//! Registered file types.

use crate::error::CoreError;
use std::fmt;
use std::str::FromStr;

/// Kind of content a stored file holds. Stored files live in a directory
/// named after their type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// Type could not be determined.
    Unknown,
    /// Plain text.
    Text,
    /// Still image.
    Image,
    /// Audio.
    Audio,
    /// Video.
    Video,
    /// Something that looks runnable.
    Executable,
    /// Any other binary content.
    Binary,
}

impl FileType {
    /// Every registered type.
    pub const ALL: [FileType; 7] = [
        FileType::Unknown,
        FileType::Text,
        FileType::Image,
        FileType::Audio,
        FileType::Video,
        FileType::Executable,
        FileType::Binary,
    ];

    /// The directory name used for this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FileType::Unknown => "unknown",
            FileType::Text => "text",
            FileType::Image => "image",
            FileType::Audio => "audio",
            FileType::Video => "video",
            FileType::Executable => "executable",
            FileType::Binary => "binary",
        }
    }

    /// Parses a path segment, returning `None` if it names no registered type.
    #[must_use]
    pub fn from_path_segment(segment: &str) -> Option<Self> {
        FileType::ALL.into_iter().find(|t| t.as_str() == segment)
    }

    /// MIME top-level type for media files.
    #[must_use]
    pub const fn media_prefix(self) -> Option<&'static str> {
        match self {
            FileType::Image => Some("image"),
            FileType::Audio => Some("audio"),
            FileType::Video => Some("video"),
            _ => None,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_path_segment(s).ok_or_else(|| CoreError::UnknownFileType { name: s.to_owned() })
    }
}
