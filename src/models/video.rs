//! Resolved video metadata.

use std::path::PathBuf;

/// Placeholder shown when the source has no title.
pub const UNKNOWN_TITLE: &str = "未知标题";
/// Placeholder shown when the source has no author.
pub const UNKNOWN_AUTHOR: &str = "未知作者";

/// Result of resolving and downloading a shared link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInfo {
    /// Content identifier; keys every temporary file derived from the video.
    pub video_id: String,
    /// Title reported by the source, if any.
    pub title: Option<String>,
    /// Author reported by the source, if any.
    pub author: Option<String>,
    /// Local path of the downloaded video.
    pub video_path: PathBuf,
}

impl VideoInfo {
    /// Title, or a placeholder when missing or blank.
    #[must_use]
    pub fn display_title(&self) -> &str {
        non_blank(self.title.as_deref()).unwrap_or(UNKNOWN_TITLE)
    }

    /// Author, or a placeholder when missing or blank.
    #[must_use]
    pub fn display_author(&self) -> &str {
        non_blank(self.author.as_deref()).unwrap_or(UNKNOWN_AUTHOR)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Title and author handed to the summarization pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoMeta {
    /// Video title.
    pub title: String,
    /// Video author.
    pub author: String,
}

impl From<&VideoInfo> for VideoMeta {
    fn from(info: &VideoInfo) -> Self {
        Self {
            title: info.display_title().to_owned(),
            author: info.display_author().to_owned(),
        }
    }
}
