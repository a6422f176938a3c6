//! Job request types shared by the worker endpoints and the executor

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// What the caller wants extracted from the source URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    /// File extension of the normalised output container
    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            MediaKind::Video => "video/mp4",
            MediaKind::Audio => "audio/mpeg",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("quality must be \"max\" or a positive height, got {0:?}")]
pub struct InvalidQuality(pub String);

/// Video quality selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    /// Best available resolution and frame rate
    Max,
    /// Upper bound on the video height in pixels
    Height(u32),
}

impl FromStr for Quality {
    type Err = InvalidQuality;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed == "max" {
            return Ok(Quality::Max);
        }

        match trimmed.parse::<u32>() {
            Ok(height) if height > 0 => Ok(Quality::Height(height)),
            _ => Err(InvalidQuality(s.to_string())),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Max => f.write_str("max"),
            Quality::Height(h) => write!(f, "{}", h),
        }
    }
}

/// A validated download job. Video always carries a quality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Video { url: String, quality: Quality },
    Audio { url: String },
}

impl Job {
    pub fn kind(&self) -> MediaKind {
        match self {
            Job::Video { .. } => MediaKind::Video,
            Job::Audio { .. } => MediaKind::Audio,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Job::Video { url, .. } | Job::Audio { url } => url,
        }
    }
}
