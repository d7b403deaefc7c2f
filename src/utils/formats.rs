use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use crate::utils::PipelineError;

/// Coarse image type that decides which algorithms apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFamily {
    Jpeg,
    Png,
    Svg,
    Gif,
}

impl MediaFamily {
    /// Detects the family from a MIME-like media type.
    ///
    /// Matching is by substring, so `image/jpg` and `image/jpeg` both land on
    /// [`MediaFamily::Jpeg`]. Returns `None` for anything else.
    pub fn detect(media_type: &str) -> Option<Self> {
        let media_type = media_type.to_lowercase();
        if media_type.contains("svg") {
            Some(Self::Svg)
        } else if media_type.contains("jpeg") || media_type.contains("jpg") {
            Some(Self::Jpeg)
        } else if media_type.contains("png") {
            Some(Self::Png)
        } else if media_type.contains("gif") {
            Some(Self::Gif)
        } else {
            None
        }
    }

    /// Canonical media type for this family
    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Svg => "image/svg+xml",
            Self::Gif => "image/gif",
        }
    }
}

impl fmt::Display for MediaFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Svg => "SVG",
            Self::Gif => "GIF",
        };
        f.write_str(name)
    }
}

impl FromStr for MediaFamily {
    type Err = PipelineError;

    fn from_str(ext: &str) -> Result<Self, Self::Err> {
        let ext = ext.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "svg" => Ok(Self::Svg),
            "gif" => Ok(Self::Gif),
            _ => Err(PipelineError::setup(format!(
                "Unsupported image format: {}", ext
            ))),
        }
    }
}

/// Get the media family from a file extension
pub fn family_from_extension(path: &Path) -> Result<MediaFamily, PipelineError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| PipelineError::setup(
            format!("File has no extension: {}", path.display())
        ))?;

    MediaFamily::from_str(ext)
}
