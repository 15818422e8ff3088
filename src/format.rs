//! # Format Classification
//!
//! Maps a file name to the way the pipeline handles it. Pure function of the
//! lower-cased extension.
//!
//! | Extension               | Policy      |
//! |-------------------------|-------------|
//! | svg                     | Copy        |
//! | jpg, jpeg, png, gif     | Transcode   |
//! | anything else / none    | Unsupported |

use std::fmt;
use std::path::Path;

/// Raster formats the pipeline re-encodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Jpeg,
    Png,
    Gif,
}

/// Formats the codec can be asked to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl From<SourceFormat> for TargetFormat {
    fn from(format: SourceFormat) -> Self {
        match format {
            SourceFormat::Jpeg => Self::Jpeg,
            SourceFormat::Png => Self::Png,
            SourceFormat::Gif => Self::Gif,
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::WebP => "webp",
        };
        f.write_str(name)
    }
}

/// How a file is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatPolicy {
    /// Duplicated byte for byte (vector assets)
    Copy,
    /// Re-encoded into its own format, plus an optional WebP variant
    Transcode(SourceFormat),
    /// Left alone and reported as skipped
    Unsupported,
}

impl FormatPolicy {
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

/// Lower-cased extension without the dot, empty when there is none
pub fn extension(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Classify a file name (or path) by its extension
pub fn classify(path: impl AsRef<Path>) -> FormatPolicy {
    match extension(path).as_str() {
        "svg" => FormatPolicy::Copy,
        "jpg" | "jpeg" => FormatPolicy::Transcode(SourceFormat::Jpeg),
        "png" => FormatPolicy::Transcode(SourceFormat::Png),
        "gif" => FormatPolicy::Transcode(SourceFormat::Gif),
        _ => FormatPolicy::Unsupported,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(classify("icon.svg"), FormatPolicy::Copy);
        assert_eq!(classify("icon.SVG"), classify("icon.svg"));
        assert_eq!(
            classify("PHOTO.JPEG"),
            FormatPolicy::Transcode(SourceFormat::Jpeg)
        );
        assert_eq!(classify("a.Jpg"), FormatPolicy::Transcode(SourceFormat::Jpeg));
        assert_eq!(classify("b.png"), FormatPolicy::Transcode(SourceFormat::Png));
        assert_eq!(classify("c.GIF"), FormatPolicy::Transcode(SourceFormat::Gif));
    }

    #[test]
    fn test_classify_unsupported() {
        assert_eq!(classify("d.unknown"), FormatPolicy::Unsupported);
        assert_eq!(classify("README"), FormatPolicy::Unsupported);
        assert_eq!(classify(".jpg"), FormatPolicy::Unsupported);
        assert_eq!(classify("photo.webp"), FormatPolicy::Unsupported);
        assert!(!classify("notes.txt").is_supported());
    }

    #[test]
    fn test_classify_uses_only_the_file_name_extension() {
        assert_eq!(
            classify("/assets/img.png/banner.gif"),
            FormatPolicy::Transcode(SourceFormat::Gif)
        );
        assert_eq!(classify("archive.tar.svg"), FormatPolicy::Copy);
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("a/B.JPG"), "jpg");
        assert_eq!(extension("noext"), "");
        assert_eq!(TargetFormat::from(SourceFormat::Png).to_string(), "png");
    }
}
