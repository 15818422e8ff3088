//! # Image Codec
//!
//! The only capability the pipeline needs from an image library:
//! read one file, encode it to a target format at a quality, write it, and
//! report how many bytes were written.
//!
//! `NativeCodec` does everything in process with the `image` crate:
//!
//! | Target | Encoder                         | Quality mapping                    |
//! |--------|---------------------------------|------------------------------------|
//! | JPEG   | `JpegEncoder`                   | encoder quality (1-100)            |
//! | PNG    | `PngEncoder`                    | compression level                  |
//! | GIF    | `GifEncoder`, all frames kept   | quantizer speed (1 best, 30 worst) |
//! | WebP   | `WebPEncoder` (lossless) / cwebp | cwebp `-q` when installed          |
//!
//! When `cwebp` is on `PATH` (`NativeCodec::detect`), WebP variants of JPEG
//! and PNG sources are produced by it so the WebP quality setting applies.
//! GIF sources always use the in-process encoder.
//!
//! Encoding is CPU bound and blocking. Callers run it on the blocking pool.

use crate::error::{PipelineError, Result};
use crate::file_manager::FileManager;
use crate::format::TargetFormat;
use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{AnimationDecoder, ColorType, DynamicImage, ImageEncoder, ImageReader};
use std::borrow::Cow;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Encodes one image file into `target` at `quality` (0-100), writing the
/// result to `output`. Returns the size of the written file in bytes.
pub trait ImageCodec: Send + Sync {
    fn encode(&self, input: &Path, output: &Path, target: TargetFormat, quality: u8) -> Result<u64>;
}

/// Codec backed by the `image` crate, optionally using `cwebp` for lossy WebP
#[derive(Debug, Clone, Default)]
pub struct NativeCodec {
    cwebp: Option<PathBuf>,
}

impl NativeCodec {
    /// In-process encoders only
    pub fn new() -> Self {
        Self::default()
    }

    /// Like `new`, but picks up `cwebp` from `PATH` when it is installed
    pub fn detect() -> Self {
        let cwebp = which::which("cwebp").ok();
        match &cwebp {
            Some(path) => debug!("Using cwebp for lossy WebP: {}", path.display()),
            None => debug!("cwebp not found, WebP variants will be lossless"),
        }
        Self { cwebp }
    }

    #[cfg(test)]
    pub fn with_cwebp(path: impl Into<PathBuf>) -> Self {
        Self {
            cwebp: Some(path.into()),
        }
    }

    /// True when WebP output honours the quality setting
    pub fn has_lossy_webp(&self) -> bool {
        self.cwebp.is_some()
    }

    fn encode_with_cwebp(&self, tool: &Path, input: &Path, output: &Path, quality: u8) -> Result<u64> {
        let temp = FileManager::temp_sibling(output)?;
        let result = Command::new(tool)
            .args(["-quiet", "-q", &quality.to_string(), "-m", "4", "-mt"])
            .arg(input)
            .arg("-o")
            .arg(temp.path())
            .output()
            .map_err(|e| PipelineError::Tool(format!("failed to run {}: {}", tool.display(), e)))?;

        if !result.status.success() {
            return Err(PipelineError::Tool(format!(
                "cwebp exited with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }

        FileManager::persist(temp, output)?;
        let size = std::fs::metadata(output)
            .map_err(|e| PipelineError::io(output, e))?
            .len();
        Ok(size)
    }
}

impl ImageCodec for NativeCodec {
    fn encode(&self, input: &Path, output: &Path, target: TargetFormat, quality: u8) -> Result<u64> {
        let is_gif_source = crate::format::extension(input) == "gif";

        if let (TargetFormat::WebP, Some(tool), false) = (target, &self.cwebp, is_gif_source) {
            return self.encode_with_cwebp(tool, input, output, quality);
        }

        let bytes = if target == TargetFormat::Gif {
            encode_animation(input, quality)?
        } else {
            let image = decode(input)?;
            encode_still(&image, target, quality)?
        };

        FileManager::write_atomic(output, &bytes)
    }
}

fn decode(input: &Path) -> Result<DynamicImage> {
    let image = ImageReader::open(input)
        .map_err(|e| PipelineError::io(input, e))?
        .with_guessed_format()
        .map_err(|e| PipelineError::io(input, e))?
        .decode()?;
    Ok(image)
}

fn encode_still(image: &DynamicImage, target: TargetFormat, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();

    match target {
        TargetFormat::Jpeg => {
            let image = match image.color() {
                ColorType::L8 | ColorType::Rgb8 => Cow::Borrowed(image),
                _ => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
            };
            JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100)).write_image(
                image.as_bytes(),
                image.width(),
                image.height(),
                image.color().into(),
            )?;
        }
        TargetFormat::Png => {
            let image = match image.color() {
                ColorType::Rgb32F | ColorType::Rgba32F => {
                    Cow::Owned(DynamicImage::ImageRgba16(image.to_rgba16()))
                }
                _ => Cow::Borrowed(image),
            };
            PngEncoder::new_with_quality(&mut buffer, png_compression(quality), FilterType::Adaptive)
                .write_image(
                    image.as_bytes(),
                    image.width(),
                    image.height(),
                    image.color().into(),
                )?;
        }
        TargetFormat::WebP => {
            let image = match image.color() {
                ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => {
                    Cow::Borrowed(image)
                }
                color if color.has_alpha() => Cow::Owned(DynamicImage::ImageRgba8(image.to_rgba8())),
                _ => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
            };
            WebPEncoder::new_lossless(&mut buffer).write_image(
                image.as_bytes(),
                image.width(),
                image.height(),
                image.color().into(),
            )?;
        }
        TargetFormat::Gif => {
            let frame = image::Frame::new(image.to_rgba8());
            write_gif(&mut buffer, vec![frame], quality)?;
        }
    }

    Ok(buffer)
}

/// Re-encodes every frame of a GIF
fn encode_animation(input: &Path, quality: u8) -> Result<Vec<u8>> {
    let file = std::fs::File::open(input).map_err(|e| PipelineError::io(input, e))?;
    let frames = GifDecoder::new(BufReader::new(file))?
        .into_frames()
        .collect_frames()?;

    let mut buffer = Vec::new();
    write_gif(&mut buffer, frames, quality)?;
    Ok(buffer)
}

fn write_gif(buffer: &mut Vec<u8>, frames: Vec<image::Frame>, quality: u8) -> Result<()> {
    // The trailer is written when the encoder is dropped.
    let mut encoder = GifEncoder::new_with_speed(buffer, gif_speed(quality));
    encoder.set_repeat(Repeat::Infinite)?;
    encoder.encode_frames(frames)?;
    Ok(())
}

/// Lower quality trades encode time for smaller files
fn png_compression(quality: u8) -> CompressionType {
    match quality {
        0..=49 => CompressionType::Best,
        50..=89 => CompressionType::Default,
        _ => CompressionType::Fast,
    }
}

/// Maps quality 100 to the slowest, most accurate quantizer (speed 1) and
/// quality 0 to the fastest (speed 30)
fn gif_speed(quality: u8) -> i32 {
    let quality = i32::from(quality.min(100));
    1 + (100 - quality) * 29 / 100
}
