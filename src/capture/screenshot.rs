//! Region capture and persistence.
//!
//! A capture runs in this order:
//! 1. Grab the pixels inside the window rectangle
//! 2. Ensure the output directory exists
//! 3. Name the file from the local timestamp
//! 4. Normalise the colour mode for the output format
//! 5. Encode into a temp file and rename it into place

use chrono::{Local, NaiveDateTime};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, ImageError, ImageResult};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use super::window::WindowRect;
use crate::config::{CaptureConfig, OutputFormat};
use crate::error::CaptureError;

/// JPEG quality used for every capture.
pub const JPEG_QUALITY: u8 = 90;

/// Raw pixels of one capture. Only lives until it is written out.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    image: DynamicImage,
}

impl CapturedFrame {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn has_alpha(&self) -> bool {
        self.image.color().has_alpha()
    }

    /// Converts the frame into a colour mode the encoder for `format` accepts.
    ///
    /// JPEG has no alpha channel, so any alpha (or non-8-bit) buffer is
    /// flattened to RGB8. PNG keeps the buffer untouched.
    fn into_encodable(self, format: OutputFormat) -> DynamicImage {
        match format {
            OutputFormat::Png => self.image,
            OutputFormat::Jpeg => match self.image.color() {
                ColorType::L8 | ColorType::Rgb8 => self.image,
                _ => DynamicImage::ImageRgb8(self.image.to_rgb8()),
            },
        }
    }
}

/// The pixel-capture primitive.
pub trait PixelSource {
    fn grab(&self, rect: &WindowRect) -> Result<CapturedFrame, CaptureError>;
}

/// [`PixelSource`] that shells out to macOS `screencapture`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScreencaptureSource;

impl ScreencaptureSource {
    pub fn new() -> Self {
        Self
    }
}

impl PixelSource for ScreencaptureSource {
    fn grab(&self, rect: &WindowRect) -> Result<CapturedFrame, CaptureError> {
        let temp_output = tempfile::Builder::new()
            .prefix("unity_capture_")
            .suffix(".png")
            .tempfile()
            .map_err(|e| CaptureError::CaptureFailure(format!("failed to create temp file: {}", e)))?;

        let region = format!(
            "-R{},{},{},{}",
            rect.left(),
            rect.top(),
            rect.width(),
            rect.height()
        );
        let output = Command::new("screencapture")
            .arg("-x") // no shutter sound
            .arg(&region)
            .arg("-t")
            .arg("png")
            .arg(temp_output.path())
            .output()
            .map_err(|e| CaptureError::CaptureFailure(format!("failed to run screencapture: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptureError::CaptureFailure(format!(
                "screencapture exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        // screencapture exits 0 but writes nothing when Screen Recording is denied
        let written = fs::metadata(temp_output.path())
            .map(|m| m.len())
            .unwrap_or(0);
        if written == 0 {
            return Err(CaptureError::CaptureFailure(
                "screencapture produced no image; check Screen Recording permission".to_string(),
            ));
        }

        let image = image::open(temp_output.path())
            .map_err(|e| CaptureError::CaptureFailure(format!("failed to decode capture: {}", e)))?;
        Ok(CapturedFrame::new(image))
    }
}

/// Captures window regions and writes them to the output directory.
pub struct FrameCapturer<S> {
    source: S,
    output_dir: PathBuf,
    file_prefix: String,
    format: OutputFormat,
}

impl<S: PixelSource> FrameCapturer<S> {
    pub fn new(source: S, config: &CaptureConfig) -> Self {
        Self {
            source,
            output_dir: config.output_dir.clone(),
            file_prefix: config.file_prefix.clone(),
            format: config.format,
        }
    }

    #[cfg(test)]
    pub(crate) fn source(&self) -> &S {
        &self.source
    }

    /// Captures `rect` and saves it under the current local time.
    ///
    /// Returns the path of the written file.
    pub fn capture(&self, rect: &WindowRect) -> Result<PathBuf, CaptureError> {
        self.capture_at(rect, Local::now().naive_local())
    }

    /// Captures `rect` and saves it under the given timestamp.
    ///
    /// A file already present under the same name (same second) is replaced.
    pub fn capture_at(
        &self,
        rect: &WindowRect,
        timestamp: NaiveDateTime,
    ) -> Result<PathBuf, CaptureError> {
        let frame = self.source.grab(rect)?;

        ensure_output_dir(&self.output_dir)?;

        let path = self
            .output_dir
            .join(screenshot_filename(&self.file_prefix, timestamp, self.format));

        if self.format == OutputFormat::Jpeg && frame.has_alpha() {
            log::debug!("Dropping alpha channel for JPEG output");
        }
        let image = frame.into_encodable(self.format);
        write_image_atomic(&image, self.format, &path)?;
        Ok(path)
    }
}

/// Builds `<prefix>_<YYYYMMDD_HHMMSS>.<ext>`.
pub fn screenshot_filename(prefix: &str, timestamp: NaiveDateTime, format: OutputFormat) -> String {
    format!(
        "{}_{}.{}",
        prefix,
        timestamp.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Creates `dir` and its parents if missing. Safe to call repeatedly.
pub fn ensure_output_dir(dir: &Path) -> Result<(), CaptureError> {
    fs::create_dir_all(dir).map_err(|source| CaptureError::PersistenceFailure {
        path: dir.to_path_buf(),
        source,
    })
}

/// Encodes into a temp file next to `path`, then renames it over `path`.
fn write_image_atomic(
    image: &DynamicImage,
    format: OutputFormat,
    path: &Path,
) -> Result<(), CaptureError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let persistence_error = |source| CaptureError::PersistenceFailure {
        path: path.to_path_buf(),
        source,
    };

    let mut temp_file = tempfile::Builder::new()
        .prefix(".unity_screenshot_")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(persistence_error)?;

    write_encoded(image, format, BufWriter::new(temp_file.as_file_mut()), path)?;

    temp_file
        .persist(path)
        .map_err(|e| persistence_error(e.error))?;
    Ok(())
}

/// Encodes `image` into `writer` and flushes it.
///
/// Write failures surface as `PersistenceFailure` for `path`; only codec
/// failures become `Encode`.
fn write_encoded<W: Write>(
    image: &DynamicImage,
    format: OutputFormat,
    mut writer: W,
    path: &Path,
) -> Result<(), CaptureError> {
    let persistence_error = |source| CaptureError::PersistenceFailure {
        path: path.to_path_buf(),
        source,
    };

    match encode_image(image, format, &mut writer) {
        Ok(()) => {}
        Err(ImageError::IoError(source)) => return Err(persistence_error(source)),
        Err(e) => return Err(CaptureError::Encode(e)),
    }
    writer.flush().map_err(persistence_error)
}

fn encode_image<W: Write>(image: &DynamicImage, format: OutputFormat, writer: W) -> ImageResult<()> {
    match format {
        OutputFormat::Jpeg => {
            image.write_with_encoder(JpegEncoder::new_with_quality(writer, JPEG_QUALITY))
        }
        OutputFormat::Png => image.write_with_encoder(PngEncoder::new(writer)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use image::{Rgba, RgbaImage};
    use std::io;

    /// Pixel source returning a fixed RGBA buffer sized to the rectangle.
    struct SolidSource {
        pixel: Rgba<u8>,
    }

    impl PixelSource for SolidSource {
        fn grab(&self, rect: &WindowRect) -> Result<CapturedFrame, CaptureError> {
            let img = RgbaImage::from_pixel(rect.width(), rect.height(), self.pixel);
            Ok(CapturedFrame::new(DynamicImage::ImageRgba8(img)))
        }
    }

    /// Pixel source returning a busy RGBA pattern, so JPEG quality shows in file size.
    struct PatternSource;

    fn pattern(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([
                ((x * 37 + y * 11) % 256) as u8,
                ((x * x + y * 7) % 256) as u8,
                (((x ^ y) * 13) % 256) as u8,
                200,
            ])
        })
    }

    impl PixelSource for PatternSource {
        fn grab(&self, rect: &WindowRect) -> Result<CapturedFrame, CaptureError> {
            Ok(CapturedFrame::new(DynamicImage::ImageRgba8(pattern(
                rect.width(),
                rect.height(),
            ))))
        }
    }

    /// Writer that fails every write, like a full disk.
    struct FullDiskWriter;

    impl Write for FullDiskWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("No space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct DeniedSource;

    impl PixelSource for DeniedSource {
        fn grab(&self, _rect: &WindowRect) -> Result<CapturedFrame, CaptureError> {
            Err(CaptureError::CaptureFailure("permission denied".to_string()))
        }
    }

    fn noon_2024() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn small_rect() -> WindowRect {
        WindowRect::from_origin_size(100, 100, 8, 6).unwrap()
    }

    fn config_for(dir: &Path, format: OutputFormat) -> CaptureConfig {
        CaptureConfig {
            output_dir: dir.to_path_buf(),
            format,
            ..CaptureConfig::default()
        }
    }

    fn file_count(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_filename_format() {
        assert_eq!(
            screenshot_filename("unity_screenshot", noon_2024(), OutputFormat::Jpeg),
            "unity_screenshot_20240101_120000.jpg"
        );
        assert_eq!(
            screenshot_filename("unity_screenshot", noon_2024(), OutputFormat::Png),
            "unity_screenshot_20240101_120000.png"
        );
    }

    #[test]
    fn test_jpeg_flattens_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let source = SolidSource {
            pixel: Rgba([200, 100, 50, 128]),
        };
        let capturer = FrameCapturer::new(source, &config_for(dir.path(), OutputFormat::Jpeg));

        let path = capturer.capture_at(&small_rect(), noon_2024()).unwrap();

        assert_eq!(path, dir.path().join("unity_screenshot_20240101_120000.jpg"));
        let saved = image::open(&path).unwrap();
        assert!(!saved.color().has_alpha());
        assert_eq!((saved.width(), saved.height()), (8, 6));
    }

    #[test]
    fn test_png_preserves_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let pixel = Rgba([10, 20, 30, 40]);
        let capturer =
            FrameCapturer::new(SolidSource { pixel }, &config_for(dir.path(), OutputFormat::Png));

        let path = capturer.capture_at(&small_rect(), noon_2024()).unwrap();

        let saved = image::open(&path).unwrap();
        assert!(saved.color().has_alpha());
        let saved = saved.to_rgba8();
        assert!(saved.pixels().all(|p| *p == pixel));
    }

    #[test]
    fn test_capture_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("Screenshots");
        let capturer = FrameCapturer::new(DeniedSource, &config_for(&out, OutputFormat::Jpeg));

        let result = capturer.capture_at(&small_rect(), noon_2024());

        assert!(matches!(result, Err(CaptureError::CaptureFailure(_))));
        assert!(!out.exists());
    }

    #[test]
    fn test_creates_missing_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("Screenshots");
        let source = SolidSource {
            pixel: Rgba([0, 0, 0, 255]),
        };
        let capturer = FrameCapturer::new(source, &config_for(&out, OutputFormat::Png));

        let path = capturer.capture_at(&small_rect(), noon_2024()).unwrap();

        assert!(path.starts_with(&out));
        assert!(path.exists());
    }

    #[test]
    fn test_same_second_collides() {
        let dir = tempfile::tempdir().unwrap();
        let source = SolidSource {
            pixel: Rgba([1, 2, 3, 255]),
        };
        let capturer = FrameCapturer::new(source, &config_for(dir.path(), OutputFormat::Jpeg));

        let first = capturer.capture_at(&small_rect(), noon_2024()).unwrap();
        let second = capturer.capture_at(&small_rect(), noon_2024()).unwrap();

        assert_eq!(first, second);
        // Replaced, and no temp file left behind
        assert_eq!(file_count(dir.path()), 1);
    }

    #[test]
    fn test_ensure_output_dir_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("Screenshots");
        ensure_output_dir(&out).unwrap();
        ensure_output_dir(&out).unwrap();
        assert!(out.is_dir());
    }

    #[test]
    fn test_output_dir_blocked_by_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("Screenshots");
        fs::write(&blocker, b"not a directory").unwrap();
        let source = SolidSource {
            pixel: Rgba([0, 0, 0, 255]),
        };
        let capturer = FrameCapturer::new(source, &config_for(&blocker, OutputFormat::Png));

        let result = capturer.capture_at(&small_rect(), noon_2024());

        assert!(matches!(
            result,
            Err(CaptureError::PersistenceFailure { .. })
        ));
    }

    #[test]
    fn test_jpeg_keeps_rgb_frames_as_is() {
        let frame = CapturedFrame::new(DynamicImage::new_rgb8(4, 4));
        assert!(!frame.has_alpha());
        let image = frame.into_encodable(OutputFormat::Jpeg);
        assert_eq!(image.color(), ColorType::Rgb8);
    }

    #[test]
    fn test_jpeg_written_at_fixed_quality() {
        let dir = tempfile::tempdir().unwrap();
        let capturer = FrameCapturer::new(PatternSource, &config_for(dir.path(), OutputFormat::Jpeg));
        let rect = WindowRect::from_origin_size(0, 0, 64, 48).unwrap();

        let path = capturer.capture_at(&rect, noon_2024()).unwrap();
        let written = fs::read(&path).unwrap();

        let flattened = DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(pattern(64, 48)).to_rgb8());
        let mut at_90 = Vec::new();
        flattened
            .write_with_encoder(JpegEncoder::new_with_quality(&mut at_90, 90))
            .unwrap();
        let mut at_20 = Vec::new();
        flattened
            .write_with_encoder(JpegEncoder::new_with_quality(&mut at_20, 20))
            .unwrap();

        assert_eq!(JPEG_QUALITY, 90);
        assert_eq!(written, at_90);
        assert!(written.len() > at_20.len());
    }

    #[test]
    fn test_write_failure_is_persistence_failure() {
        let target = Path::new("Screenshots/unity_screenshot_20240101_120000.jpg");
        let image = DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(pattern(16, 16)).to_rgb8());

        for format in [OutputFormat::Jpeg, OutputFormat::Png] {
            let result = write_encoded(&image, format, FullDiskWriter, target);
            match result {
                Err(CaptureError::PersistenceFailure { path, source }) => {
                    assert_eq!(path, target);
                    assert_eq!(source.to_string(), "No space left on device");
                }
                other => panic!("expected PersistenceFailure for {}, got {:?}", format, other),
            }
        }
    }

    #[test]
    fn test_codec_failure_stays_encode_error() {
        // JPEG has no 16-bit mode
        let image = DynamicImage::new_rgb16(4, 4);
        let result = write_encoded(&image, OutputFormat::Jpeg, Vec::new(), Path::new("x.jpg"));
        assert!(matches!(result, Err(CaptureError::Encode(_))));
    }
}
