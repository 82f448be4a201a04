//! Batch watermarking of many target images with one watermark.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use tracing::{debug, error, info};

use crate::anchor::Anchor;
use crate::compositor;
use crate::error::{Error, Result};

/// Scale percentage used when the caller does not provide one.
pub const DEFAULT_SCALE: u32 = 25;

/// JPEG quality used when writing `.jpg`/`.jpeg` outputs.
pub const JPEG_QUALITY: u8 = 95;

/// Options controlling how every image of a batch is watermarked.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Where the watermark is placed.
    pub anchor: Anchor,
    /// Watermark width as a percentage of each target's width.
    pub scale_percent: u32,
    /// Process files on the rayon pool instead of one after another.
    /// Only takes effect with the `parallel` feature.
    pub parallel: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            anchor: Anchor::default(),
            scale_percent: DEFAULT_SCALE,
            parallel: false,
        }
    }
}

/// Result of processing a single image file.
#[derive(Debug)]
pub struct ProcessResult {
    /// Path of the input file.
    pub path: PathBuf,
    /// Where the watermarked image was written, if it was.
    pub output: Option<PathBuf>,
    /// Whether processing succeeded.
    pub success: bool,
    /// Human-readable status message.
    pub message: String,
}

/// Success and failure counts over a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    /// Images written.
    pub succeeded: usize,
    /// Images skipped because of an error.
    pub failed: usize,
}

impl BatchSummary {
    /// Total number of images attempted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Count successes and failures in `results`.
#[must_use]
pub fn summarize(results: &[ProcessResult]) -> BatchSummary {
    results
        .iter()
        .fold(BatchSummary::default(), |mut summary, result| {
            if result.success {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            summary
        })
}

/// A decoded watermark plus the options to apply it with.
///
/// Create once per batch; the watermark is decoded a single time and rescaled
/// for each target.
pub struct Watermarker {
    watermark: RgbaImage,
    opts: BatchOptions,
}

impl Watermarker {
    /// Create a watermarker from an already decoded watermark.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidScale`] if `opts.scale_percent` is out of range.
    pub fn new(watermark: RgbaImage, opts: BatchOptions) -> Result<Self> {
        compositor::check_scale(opts.scale_percent)?;
        Ok(Self { watermark, opts })
    }

    /// Decode the watermark at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WatermarkDecode`] if the file cannot be read or decoded,
    /// or [`Error::InvalidScale`] if the scale is out of range.
    pub fn open(path: &Path, opts: BatchOptions) -> Result<Self> {
        let watermark = compositor::open_image(path)
            .map_err(Error::WatermarkDecode)?
            .to_rgba8();
        Self::new(watermark, opts)
    }

    /// The options this watermarker applies.
    #[must_use]
    pub fn options(&self) -> &BatchOptions {
        &self.opts
    }

    /// Watermark a decoded image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WatermarkTooSmall`] if the watermark scales to nothing
    /// on this image.
    pub fn apply(&self, image: &DynamicImage) -> Result<RgbImage> {
        compositor::compose(image, &self.watermark, self.opts.anchor, self.opts.scale_percent)
    }

    fn try_process(&self, input: &Path, output: &Path) -> Result<()> {
        let image = compositor::open_image(input)?;
        let watermarked = self.apply(&image)?;

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        save_image(&watermarked, output)
    }

    /// Process a single image file: load, watermark, save.
    ///
    /// Never fails as a whole; errors are logged and reported in the returned
    /// [`ProcessResult`].
    #[must_use]
    pub fn process_file(&self, input: &Path, output: &Path) -> ProcessResult {
        let filename = display_name(input);
        match self.try_process(input, output) {
            Ok(()) => {
                debug!(file = %filename, output = %output.display(), "watermark applied");
                ProcessResult {
                    path: input.to_path_buf(),
                    output: Some(output.to_path_buf()),
                    success: true,
                    message: "Watermark applied".to_string(),
                }
            }
            Err(e) => {
                error!(file = %filename, error = %e, "failed to watermark image");
                ProcessResult {
                    path: input.to_path_buf(),
                    output: None,
                    success: false,
                    message: e.to_string(),
                }
            }
        }
    }

    fn process_target(&self, input: &Path, output_dir: &Path) -> ProcessResult {
        match input.file_name() {
            Some(name) => self.process_file(input, &output_dir.join(name)),
            None => {
                let e = Error::NoFileName(input.to_path_buf());
                error!(file = %input.display(), error = %e, "failed to watermark image");
                ProcessResult {
                    path: input.to_path_buf(),
                    output: None,
                    success: false,
                    message: e.to_string(),
                }
            }
        }
    }

    /// Watermark every path in `targets` into `output_dir`, keeping each
    /// file's original name.
    ///
    /// A failing image is logged and skipped; the rest of the batch still
    /// runs. Results are returned in input order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] only if `output_dir` cannot be created.
    pub fn process_all(
        &self,
        targets: &[PathBuf],
        output_dir: &Path,
    ) -> Result<Vec<ProcessResult>> {
        std::fs::create_dir_all(output_dir)?;

        let results = self.run(targets, output_dir);

        let summary = summarize(&results);
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            output = %output_dir.display(),
            "batch finished"
        );
        Ok(results)
    }

    #[cfg(feature = "parallel")]
    fn run(&self, targets: &[PathBuf], output_dir: &Path) -> Vec<ProcessResult> {
        use rayon::prelude::*;

        if self.opts.parallel {
            targets
                .par_iter()
                .map(|input| self.process_target(input, output_dir))
                .collect()
        } else {
            targets
                .iter()
                .map(|input| self.process_target(input, output_dir))
                .collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn run(&self, targets: &[PathBuf], output_dir: &Path) -> Vec<ProcessResult> {
        if self.opts.parallel {
            debug!("parallel processing requested but the `parallel` feature is disabled");
        }
        targets
            .iter()
            .map(|input| self.process_target(input, output_dir))
            .collect()
    }

    /// Watermark every supported image directly inside `input_dir` (no
    /// recursion) into `output_dir`, in file-name order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if `input_dir` cannot be listed or `output_dir`
    /// cannot be created.
    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: &Path,
    ) -> Result<Vec<ProcessResult>> {
        let targets = list_images(input_dir)?;
        debug!(
            count = targets.len(),
            input = %input_dir.display(),
            "collected images"
        );
        self.process_all(&targets, output_dir)
    }
}

/// Supported image files directly inside `dir`, sorted by name.
///
/// # Errors
///
/// Returns [`Error::Io`] if the directory cannot be read.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() && is_supported_image(&entry.path()) {
            images.push(entry.path());
        }
    }
    images.sort();
    Ok(images)
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    )
}

/// Check if a file has an extension picked up by directory processing.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(ext.to_lowercase().as_str(), "jpg" | "jpeg" | "png"),
        None => false,
    }
}

/// Save an RGB image, choosing the format from the file extension.
///
/// JPEG is written at [`JPEG_QUALITY`]; PNG, WebP and BMP use the `image`
/// crate defaults.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: &RgbImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    match format {
        ImageFormat::Jpeg => {
            let mut file = BufWriter::new(std::fs::File::create(path)?);
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut file, JPEG_QUALITY);
            encoder.encode_image(img)?;
            file.flush()?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp => {
            img.save_with_format(path, format)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba};

    fn watermarker() -> Watermarker {
        let wm = RgbaImage::from_pixel(20, 10, Rgba([255, 255, 255, 200]));
        Watermarker::new(wm, BatchOptions::default()).unwrap()
    }

    #[test]
    fn default_options_are_bottom_right_at_25_percent() {
        let opts = BatchOptions::default();
        assert_eq!(opts.anchor, Anchor::BottomRight);
        assert_eq!(opts.scale_percent, 25);
        assert!(!opts.parallel);
    }

    #[test]
    fn new_rejects_out_of_range_scale() {
        let wm = RgbaImage::new(4, 4);
        let opts = BatchOptions {
            scale_percent: 0,
            ..BatchOptions::default()
        };
        assert!(matches!(
            Watermarker::new(wm, opts),
            Err(Error::InvalidScale(_))
        ));
    }

    #[test]
    fn is_supported_image_accepts_common_formats() {
        assert!(is_supported_image(Path::new("photo.jpg")));
        assert!(is_supported_image(Path::new("photo.JPEG")));
        assert!(is_supported_image(Path::new("photo.png")));
    }

    #[test]
    fn is_supported_image_rejects_unsupported_formats() {
        assert!(!is_supported_image(Path::new("photo.gif")));
        assert!(!is_supported_image(Path::new("photo.txt")));
        assert!(!is_supported_image(Path::new("photo")));
    }

    #[test]
    fn summarize_counts_outcomes() {
        let ok = |p: &str| ProcessResult {
            path: p.into(),
            output: Some(p.into()),
            success: true,
            message: String::new(),
        };
        let results = vec![
            ok("a.png"),
            ProcessResult {
                path: "b.png".into(),
                output: None,
                success: false,
                message: "broken".into(),
            },
            ok("c.png"),
        ];
        let summary = summarize(&results);
        assert_eq!(summary, BatchSummary { succeeded: 2, failed: 1 });
        assert_eq!(summary.total(), 3);
    }

    #[test]
    fn process_file_writes_output_and_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        RgbImage::from_pixel(100, 60, Rgb([10, 20, 30]))
            .save(&input)
            .unwrap();
        let output = dir.path().join("nested/out/in.png");

        let result = watermarker().process_file(&input, &output);

        assert!(result.success, "{}", result.message);
        assert_eq!(result.output.as_deref(), Some(output.as_path()));
        let written = image::open(&output).unwrap();
        assert_eq!((written.width(), written.height()), (100, 60));
    }

    #[test]
    fn process_file_reports_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            watermarker().process_file(&dir.path().join("nope.png"), &dir.path().join("out.png"));
        assert!(!result.success);
        assert!(result.output.is_none());
        assert!(!dir.path().join("out.png").exists());
    }

    #[test]
    fn save_image_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbImage::new(2, 2);
        assert!(matches!(
            save_image(&img, &dir.path().join("x.unknownext")),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn save_image_writes_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.JPG");
        save_image(&RgbImage::from_pixel(8, 8, Rgb([200, 100, 50])), &path).unwrap();
        assert_eq!(
            image::ImageFormat::from_path(&path).unwrap(),
            image::ImageFormat::Jpeg
        );
        assert_eq!(image::open(&path).unwrap().width(), 8);
    }
}
