//! Desktop-form workflow: pick a folder and a watermark, run the batch into a
//! fixed output folder, then zip that folder.
//!
//! Widget layout and the event loop belong to the GUI toolkit. [`AppState`]
//! is owned by whatever drives the form and receives its two actions.

use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use crate::anchor::Anchor;
use crate::archive::{self, Walk};
use crate::batch::{self, BatchOptions, BatchSummary, Watermarker, DEFAULT_SCALE};
use crate::error::Result;

/// Range of the scale slider, in percent.
pub const SCALE_RANGE: RangeInclusive<u32> = 5..=50;

/// Output folder used when none is configured.
pub const DEFAULT_OUTPUT_FOLDER: &str = "output";

/// Archive path used when none is configured.
pub const DEFAULT_ZIP_PATH: &str = "output.zip";

/// Position choices in the order the selector shows them.
#[must_use]
pub fn position_labels() -> [&'static str; 6] {
    Anchor::ALL.map(Anchor::french_label)
}

/// Values currently entered in the form.
#[derive(Debug, Clone)]
pub struct DesktopForm {
    /// Folder containing the images to watermark.
    pub folder: String,
    /// Path of the watermark image.
    pub watermark: String,
    /// Selected position label.
    pub position: String,
    /// Slider value in percent.
    pub scale: u32,
}

impl Default for DesktopForm {
    fn default() -> Self {
        Self {
            folder: String::new(),
            watermark: String::new(),
            position: Anchor::BottomRight.french_label().to_string(),
            scale: DEFAULT_SCALE,
        }
    }
}

impl DesktopForm {
    /// Anchor for the selected label; unknown labels mean bottom-right.
    #[must_use]
    pub fn anchor(&self) -> Anchor {
        Anchor::from_label(&self.position)
    }

    /// Slider value held to [`SCALE_RANGE`].
    #[must_use]
    pub fn scale_percent(&self) -> u32 {
        self.scale.clamp(*SCALE_RANGE.start(), *SCALE_RANGE.end())
    }

    fn is_complete(&self) -> bool {
        !self.folder.trim().is_empty() && !self.watermark.trim().is_empty()
    }
}

/// Severity of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// The action completed.
    Success,
    /// The action was not started because the form is incomplete.
    Warning,
    /// The action failed.
    Error,
}

/// Status line shown under the form after an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Severity.
    pub kind: StatusKind,
    /// Text to show.
    pub message: String,
}

impl Status {
    fn new(kind: StatusKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether the action succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.kind == StatusKind::Success
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = match self.kind {
            StatusKind::Success => "✅",
            StatusKind::Warning => "⚠️",
            StatusKind::Error => "❌",
        };
        write!(f, "{mark} {}", self.message)
    }
}

/// Application state owned by the form's driver.
#[derive(Debug, Clone)]
pub struct AppState {
    output_folder: PathBuf,
    zip_path: PathBuf,
    walk: Walk,
    parallel: bool,
    status: Option<Status>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_FOLDER, DEFAULT_ZIP_PATH)
    }
}

impl AppState {
    /// State writing results to `output_folder` and archives to `zip_path`.
    pub fn new(output_folder: impl Into<PathBuf>, zip_path: impl Into<PathBuf>) -> Self {
        Self {
            output_folder: output_folder.into(),
            zip_path: zip_path.into(),
            walk: Walk::Flat,
            parallel: false,
            status: None,
        }
    }

    /// Include subfolders of the output folder when zipping.
    #[must_use]
    pub fn with_walk(mut self, walk: Walk) -> Self {
        self.walk = walk;
        self
    }

    /// Process images on the rayon pool.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Folder results are written to.
    #[must_use]
    pub fn output_folder(&self) -> &Path {
        &self.output_folder
    }

    /// Where [`AppState::create_zip`] writes the archive.
    #[must_use]
    pub fn zip_path(&self) -> &Path {
        &self.zip_path
    }

    /// Status of the last action, if any.
    #[must_use]
    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    fn set_status(&mut self, status: Status) -> &Status {
        self.status.insert(status)
    }

    fn process(&self, form: &DesktopForm) -> Result<BatchSummary> {
        let opts = BatchOptions {
            anchor: form.anchor(),
            scale_percent: form.scale_percent(),
            parallel: self.parallel,
        };
        let watermarker = Watermarker::open(Path::new(form.watermark.trim()), opts)?;
        let results =
            watermarker.process_directory(Path::new(form.folder.trim()), &self.output_folder)?;
        Ok(batch::summarize(&results))
    }

    /// "Run processing": watermark every image of the form's folder into the
    /// output folder.
    pub fn run_processing(&mut self, form: &DesktopForm) -> &Status {
        if !form.is_complete() {
            return self.set_status(Status::new(
                StatusKind::Warning,
                "Please select a folder and a watermark.",
            ));
        }

        let status = match self.process(form) {
            Ok(summary) => {
                let mut message = format!(
                    "Images saved to folder '{}/' ({} processed",
                    self.output_folder.display(),
                    summary.succeeded
                );
                if summary.failed > 0 {
                    message.push_str(&format!(", {} failed", summary.failed));
                }
                message.push(')');
                Status::new(StatusKind::Success, message)
            }
            Err(e) => Status::new(StatusKind::Error, format!("Processing failed: {e}")),
        };
        self.set_status(status)
    }

    /// "Create ZIP": archive the output folder.
    pub fn create_zip(&mut self) -> &Status {
        if !self.output_folder.is_dir() {
            return self.set_status(Status::new(StatusKind::Error, "No images found to zip."));
        }

        let status = match archive::zip_directory(&self.output_folder, &self.zip_path, self.walk) {
            Ok(summary) => Status::new(
                StatusKind::Success,
                format!(
                    "ZIP archive created: {} ({} files)",
                    summary.path.display(),
                    summary.entries.len()
                ),
            ),
            Err(e) => Status::new(StatusKind::Error, format!("Could not create archive: {e}")),
        };
        self.set_status(status)
    }
}
