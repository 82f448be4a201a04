//! Web-form submissions: photos and a watermark in, a zip archive out.
//!
//! Routing and multipart parsing belong to the hosting web framework; this
//! module takes the already-extracted form fields. Each submission works in
//! files named after a fresh session id under an explicit [`Workspace`] and
//! removes everything except the final archive before returning.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use uuid::Uuid;

use crate::anchor::Anchor;
use crate::archive::{self, Walk};
use crate::batch::{BatchOptions, ProcessResult, Watermarker, DEFAULT_SCALE};
use crate::compositor;
use crate::error::{Error, Result};

/// Working directory root holding `uploads/` and `processed/`.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Directory name for raw uploads.
    pub const UPLOADS: &'static str = "uploads";
    /// Directory name for watermarked output and archives.
    pub const PROCESSED: &'static str = "processed";

    /// Workspace rooted at `root`. Nothing is created until [`Workspace::ensure`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where uploaded files are stored.
    #[must_use]
    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join(Self::UPLOADS)
    }

    /// Where results and archives are stored.
    #[must_use]
    pub fn processed_dir(&self) -> PathBuf {
        self.root.join(Self::PROCESSED)
    }

    /// Create `uploads/` and `processed/` if missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if a directory cannot be created.
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(self.uploads_dir())?;
        std::fs::create_dir_all(self.processed_dir())?;
        Ok(())
    }
}

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-supplied file name.
    pub filename: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Wrap an uploaded file.
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Final path component of the client file name, or `None` if there is
    /// nothing usable (empty, `.` or `..`).
    #[must_use]
    pub fn safe_name(&self) -> Option<&str> {
        self.filename
            .rsplit(['/', '\\'])
            .next()
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != "." && *name != "..")
    }
}

/// The fields of a watermarking form post.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    /// Target photos (`photos` field, repeated).
    pub photos: Vec<Upload>,
    /// Watermark image (`watermark` field).
    pub watermark: Option<Upload>,
    /// Anchor name (`position` field). Unknown or absent means bottom-right.
    pub position: Option<String>,
    /// Scale percentage (`scale` field). Absent or blank means [`DEFAULT_SCALE`].
    pub scale: Option<String>,
}

/// Validated processing parameters of a [`Submission`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionParams {
    /// Where the watermark goes.
    pub anchor: Anchor,
    /// Watermark width as a percentage of each photo's width.
    pub scale_percent: u32,
}

impl Submission {
    /// Check the submission before anything touches the disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingInput`] if there is no usable photo or no
    /// watermark, and [`Error::InvalidScale`] if `scale` is not an integer in
    /// `1..=100`.
    pub fn validate(&self) -> Result<SubmissionParams> {
        let has_photo = self.photos.iter().any(|p| p.safe_name().is_some());
        let has_watermark = self.watermark.as_ref().is_some_and(|w| !w.bytes.is_empty());
        if !has_photo || !has_watermark {
            return Err(Error::MissingInput);
        }

        let scale_percent = match self.scale.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_SCALE,
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| Error::InvalidScale(raw.to_string()))?,
        };
        compositor::check_scale(scale_percent)?;

        let anchor = self
            .position
            .as_deref()
            .map_or_else(Anchor::default, Anchor::from_label);

        Ok(SubmissionParams {
            anchor,
            scale_percent,
        })
    }
}

/// Outcome of a handled submission.
#[derive(Debug)]
pub struct SubmissionOutput {
    /// Session id the files were named after.
    pub session_id: Uuid,
    /// The zip archive to send back. The caller deletes it once delivered.
    pub archive: PathBuf,
    /// Per-photo results, in upload order.
    pub results: Vec<ProcessResult>,
}

/// `name`, or `stem (n).ext` with the smallest `n` not yet in `taken`.
/// The returned name is added to `taken`.
fn unique_name(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }

    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name, ""),
    };
    let mut n = 1u32;
    loop {
        let candidate = format!("{stem} ({n}){ext}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Files of one session, removed on drop.
struct SessionFiles {
    dirs: Vec<PathBuf>,
    files: Vec<PathBuf>,
}

impl SessionFiles {
    fn new() -> Self {
        Self {
            dirs: Vec::new(),
            files: Vec::new(),
        }
    }

    fn write(&mut self, path: PathBuf, bytes: &[u8]) -> Result<PathBuf> {
        std::fs::write(&path, bytes)?;
        self.files.push(path.clone());
        Ok(path)
    }

    fn create_dir(&mut self, path: PathBuf) -> Result<PathBuf> {
        std::fs::create_dir_all(&path)?;
        self.dirs.push(path.clone());
        Ok(path)
    }

    fn track(&mut self, path: &Path) {
        self.files.push(path.to_path_buf());
    }

    /// Stop tracking `path` so it outlives the session.
    fn keep(&mut self, path: &Path) {
        self.files.retain(|file| file != path);
    }
}

impl Drop for SessionFiles {
    fn drop(&mut self) {
        for file in &self.files {
            if let Err(e) = std::fs::remove_file(file) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %file.display(), error = %e, "failed to remove upload");
                }
            }
        }
        for dir in &self.dirs {
            if let Err(e) = std::fs::remove_dir_all(dir) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %dir.display(), error = %e, "failed to remove session directory");
                }
            }
        }
    }
}

/// Watermark every photo of `submission` and zip the results.
///
/// Uploads are stored as `uploads/<id>_watermark.png` and
/// `uploads/<id>/<filename>`, results go to `processed/<id>/` and the archive
/// to `processed/<id>.zip`. A photo that fails to process is logged and left
/// out of the archive. All intermediate files are removed before returning,
/// on success and on error.
///
/// # Errors
///
/// Validation errors from [`Submission::validate`] are returned before
/// anything is written. [`Error::WatermarkDecode`] is returned if the
/// watermark is not a readable image; I/O and zip failures are propagated.
pub fn handle_submission(
    workspace: &Workspace,
    submission: &Submission,
) -> Result<SubmissionOutput> {
    let params = submission.validate()?;
    workspace.ensure()?;

    let session_id = Uuid::new_v4();
    let mut session = SessionFiles::new();

    let watermark = submission.watermark.as_ref().ok_or(Error::MissingInput)?;
    let watermark_path = session.write(
        workspace
            .uploads_dir()
            .join(format!("{session_id}_watermark.png")),
        &watermark.bytes,
    )?;

    let upload_dir = session.create_dir(workspace.uploads_dir().join(session_id.to_string()))?;
    let mut targets = Vec::with_capacity(submission.photos.len());
    let mut taken = HashSet::new();
    for photo in &submission.photos {
        let Some(name) = photo.safe_name() else {
            warn!(filename = %photo.filename, "ignoring upload without a usable name");
            continue;
        };
        let stored = unique_name(name, &mut taken);
        if stored != name {
            warn!(filename = %photo.filename, renamed = %stored, "duplicate upload name");
        }
        targets.push(session.write(upload_dir.join(stored), &photo.bytes)?);
    }

    let watermarker = Watermarker::open(
        &watermark_path,
        BatchOptions {
            anchor: params.anchor,
            scale_percent: params.scale_percent,
            ..BatchOptions::default()
        },
    )?;

    let output_dir = session.create_dir(workspace.processed_dir().join(session_id.to_string()))?;
    let results = watermarker.process_all(&targets, &output_dir)?;

    let archive_path = workspace.processed_dir().join(format!("{session_id}.zip"));
    session.track(&archive_path);
    let archive = archive::zip_directory(&output_dir, &archive_path, Walk::Recursive)?;
    session.keep(&archive.path);

    info!(
        session = %session_id,
        photos = targets.len(),
        archived = archive.entries.len(),
        "submission processed"
    );

    Ok(SubmissionOutput {
        session_id,
        archive: archive.path,
        results,
    })
}
