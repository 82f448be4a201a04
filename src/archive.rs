//! Zip packaging of an output directory.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;

/// How far [`zip_directory`] descends into the source directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Walk {
    /// Only regular files directly inside the directory.
    #[default]
    Flat,
    /// All regular files below the directory, stored under their relative path.
    Recursive,
}

/// What [`zip_directory`] wrote.
#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    /// Path of the archive.
    pub path: PathBuf,
    /// Entry names in the order they were added, `/`-separated.
    pub entries: Vec<String>,
}

/// Write every file of `dir` into a new zip archive at `zip_path`.
///
/// Entry names are paths relative to `dir`, added in sorted order with
/// deflate compression. An existing archive at `zip_path` is replaced; if it
/// lies inside `dir` it is not added to itself. If writing fails partway, the
/// incomplete archive is removed.
///
/// # Errors
///
/// Returns [`crate::Error::Io`] if the directory cannot be walked or a file
/// cannot be read, and [`crate::Error::Zip`] if the archive cannot be written.
pub fn zip_directory(dir: &Path, zip_path: &Path, walk: Walk) -> Result<ArchiveSummary> {
    let mut files = Vec::new();
    collect_files(dir, dir, walk, &mut files)?;
    files.retain(|(_, path)| path != zip_path);
    files.sort();

    if let Some(parent) = zip_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(zip_path)?;
    match write_entries(file, files) {
        Ok(entries) => Ok(ArchiveSummary {
            path: zip_path.to_path_buf(),
            entries,
        }),
        Err(e) => {
            if let Err(rm) = std::fs::remove_file(zip_path) {
                warn!(path = %zip_path.display(), error = %rm, "failed to remove partial archive");
            }
            Err(e)
        }
    }
}

fn write_entries(file: File, files: Vec<(String, PathBuf)>) -> Result<Vec<String>> {
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries = Vec::with_capacity(files.len());
    for (name, path) in files {
        writer.start_file(name.as_str(), options)?;
        let mut source = File::open(&path)?;
        io::copy(&mut source, &mut writer)?;
        debug!(entry = %name, "added to archive");
        entries.push(name);
    }

    writer.finish()?.flush()?;
    Ok(entries)
}

fn collect_files(
    root: &Path,
    dir: &Path,
    walk: Walk,
    files: &mut Vec<(String, PathBuf)>,
) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();

        if file_type.is_file() {
            files.push((entry_name(root, &path), path));
        } else if file_type.is_dir() && walk == Walk::Recursive {
            collect_files(root, &path, walk, files)?;
        }
    }
    Ok(())
}

fn entry_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
