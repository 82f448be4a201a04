use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use photo_watermark::archive::{zip_directory, Walk};
use photo_watermark::submission::{handle_submission, Submission, Upload, Workspace};
use photo_watermark::{compose, compose_files, summarize, Anchor, BatchOptions, Watermarker};
use tracing_subscriber::fmt::MakeWriter;

/// Collects formatted log output so tests can assert on emitted events.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn png_bytes(img: DynamicImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn write_photo(path: &Path, w: u32, h: u32) {
    RgbImage::from_pixel(w, h, Rgb([30, 60, 90])).save(path).unwrap();
}

fn write_watermark(path: &Path) {
    RgbaImage::from_pixel(40, 20, Rgba([255, 255, 255, 255]))
        .save(path)
        .unwrap();
}

fn zip_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes).unwrap();
            (file.name().to_string(), bytes)
        })
        .collect()
}

#[test]
fn scaled_watermark_width_tracks_image_width() {
    let image = DynamicImage::ImageRgb8(RgbImage::new(400, 300));
    let wm = RgbaImage::from_pixel(37, 11, Rgba([255, 0, 0, 255]));

    let out = compose(&image, &wm, Anchor::TopLeft, 25).unwrap();

    // round(25/100 * 400) = 100 red columns starting at the 10px margin.
    let red_columns = (0..out.width())
        .filter(|&x| out.get_pixel(x, 12)[0] > 128)
        .count();
    assert_eq!(red_columns, 100);
    assert!(out.get_pixel(10, 12)[0] > 128);
    assert!(out.get_pixel(9, 12)[0] < 128);
}

#[test]
fn center_anchor_matches_floor_formula() {
    assert_eq!(Anchor::Center.offset(640, 480, 160, 45), (240, 217));
    assert_eq!(Anchor::BottomRight.offset(640, 480, 160, 45), (470, 425));
}

#[test]
fn compose_files_reads_both_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let photo = dir.path().join("photo.png");
    let logo = dir.path().join("logo.png");
    write_photo(&photo, 200, 100);
    write_watermark(&logo);

    let out = compose_files(&photo, &logo, Anchor::BottomLeft, 20).unwrap();
    // 40x20 at 20% of 200 -> 40x20, placed at (10, 70).
    assert_eq!(*out.get_pixel(10, 70), Rgb([255, 255, 255]));
    assert_eq!(*out.get_pixel(49, 89), Rgb([255, 255, 255]));
    assert_eq!(*out.get_pixel(50, 89), Rgb([30, 60, 90]));
}

#[test]
fn batch_skips_corrupt_file_and_keeps_going() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in");
    std::fs::create_dir(&input).unwrap();
    write_photo(&input.join("a.png"), 120, 90);
    std::fs::write(input.join("b.jpg"), b"definitely not a jpeg").unwrap();
    write_photo(&input.join("c.jpg"), 80, 80);

    let logo = dir.path().join("logo.png");
    write_watermark(&logo);

    let output = dir.path().join("out");
    let watermarker = Watermarker::open(&logo, BatchOptions::default()).unwrap();

    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::ERROR)
        .finish();
    let results = tracing::subscriber::with_default(subscriber, || {
        watermarker.process_directory(&input, &output).unwrap()
    });

    let failures: Vec<_> = logs
        .lines()
        .into_iter()
        .filter(|line| line.contains("failed to watermark image"))
        .collect();
    assert_eq!(failures.len(), 1, "{failures:?}");
    assert!(failures[0].contains("b.jpg"));

    let summary = summarize(&results);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert!(!results[1].success);
    assert!(results[1].path.ends_with("b.jpg"));

    let mut written: Vec<_> = std::fs::read_dir(&output)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    written.sort();
    assert_eq!(written, vec!["a.png", "c.jpg"]);
}

#[test]
fn process_all_keeps_original_names_and_order() {
    let dir = tempfile::tempdir().unwrap();
    let targets: Vec<PathBuf> = ["z.png", "m.png", "a.png"]
        .iter()
        .map(|name| {
            let path = dir.path().join(name);
            write_photo(&path, 64, 64);
            path
        })
        .collect();
    let logo = dir.path().join("logo.png");
    write_watermark(&logo);

    let opts = BatchOptions {
        anchor: Anchor::Center,
        scale_percent: 50,
        parallel: true,
    };
    let watermarker = Watermarker::open(&logo, opts).unwrap();
    let results = watermarker
        .process_all(&targets, &dir.path().join("results"))
        .unwrap();

    let inputs: Vec<_> = results.iter().map(|r| r.path.clone()).collect();
    assert_eq!(inputs, targets);
    for name in ["z.png", "m.png", "a.png"] {
        assert!(dir.path().join("results").join(name).is_file());
    }
}

#[test]
fn zipping_output_preserves_entries_and_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    std::fs::create_dir(&out).unwrap();
    write_photo(&out.join("a.png"), 10, 10);
    write_photo(&out.join("b.png"), 12, 12);

    let zip_path = dir.path().join("out.zip");
    zip_directory(&out, &zip_path, Walk::Recursive).unwrap();

    let entries = zip_entries(&zip_path);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].0, "a.png");
    assert_eq!(entries[1].0, "b.png");
    assert_eq!(entries[0].1, std::fs::read(out.join("a.png")).unwrap());
    assert_eq!(entries[1].1, std::fs::read(out.join("b.png")).unwrap());
}

#[test]
fn submission_without_watermark_is_rejected_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let ws = Workspace::new(dir.path().join("work"));
    let photo = png_bytes(DynamicImage::ImageRgb8(RgbImage::new(50, 50)));

    let submission = Submission {
        photos: vec![Upload::new("a.png", photo)],
        ..Submission::default()
    };
    let err = handle_submission(&ws, &submission).unwrap_err();

    assert_eq!(err.status_code(), 400);
    assert!(!ws.root().exists());
}

#[test]
fn submission_without_photos_is_rejected_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let ws = Workspace::new(dir.path().join("work"));
    let logo = png_bytes(DynamicImage::ImageRgba8(RgbaImage::new(8, 8)));

    let submission = Submission {
        watermark: Some(Upload::new("logo.png", logo)),
        ..Submission::default()
    };
    let err = handle_submission(&ws, &submission).unwrap_err();

    assert_eq!(err.status_code(), 400);
    assert!(!ws.root().exists());
}

#[test]
fn submission_produces_archive_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let ws = Workspace::new(dir.path());

    let photo = |w, h| {
        png_bytes(DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([1, 2, 3]))))
    };
    let logo = png_bytes(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        16,
        16,
        Rgba([255, 255, 255, 128]),
    )));

    let submission = Submission {
        photos: vec![
            Upload::new("first.png", photo(100, 80)),
            Upload::new("broken.png", b"garbage".to_vec()),
            Upload::new("nested/dir/second.png", photo(60, 60)),
        ],
        watermark: Some(Upload::new("logo.png", logo)),
        position: Some("center".into()),
        scale: Some("30".into()),
    };

    let output = handle_submission(&ws, &submission).unwrap();

    assert_eq!(
        output.archive,
        ws.processed_dir().join(format!("{}.zip", output.session_id))
    );
    let summary = summarize(&output.results);
    assert_eq!((summary.succeeded, summary.failed), (2, 1));

    let names: Vec<_> = zip_entries(&output.archive)
        .into_iter()
        .map(|(name, bytes)| {
            assert!(image::load_from_memory(&bytes).is_ok());
            name
        })
        .collect();
    assert_eq!(names, vec!["first.png", "second.png"]);

    // Only the archive survives.
    assert_eq!(std::fs::read_dir(ws.uploads_dir()).unwrap().count(), 0);
    let processed: Vec<_> = std::fs::read_dir(ws.processed_dir())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(processed, vec![output.archive.clone()]);
}

#[test]
fn same_named_uploads_are_kept_apart() {
    let dir = tempfile::tempdir().unwrap();
    let ws = Workspace::new(dir.path());

    let good = png_bytes(DynamicImage::ImageRgb8(RgbImage::new(80, 60)));
    let logo = png_bytes(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        8,
        8,
        Rgba([0, 0, 0, 255]),
    )));
    let submission = Submission {
        photos: vec![
            Upload::new("a/photo.png", good),
            Upload::new("b/photo.png", b"not an image".to_vec()),
        ],
        watermark: Some(Upload::new("logo.png", logo)),
        ..Submission::default()
    };

    let output = handle_submission(&ws, &submission).unwrap();

    let summary = summarize(&output.results);
    assert_eq!((summary.succeeded, summary.failed), (1, 1));
    let names: Vec<_> = zip_entries(&output.archive)
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["photo.png"]);
    assert_eq!(std::fs::read_dir(ws.uploads_dir()).unwrap().count(), 0);
}

#[test]
fn jpeg_watermark_uploaded_under_png_name_still_decodes() {
    let dir = tempfile::tempdir().unwrap();
    let ws = Workspace::new(dir.path());

    let mut jpeg = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 20, Rgb([200, 0, 0])))
        .write_to(&mut jpeg, ImageFormat::Jpeg)
        .unwrap();
    let photo = png_bytes(DynamicImage::ImageRgb8(RgbImage::new(100, 100)));

    let submission = Submission {
        photos: vec![Upload::new("p.png", photo)],
        watermark: Some(Upload::new("logo.jpg", jpeg.into_inner())),
        ..Submission::default()
    };

    let output = handle_submission(&ws, &submission).unwrap();
    assert_eq!(summarize(&output.results).succeeded, 1);
}
