//! Batch-apply a watermark image to photos and package the results as a zip
//! archive.
//!
//! The watermark is scaled to a percentage of each photo's width (Lanczos
//! resampling), placed at one of six anchors with a 10px margin, alpha-blended
//! with its own alpha channel, and the result is written as opaque RGB.
//!
//! # Quick Start
//!
//! ```no_run
//! use photo_watermark::{Anchor, BatchOptions, Watermarker};
//!
//! let opts = BatchOptions {
//!     anchor: Anchor::BottomRight,
//!     scale_percent: 25,
//!     ..BatchOptions::default()
//! };
//! let watermarker =
//!     Watermarker::open("logo.png".as_ref(), opts).expect("failed to load watermark");
//! let results = watermarker
//!     .process_directory("photos".as_ref(), "output".as_ref())
//!     .expect("failed to list photos");
//! let summary = photo_watermark::summarize(&results);
//! println!("{} written, {} failed", summary.succeeded, summary.failed);
//! ```
//!
//! # Archiving
//!
//! ```no_run
//! use photo_watermark::archive::{zip_directory, Walk};
//!
//! let summary = zip_directory("output".as_ref(), "output.zip".as_ref(), Walk::Flat).unwrap();
//! println!("{} entries", summary.entries.len());
//! ```
//!
//! The [`submission`] and [`desktop`] modules hold the logic of the web form
//! and desktop form front ends.

#![deny(missing_docs)]

pub mod anchor;
pub mod archive;
mod batch;
pub mod compositor;
pub mod desktop;
pub mod error;
pub mod submission;

pub use anchor::{Anchor, MARGIN};
pub use batch::{
    is_supported_image, list_images, save_image, summarize, BatchOptions, BatchSummary,
    ProcessResult, Watermarker, DEFAULT_SCALE, JPEG_QUALITY,
};
pub use compositor::{compose, compose_files};
pub use error::{Error, Result};
