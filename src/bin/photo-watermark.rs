use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use photo_watermark::archive::Walk;
use photo_watermark::desktop::{AppState, DesktopForm, Status, SCALE_RANGE};
use photo_watermark::submission::{handle_submission, Submission, Upload, Workspace};
use photo_watermark::{summarize, Anchor, DEFAULT_SCALE};

#[derive(Parser)]
#[command(
    name = "photo-watermark",
    about = "Batch-apply a watermark image to photos and zip the results",
    version,
    after_help = "Positions: bottom_right, bottom_center, bottom_left, top_right, top_left, \
                  center\n(the French labels of the desktop form are accepted too)."
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watermark every jpg/jpeg/png image of a folder
    Apply {
        /// Folder containing the images
        folder: PathBuf,

        /// Watermark image
        #[arg(short, long)]
        watermark: PathBuf,

        /// Watermark position
        #[arg(short, long, default_value = "bottom_right", value_parser = parse_anchor)]
        position: Anchor,

        /// Watermark width as a percentage of each image's width
        #[arg(short, long, default_value_t = DEFAULT_SCALE, value_parser = parse_scale)]
        scale: u32,

        /// Output folder
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Process images in parallel
        #[arg(long)]
        parallel: bool,
    },

    /// Zip a folder of results
    Zip {
        /// Folder to archive
        #[arg(default_value = "output")]
        folder: PathBuf,

        /// Archive path
        #[arg(short, long, default_value = "output.zip")]
        output: PathBuf,

        /// Include subfolders
        #[arg(short, long)]
        recursive: bool,
    },

    /// Run photos through the web-form flow and print the archive path
    Submit {
        /// Photos to watermark
        photos: Vec<PathBuf>,

        /// Watermark image
        #[arg(short, long)]
        watermark: Option<PathBuf>,

        /// Watermark position (unknown names fall back to bottom_right)
        #[arg(short, long)]
        position: Option<String>,

        /// Scale percentage (1-100, default 25)
        #[arg(short, long)]
        scale: Option<String>,

        /// Working directory holding uploads/ and processed/
        #[arg(long, default_value = ".")]
        workspace: PathBuf,
    },
}

fn parse_scale(s: &str) -> Result<u32, String> {
    let scale: u32 = s.parse().map_err(|e| format!("{e}"))?;
    if SCALE_RANGE.contains(&scale) {
        Ok(scale)
    } else {
        Err(format!(
            "{scale} is not in {}..={}",
            SCALE_RANGE.start(),
            SCALE_RANGE.end()
        ))
    }
}

fn parse_anchor(s: &str) -> Result<Anchor, String> {
    s.parse().map_err(|e: photo_watermark::Error| e.to_string())
}

fn init_tracing(verbose: bool, quiet: bool) {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,photo_watermark={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Command::Apply {
            folder,
            watermark,
            position,
            scale,
            output,
            parallel,
        } => {
            let form = DesktopForm {
                folder: folder.display().to_string(),
                watermark: watermark.display().to_string(),
                position: position.name().to_string(),
                scale,
            };
            let mut app = AppState::new(output, photo_watermark::desktop::DEFAULT_ZIP_PATH)
                .with_parallel(parallel);
            finish(app.run_processing(&form), cli.quiet);
        }
        Command::Zip {
            folder,
            output,
            recursive,
        } => {
            let walk = if recursive { Walk::Recursive } else { Walk::Flat };
            let mut app = AppState::new(folder, output).with_walk(walk);
            finish(app.create_zip(), cli.quiet);
        }
        Command::Submit {
            photos,
            watermark,
            position,
            scale,
            workspace,
        } => submit(
            &photos,
            watermark.as_deref(),
            position,
            scale,
            &Workspace::new(workspace),
        ),
    }
}

fn finish(status: &Status, quiet: bool) {
    if status.is_success() {
        if !quiet {
            eprintln!("{status}");
        }
    } else {
        eprintln!("{status}");
        process::exit(1);
    }
}

fn read_upload(path: &Path) -> Upload {
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default();
    match std::fs::read(path) {
        Ok(bytes) => Upload::new(filename, bytes),
        Err(e) => {
            eprintln!("Error: cannot read {}: {e}", path.display());
            process::exit(1);
        }
    }
}

fn submit(
    photos: &[PathBuf],
    watermark: Option<&Path>,
    position: Option<String>,
    scale: Option<String>,
    workspace: &Workspace,
) {
    let submission = Submission {
        photos: photos.iter().map(PathBuf::as_path).map(read_upload).collect(),
        watermark: watermark.map(read_upload),
        position,
        scale,
    };

    match handle_submission(workspace, &submission) {
        Ok(output) => {
            let summary = summarize(&output.results);
            eprintln!(
                "[Summary] Processed: {}, Failed: {} (Total: {})",
                summary.succeeded,
                summary.failed,
                summary.total()
            );
            println!("{}", output.archive.display());
        }
        Err(e) => {
            eprintln!("Error ({}): {e}", e.status_code());
            process::exit(if e.is_client_error() { 2 } else { 1 });
        }
    }
}
