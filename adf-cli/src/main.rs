//! makeadf - Create Amiga floppy disk images from host files.
//!
//! Usage:
//!   makeadf [OPTIONS] TARGET FILE [FILE...]
//!
//! Examples:
//!   makeadf disk.adf a.txt                 # One file, label "empty"
//!   makeadf -l TEST -r disk.adf docs       # Whole tree under docs/
//!   makeadf -B disk.adf c/startup          # Bootable with the built-in loader
//!   makeadf -b boot.bin disk.adf prog      # Boot code from a file
//!   makeadf --manifest build.json          # Everything from a JSON manifest

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use log::{debug, info, LevelFilter};

use adf_core::{build_image, BootMode, BuildReport, BuildRequest, Geometry, DEFAULT_LABEL};

/// Amiga ADF image builder
#[derive(Parser, Debug)]
#[command(name = "makeadf", version)]
#[command(about = "Create an Amiga OFS floppy image from host files")]
struct Args {
    /// Image file to create
    #[arg(value_name = "TARGET", conflicts_with = "manifest")]
    target: Option<PathBuf>,

    /// Host files (and, with -r, directories) to copy onto the image
    #[arg(value_name = "FILE", conflicts_with = "manifest")]
    files: Vec<PathBuf>,

    /// Volume label
    #[arg(short, long, default_value = DEFAULT_LABEL)]
    label: String,

    /// Recursively add directories
    #[arg(short, long)]
    recursive: bool,

    /// Install the built-in minimal DOS bootblock
    #[arg(short = 'B', long, conflicts_with = "bootblock")]
    simple_boot: bool,

    /// Install a bootblock read from a file
    #[arg(short, long, value_name = "BOOTBLOCK")]
    bootblock: Option<PathBuf>,

    /// Build a high density (80/2/22) image
    #[arg(short = 'H', long)]
    high_density: bool,

    /// Fixed Unix timestamp for all dates on the image
    #[arg(long, value_name = "SECONDS", env = "SOURCE_DATE_EPOCH")]
    timestamp: Option<u64>,

    /// Read the whole build request from a JSON manifest
    #[arg(long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Turn the arguments into a build request, or `None` when the
    /// positionals are incomplete.
    fn into_request(self) -> adf_core::AdfResult<Option<BuildRequest>> {
        if let Some(manifest) = &self.manifest {
            let mut request = BuildRequest::from_json_path(manifest)?;
            if self.timestamp.is_some() && request.timestamp.is_none() {
                request.timestamp = self.timestamp;
            }
            return Ok(Some(request));
        }

        let target = match self.target {
            Some(target) if !self.files.is_empty() => target,
            _ => return Ok(None),
        };

        let boot = if self.simple_boot {
            BootMode::Minimal
        } else if let Some(path) = self.bootblock {
            BootMode::File { path }
        } else {
            BootMode::None
        };

        Ok(Some(BuildRequest {
            label: self.label,
            recursive: self.recursive,
            boot,
            geometry: if self.high_density {
                Geometry::HIGH_DENSITY
            } else {
                Geometry::DOUBLE_DENSITY
            },
            timestamp: self.timestamp,
            inputs: self.files,
            output: target,
        }))
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn summarize(report: &BuildReport) {
    debug!(
        "volume {:?}: {} dirs, {} files, {} bytes, {} skipped",
        report.label,
        report.dirs.len(),
        report.files.len(),
        report.bytes,
        report.skipped.len()
    );
    if let Some(free) = report.free_blocks {
        debug!("{} blocks free", free);
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging(args.verbose);
    run(args)
}

/// Build the image described by `args` and map the outcome to an exit code.
///
/// Skipped directories are warnings only; any build error fails.
fn run(args: Args) -> ExitCode {
    let request = match args.into_request() {
        Ok(Some(request)) => request,
        Ok(None) => {
            let _ = Args::command().print_help();
            println!();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("creating {}", request.output.display());
    match build_image(&request) {
        Ok(report) => {
            summarize(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
