//! Image builder - sequences device, volume, boot block and imports.
//!
//! A build either produces a complete image or fails as a whole: any
//! error aborts it and the output file is removed again.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::boot::{BootBlock, SourceFit, MINIMAL_BOOT_CODE};
use crate::device::{DumpDevice, Geometry};
use crate::error::{AdfError, AdfResult};
use crate::fs::VolumeFS;
use crate::import::TreeImporter;
use crate::ofs::{AdfVolume, AmigaDate};

/// Label used when none is given.
pub const DEFAULT_LABEL: &str = "empty";

fn default_label() -> String {
    DEFAULT_LABEL.to_string()
}

/// Which boot block to install.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum BootMode {
    /// Leave the disk non-bootable.
    #[default]
    None,
    /// Built-in minimal DOS loader.
    Minimal,
    /// Boot code read from a host file.
    File { path: PathBuf },
}

impl BootMode {
    /// Compose the boot block for this mode, if any.
    pub fn compose(&self) -> AdfResult<Option<(BootBlock, SourceFit)>> {
        match self {
            BootMode::None => Ok(None),
            BootMode::Minimal => {
                info!("simple DOS bootblock");
                Ok(Some((
                    BootBlock::minimal(),
                    SourceFit::Padded(MINIMAL_BOOT_CODE.len()),
                )))
            }
            BootMode::File { path } => {
                info!("bootblock: {}", path.display());
                BootBlock::from_file(path).map(Some)
            }
        }
    }
}

/// Everything needed to build one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    #[serde(default = "default_label")]
    pub label: String,
    /// Descend into directories given as inputs.
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub boot: BootMode,
    #[serde(default)]
    pub geometry: Geometry,
    /// Unix seconds stamped on every entry; `None` means now.
    #[serde(default)]
    pub timestamp: Option<u64>,
    /// Host files and directories, imported in order.
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
}

impl BuildRequest {
    /// Request with defaults for everything but the output path.
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            label: default_label(),
            recursive: false,
            boot: BootMode::None,
            geometry: Geometry::default(),
            timestamp: None,
            inputs: Vec::new(),
            output: output.into(),
        }
    }

    /// Parse a JSON manifest. Relative paths resolve against `base`.
    pub fn from_json(text: &str, base: &Path) -> AdfResult<Self> {
        let mut request: BuildRequest = serde_json::from_str(text)?;
        request.output = base.join(&request.output);
        request.inputs = request.inputs.iter().map(|p| base.join(p)).collect();
        if let BootMode::File { path } = &mut request.boot {
            *path = base.join(&*path);
        }
        Ok(request)
    }

    /// Load a JSON manifest from disk.
    pub fn from_json_path(path: &Path) -> AdfResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| AdfError::HostAccess {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_json(&text, base)
    }

    /// Check the request before anything touches the disk.
    pub fn validate(&self) -> AdfResult<()> {
        if self.label.is_empty() {
            return Err(AdfError::InvalidLabel(self.label.clone()));
        }
        Ok(())
    }

    fn date(&self) -> AmigaDate {
        match self.timestamp {
            Some(secs) => AmigaDate::from_unix(secs),
            None => AmigaDate::now(),
        }
    }
}

/// Summary of a finished build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Label as stored on the volume.
    pub label: String,
    /// How the boot source fit, when a boot block was installed.
    pub boot: Option<SourceFit>,
    pub dirs: Vec<String>,
    pub files: Vec<String>,
    pub bytes: u64,
    /// Top-level directories skipped because recursion was off.
    pub skipped: Vec<PathBuf>,
    /// Free blocks left on the image (on-disk builds only).
    pub free_blocks: Option<u32>,
}

/// Install the boot block and import every input into a mounted volume.
pub fn populate<V: VolumeFS + ?Sized>(
    volume: &mut V,
    request: &BuildRequest,
) -> AdfResult<BuildReport> {
    let mut report = BuildReport {
        label: volume.label().to_string(),
        ..Default::default()
    };

    if let Some((boot, fit)) = request.boot.compose()? {
        volume.install_boot_block(&boot)?;
        report.boot = Some(fit);
    }

    let root = volume.root();
    let mut importer = TreeImporter::new(volume);
    for input in &request.inputs {
        let meta = fs::metadata(input).map_err(|source| AdfError::HostAccess {
            path: input.clone(),
            source,
        })?;

        if meta.is_dir() {
            if request.recursive {
                importer.import_dir(input, &root)?;
            } else {
                warn!("skipping directory: {}", input.display());
                report.skipped.push(input.clone());
            }
            continue;
        }

        let name = input
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AdfError::InvalidName(input.display().to_string()))?;
        info!(" [f] {}", name);
        importer.import_file(input, &root, name)?;
    }

    let imported = importer.finish();
    report.dirs = imported.dirs;
    report.files = imported.files;
    report.bytes = imported.bytes;
    Ok(report)
}

/// Build a complete ADF image at `request.output`.
pub fn build_image(request: &BuildRequest) -> AdfResult<BuildReport> {
    request.validate()?;

    let device = DumpDevice::create(&request.output, request.geometry)?;
    match write_volume(device, request) {
        Ok(report) => {
            info!("done");
            Ok(report)
        }
        Err(err) => {
            if let Err(e) = fs::remove_file(&request.output) {
                warn!(
                    "could not remove partial image {}: {}",
                    request.output.display(),
                    e
                );
            }
            Err(err)
        }
    }
}

fn write_volume(mut device: DumpDevice, request: &BuildRequest) -> AdfResult<BuildReport> {
    let date = request.date();
    AdfVolume::format(&mut device, &request.label, date)?;

    let mut volume = AdfVolume::mount(device)?;
    volume.set_date(date);

    let mut report = populate(&mut volume, request)?;
    report.free_blocks = Some(volume.free_blocks());

    volume.unmount()?.unmount()?;
    Ok(report)
}
