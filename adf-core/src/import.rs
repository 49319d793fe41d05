//! Host directory tree import.
//!
//! The importer walks the host tree with explicit paths and hands the
//! volume explicit [`DirCursor`]s, so neither the process working
//! directory nor any volume-side "current directory" is ever mutated.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::error::{AdfError, AdfResult};
use crate::fs::{DirCursor, VolumeFS};

/// Deepest directory nesting accepted below a top-level import.
pub const MAX_DEPTH: usize = 64;

/// What an import wrote to the volume.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Image paths of created directories.
    pub dirs: Vec<String>,
    /// Image paths of written files.
    pub files: Vec<String>,
    /// Total file bytes copied.
    pub bytes: u64,
}

/// One level of the recursive walk.
struct Frame<'a> {
    host: &'a Path,
    /// Display path used for progress output.
    logical: String,
    depth: usize,
}

/// Mirrors host directories and files into a volume.
pub struct TreeImporter<'v, V: VolumeFS + ?Sized> {
    volume: &'v mut V,
    report: ImportReport,
}

impl<'v, V: VolumeFS + ?Sized> TreeImporter<'v, V> {
    pub fn new(volume: &'v mut V) -> Self {
        Self {
            volume,
            report: ImportReport::default(),
        }
    }

    /// Import the host directory `host` as a new directory under `at`.
    ///
    /// A path without a normal final component (`.`, `..`, `/`) is not
    /// created itself; its contents land directly in `at`.
    pub fn import_dir(&mut self, host: &Path, at: &DirCursor) -> AdfResult<()> {
        let frame = Frame {
            host,
            logical: last_component(host).into_owned(),
            depth: 0,
        };
        self.import_frame(&frame, at)
    }

    fn import_frame(&mut self, frame: &Frame<'_>, at: &DirCursor) -> AdfResult<()> {
        if frame.depth >= MAX_DEPTH {
            return Err(AdfError::TooDeep(frame.host.to_path_buf()));
        }

        info!(" [d] {}", frame.logical);

        let cursor = match dir_name(frame.host) {
            Some(name) => {
                let name = utf8_name(frame.host, name)?;
                let cursor = self.volume.create_dir(at, name)?;
                self.report.dirs.push(cursor.path());
                cursor
            }
            None => at.clone(),
        };

        let access = |source| AdfError::HostAccess {
            path: frame.host.to_path_buf(),
            source,
        };
        let mut entries = fs::read_dir(frame.host)
            .map_err(access)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(access)?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            let meta = fs::metadata(&path).map_err(|source| AdfError::HostAccess {
                path: path.clone(),
                source,
            })?;
            let file_name = entry.file_name();
            let name = utf8_name(&path, &file_name)?;

            if meta.is_dir() {
                let child = Frame {
                    host: &path,
                    logical: format!("{}/{}", frame.logical, name),
                    depth: frame.depth + 1,
                };
                self.import_frame(&child, &cursor)?;
            } else {
                info!(" [f] {}/{}", frame.logical, name);
                self.import_file(&path, &cursor, name)?;
            }
        }

        Ok(())
    }

    /// Copy one host file, byte for byte, into `at` under `name`.
    ///
    /// A file larger than the space left on the volume fails with
    /// [`AdfError::DiskFull`] before any of it is read.
    pub fn import_file(&mut self, host: &Path, at: &DirCursor, name: &str) -> AdfResult<()> {
        let access = |source| AdfError::HostAccess {
            path: host.to_path_buf(),
            source,
        };
        let len = fs::metadata(host).map_err(access)?.len();
        if let Some(free) = self.volume.free_bytes() {
            if len > free {
                debug!("{}: {} bytes, {} free", host.display(), len, free);
                return Err(AdfError::DiskFull);
            }
        }

        let data = fs::read(host).map_err(access)?;
        self.volume.write_file(at, name, &data)?;
        self.report.files.push(at.join(name));
        self.report.bytes += data.len() as u64;
        Ok(())
    }

    pub fn finish(self) -> ImportReport {
        self.report
    }
}

/// Final component of `path` as written, trailing separators ignored.
///
/// Unlike [`Path::file_name`] this keeps a trailing `.`, so `docs/.`
/// yields `.` rather than `docs`.
fn last_component(path: &Path) -> Cow<'_, str> {
    let raw = path.to_string_lossy();
    let last = raw
        .trim_end_matches(std::path::is_separator)
        .rsplit(std::path::is_separator)
        .next()
        .unwrap_or_default()
        .to_string();
    if last.is_empty() {
        raw
    } else {
        Cow::Owned(last)
    }
}

/// Name to create for an imported directory, or `None` when the path
/// ends in `.`, `..` or a root and its contents merge into the cursor.
fn dir_name(path: &Path) -> Option<&std::ffi::OsStr> {
    match last_component(path).as_ref() {
        "." | ".." => None,
        _ => path.file_name(),
    }
}

fn utf8_name<'a>(path: &Path, name: &'a std::ffi::OsStr) -> AdfResult<&'a str> {
    name.to_str()
        .ok_or_else(|| AdfError::InvalidName(path.display().to_string()))
}
