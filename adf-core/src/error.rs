//! Error types for image building.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building or reading an image.
#[derive(Error, Debug)]
pub enum AdfError {
    #[error("could not create device: {path}")]
    CreateDevice {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not access file: {path}")]
    HostAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not open bootblock file: {path}")]
    BootFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid volume label: {0:?}")]
    InvalidLabel(String),

    #[error("invalid name: {0:?}")]
    InvalidName(String),

    #[error("entry already exists: {0}")]
    AlreadyExists(String),

    #[error("entry not found: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("not a file: {0}")]
    NotAFile(String),

    #[error("directory structure too deep: {0}")]
    TooDeep(PathBuf),

    #[error("disk full")]
    DiskFull,

    #[error("block {0} out of range")]
    BlockOutOfRange(u32),

    #[error("corrupt block {block}: {reason}")]
    Corrupt { block: u32, reason: &'static str },

    #[error("image size {0} does not match a floppy geometry")]
    UnknownGeometry(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

/// Result type for image operations.
pub type AdfResult<T> = Result<T, AdfError>;
