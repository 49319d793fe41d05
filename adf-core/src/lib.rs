//! Amiga floppy image builder core
//!
//! This crate builds ADF floppy images from host files:
//! - Dump device at a fixed floppy geometry
//! - Amiga Old File System (OFS) volume encoding
//! - Boot block composition (built-in loader or external file)
//! - Recursive host tree import
//!
//! # Architecture
//!
//! The builder uses a layered design:
//! - `DumpDevice`: raw block store backing one image file
//! - `VolumeFS` trait: directory/file interface of a mounted volume,
//!   addressed with explicit `DirCursor` values
//! - `AdfVolume`: OFS implementation of `VolumeFS` on a `DumpDevice`
//! - `TreeImporter`: mirrors host directories into any `VolumeFS`
//! - `build_image`: orchestrates a whole build from a `BuildRequest`

pub mod boot;
pub mod builder;
pub mod device;
pub mod error;
pub mod fs;
pub mod import;
pub mod ofs;

pub use boot::{BootBlock, SourceFit, BOOT_BLOCK_SIZE, MINIMAL_BOOT_CODE};
pub use builder::{build_image, populate, BootMode, BuildReport, BuildRequest, DEFAULT_LABEL};
pub use device::{DumpDevice, Geometry, BLOCK_SIZE};
pub use error::{AdfError, AdfResult};
pub use fs::{amiga_name, names_equal, DirCursor, DirEntry, EntryKind, MemoryVolume, VolumeFS};
pub use import::{ImportReport, TreeImporter, MAX_DEPTH};
pub use ofs::{AdfVolume, AmigaDate};
