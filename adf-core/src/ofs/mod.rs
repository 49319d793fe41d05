//! Amiga Old File System (OFS) backend.
//!
//! - `block`: on-disk layout, checksums, name hashing, dates
//! - `bitmap`: free block tracking
//! - `volume`: `AdfVolume`, the `VolumeFS` implementation

mod bitmap;
mod block;
mod volume;

pub use block::AmigaDate;
pub use volume::AdfVolume;
