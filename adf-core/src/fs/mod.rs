//! Volume abstractions for image building.
//!
//! - `VolumeFS`: directory/file interface of a mounted volume
//! - `DirCursor`: explicit position in a volume's directory tree
//! - `MemoryVolume`: in-memory implementation

mod memory_volume;
mod volume_fs;

pub use memory_volume::MemoryVolume;
pub(crate) use volume_fs::truncate_name;
pub use volume_fs::{
    amiga_name, names_equal, DirCursor, DirEntry, EntryKind, VolumeFS, MAX_NAME_LEN,
};
