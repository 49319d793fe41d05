//! Dump device - the raw block store behind an ADF image.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{AdfError, AdfResult};

/// Size of one floppy block in bytes.
pub const BLOCK_SIZE: usize = 512;

/// Floppy disk geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub cylinders: u32,
    pub heads: u32,
    pub sectors: u32,
}

impl Geometry {
    /// Double density: 80 cylinders, 2 heads, 11 sectors (880 KB).
    pub const DOUBLE_DENSITY: Geometry = Geometry {
        cylinders: 80,
        heads: 2,
        sectors: 11,
    };

    /// High density: same tracks, 22 sectors (1760 KB).
    pub const HIGH_DENSITY: Geometry = Geometry {
        cylinders: 80,
        heads: 2,
        sectors: 22,
    };

    /// Total number of blocks on the disk.
    pub fn block_count(&self) -> u32 {
        self.cylinders * self.heads * self.sectors
    }

    /// Block number of the root block (middle of the disk).
    pub fn root_block(&self) -> u32 {
        self.block_count() / 2
    }

    /// Image size in bytes.
    pub fn byte_size(&self) -> usize {
        self.block_count() as usize * BLOCK_SIZE
    }

    /// Guess the geometry from an image size.
    pub fn from_byte_size(size: usize) -> AdfResult<Self> {
        [Self::DOUBLE_DENSITY, Self::HIGH_DENSITY]
            .into_iter()
            .find(|g| g.byte_size() == size)
            .ok_or(AdfError::UnknownGeometry(size))
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::DOUBLE_DENSITY
    }
}

/// Whole-disk block store, optionally bound to a file on the host.
///
/// Blocks live in memory until [`DumpDevice::unmount`] writes them out,
/// so a failed build never leaves a half-written image behind.
pub struct DumpDevice {
    path: Option<PathBuf>,
    geometry: Geometry,
    data: Vec<u8>,
}

impl DumpDevice {
    /// Create a blank device backed by `path`.
    ///
    /// The file is created (or truncated) to its full size right away so an
    /// unwritable target fails here rather than at the end of the build.
    pub fn create(path: &Path, geometry: Geometry) -> AdfResult<Self> {
        create_sized(path, geometry.byte_size() as u64)?;

        debug!(
            "created dump device {} ({} blocks)",
            path.display(),
            geometry.block_count()
        );

        Ok(Self {
            path: Some(path.to_path_buf()),
            geometry,
            data: vec![0; geometry.byte_size()],
        })
    }

    /// Create a blank device that is never written to disk.
    pub fn in_memory(geometry: Geometry) -> Self {
        Self {
            path: None,
            geometry,
            data: vec![0; geometry.byte_size()],
        }
    }

    /// Load an existing image. The geometry is inferred from its size.
    pub fn open(path: &Path) -> AdfResult<Self> {
        let data = fs::read(path)?;
        let mut device = Self::from_bytes(data)?;
        device.path = Some(path.to_path_buf());
        Ok(device)
    }

    /// Wrap raw image bytes.
    pub fn from_bytes(data: Vec<u8>) -> AdfResult<Self> {
        let geometry = Geometry::from_byte_size(data.len())?;
        Ok(Self {
            path: None,
            geometry,
            data,
        })
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Host path the device flushes to, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read one block.
    pub fn read_block(&self, block: u32) -> AdfResult<[u8; BLOCK_SIZE]> {
        let range = self.block_range(block)?;
        let mut buf = [0u8; BLOCK_SIZE];
        buf.copy_from_slice(&self.data[range]);
        Ok(buf)
    }

    /// Overwrite one block.
    pub fn write_block(&mut self, block: u32, buf: &[u8; BLOCK_SIZE]) -> AdfResult<()> {
        let range = self.block_range(block)?;
        self.data[range].copy_from_slice(buf);
        Ok(())
    }

    /// Flush the image to its host file (if bound) and release the device.
    pub fn unmount(self) -> AdfResult<()> {
        if let Some(path) = &self.path {
            fs::write(path, &self.data)?;
            debug!("flushed {} bytes to {}", self.data.len(), path.display());
        }
        Ok(())
    }

    /// Consume the device and return the raw image.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    fn block_range(&self, block: u32) -> AdfResult<std::ops::Range<usize>> {
        if block >= self.geometry.block_count() {
            return Err(AdfError::BlockOutOfRange(block));
        }
        let start = block as usize * BLOCK_SIZE;
        Ok(start..start + BLOCK_SIZE)
    }
}

/// Create `path` at `len` bytes, removing it again if it cannot be sized.
fn create_sized(path: &Path, len: u64) -> AdfResult<()> {
    let failed = |source| AdfError::CreateDevice {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(failed)?;
    if let Err(source) = file.set_len(len) {
        drop(file);
        let _ = fs::remove_file(path);
        return Err(failed(source));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_sizes() {
        assert_eq!(Geometry::DOUBLE_DENSITY.block_count(), 1760);
        assert_eq!(Geometry::DOUBLE_DENSITY.root_block(), 880);
        assert_eq!(Geometry::DOUBLE_DENSITY.byte_size(), 901_120);
        assert_eq!(Geometry::HIGH_DENSITY.block_count(), 3520);
        assert_eq!(Geometry::HIGH_DENSITY.root_block(), 1760);
    }

    #[test]
    fn test_geometry_from_size() {
        assert_eq!(
            Geometry::from_byte_size(901_120).unwrap(),
            Geometry::DOUBLE_DENSITY
        );
        assert_eq!(
            Geometry::from_byte_size(1_802_240).unwrap(),
            Geometry::HIGH_DENSITY
        );
        assert!(matches!(
            Geometry::from_byte_size(1000),
            Err(AdfError::UnknownGeometry(1000))
        ));
    }

    #[test]
    fn test_block_read_write() {
        let mut dev = DumpDevice::in_memory(Geometry::DOUBLE_DENSITY);
        let mut buf = [0u8; BLOCK_SIZE];
        buf[0] = 0xAA;
        buf[511] = 0x55;
        dev.write_block(1759, &buf).unwrap();

        assert_eq!(dev.read_block(1759).unwrap(), buf);
        assert_eq!(dev.read_block(0).unwrap(), [0u8; BLOCK_SIZE]);
        assert!(matches!(
            dev.read_block(1760),
            Err(AdfError::BlockOutOfRange(1760))
        ));
        assert!(dev.write_block(5000, &buf).is_err());
    }

    #[test]
    fn test_create_sizes_file_immediately() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("disk.adf");

        let dev = DumpDevice::create(&path, Geometry::DOUBLE_DENSITY).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 901_120);
        assert_eq!(dev.path(), Some(path.as_path()));
    }

    #[test]
    fn test_unsizable_file_is_removed() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("huge.adf");

        let err = create_sized(&path, u64::MAX).unwrap_err();
        assert!(matches!(err, AdfError::CreateDevice { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_create_in_missing_directory_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("missing").join("disk.adf");

        let err = DumpDevice::create(&path, Geometry::DOUBLE_DENSITY).err().unwrap();
        assert!(matches!(err, AdfError::CreateDevice { .. }));
    }

    #[test]
    fn test_unmount_then_open() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("disk.adf");

        let mut dev = DumpDevice::create(&path, Geometry::HIGH_DENSITY).unwrap();
        dev.write_block(3, &[7u8; BLOCK_SIZE]).unwrap();
        dev.unmount().unwrap();

        let dev = DumpDevice::open(&path).unwrap();
        assert_eq!(dev.geometry(), Geometry::HIGH_DENSITY);
        assert_eq!(dev.read_block(3).unwrap(), [7u8; BLOCK_SIZE]);
    }
}
