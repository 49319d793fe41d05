//! OFS volume on a dump device.

use log::{debug, warn};

use super::bitmap::Bitmap;
use super::block::*;
use crate::boot::{BootBlock, BOOT_BLOCK_SIZE};
use crate::device::{DumpDevice, BLOCK_SIZE};
use crate::error::{AdfError, AdfResult};
use crate::fs::{amiga_name, names_equal, truncate_name, DirCursor, DirEntry, EntryKind, VolumeFS};

/// DOS type flags byte: plain OFS, no international mode, no dircache.
const DOS_FLAGS_OFS: u8 = 0;

/// Root block number recorded in an installed boot block.
const BOOT_ROOT_KEY: u32 = 880;

/// A mounted Amiga Old File System volume.
///
/// The bitmap is kept in memory while mounted and written back by
/// [`AdfVolume::unmount`].
pub struct AdfVolume {
    device: DumpDevice,
    root: u32,
    bitmap_key: u32,
    bitmap: Bitmap,
    label: String,
    date: AmigaDate,
}

impl AdfVolume {
    /// Write an empty filesystem onto `device`.
    pub fn format(device: &mut DumpDevice, label: &str, date: AmigaDate) -> AdfResult<()> {
        if label.is_empty() || label.contains(':') || label.contains('/') {
            return Err(AdfError::InvalidLabel(label.to_string()));
        }
        let stored = truncate_name(label);
        if stored.len() != label.len() {
            warn!("volume label truncated to {:?}", stored);
        }

        let geometry = device.geometry();
        let block_count = geometry.block_count();
        let root = geometry.root_block();
        let bitmap_key = root + 1;

        let mut boot = [0u8; BLOCK_SIZE];
        boot[..4].copy_from_slice(&[b'D', b'O', b'S', DOS_FLAGS_OFS]);
        device.write_block(0, &boot)?;
        device.write_block(1, &[0u8; BLOCK_SIZE])?;

        let mut block = Block::new();
        block.set_u32(OFF_TYPE, T_HEADER);
        block.set_u32(OFF_HT_SIZE, HT_SIZE as u32);
        block.set_u32(OFF_BM_FLAG, u32::MAX);
        block.set_u32(OFF_BM_PAGES, bitmap_key);
        block.set_date(OFF_DATE, date);
        block.set_name(stored);
        block.set_date(OFF_DISK_DATE, date);
        block.set_date(OFF_CREATE_DATE, date);
        block.set_u32(OFF_SEC_TYPE, ST_ROOT);
        block.update_checksum(OFF_CHECKSUM);
        device.write_block(root, &block.0)?;

        let mut bitmap = Bitmap::new(block_count, root);
        bitmap.reserve(root);
        bitmap.reserve(bitmap_key);
        device.write_block(bitmap_key, &bitmap.to_block().0)?;

        debug!(
            "formatted OFS volume {:?}: root {}, bitmap {}",
            stored, root, bitmap_key
        );
        Ok(())
    }

    /// Mount a formatted device.
    pub fn mount(device: DumpDevice) -> AdfResult<Self> {
        let geometry = device.geometry();
        let root = geometry.root_block();

        let boot = device.read_block(0)?;
        if &boot[..3] != b"DOS" {
            return Err(AdfError::Corrupt {
                block: 0,
                reason: "not a DOS disk",
            });
        }

        let root_block = Block(device.read_block(root)?);
        if root_block.get_u32(OFF_TYPE) != T_HEADER
            || root_block.get_u32(OFF_SEC_TYPE) != ST_ROOT
        {
            return Err(AdfError::Corrupt {
                block: root,
                reason: "not a root block",
            });
        }

        let bitmap_key = root_block.get_u32(OFF_BM_PAGES);
        let bitmap = Bitmap::from_block(
            &Block(device.read_block(bitmap_key)?),
            geometry.block_count(),
            root,
        );

        Ok(Self {
            label: root_block.name(),
            device,
            root,
            bitmap_key,
            bitmap,
            date: AmigaDate::now(),
        })
    }

    /// Timestamp stamped on entries created from now on.
    pub fn set_date(&mut self, date: AmigaDate) {
        self.date = date;
    }

    /// Number of unallocated blocks.
    pub fn free_blocks(&self) -> u32 {
        self.bitmap.free_count()
    }

    /// Write back the bitmap and hand the device back.
    pub fn unmount(mut self) -> AdfResult<DumpDevice> {
        let bitmap = self.bitmap.to_block();
        self.device.write_block(self.bitmap_key, &bitmap.0)?;
        Ok(self.device)
    }

    fn read(&self, key: u32) -> AdfResult<Block> {
        Ok(Block(self.device.read_block(key)?))
    }

    fn write(&mut self, key: u32, block: &mut Block) -> AdfResult<()> {
        block.update_checksum(OFF_CHECKSUM);
        self.device.write_block(key, &block.0)
    }

    fn chain_limit(&self) -> u32 {
        self.device.geometry().block_count()
    }

    fn dir_block(&self, dir: &DirCursor) -> AdfResult<Block> {
        let block = self.read(dir.key())?;
        match block.get_u32(OFF_SEC_TYPE) {
            ST_ROOT | ST_DIR => Ok(block),
            _ => Err(AdfError::NotADirectory(dir.path())),
        }
    }

    /// Look a name up in the hash chains of `dir`.
    fn find_entry(&self, dir: &DirCursor, name: &str) -> AdfResult<Option<(u32, Block)>> {
        let name = truncate_name(name);
        let parent = self.dir_block(dir)?;
        let mut key = parent.table(hash_name(name));
        for _ in 0..self.chain_limit() {
            if key == 0 {
                return Ok(None);
            }
            let entry = self.read(key)?;
            if names_equal(&entry.name(), name) {
                return Ok(Some((key, entry)));
            }
            key = entry.get_u32(OFF_NEXT_HASH);
        }
        Err(AdfError::Corrupt {
            block: dir.key(),
            reason: "hash chain loop",
        })
    }

    /// Append a new header block to its hash chain in `dir`.
    fn link(&mut self, dir: &DirCursor, name: &str, key: u32) -> AdfResult<()> {
        let mut parent = self.dir_block(dir)?;
        let slot = hash_name(name);
        let mut current = parent.table(slot);
        if current == 0 {
            parent.set_table(slot, key);
            return self.write(dir.key(), &mut parent);
        }
        for _ in 0..self.chain_limit() {
            let mut entry = self.read(current)?;
            let next = entry.get_u32(OFF_NEXT_HASH);
            if next == 0 {
                entry.set_u32(OFF_NEXT_HASH, key);
                return self.write(current, &mut entry);
            }
            current = next;
        }
        Err(AdfError::Corrupt {
            block: dir.key(),
            reason: "hash chain loop",
        })
    }

    fn ensure_absent(&self, dir: &DirCursor, name: &str) -> AdfResult<()> {
        match self.find_entry(dir, name)? {
            Some(_) => Err(AdfError::AlreadyExists(dir.join(name))),
            None => Ok(()),
        }
    }

    fn header_block(&self, key: u32, name: &str, parent: u32, sec_type: u32) -> Block {
        let mut block = Block::new();
        block.set_u32(OFF_TYPE, T_HEADER);
        block.set_u32(OFF_HEADER_KEY, key);
        block.set_date(OFF_DATE, self.date);
        block.set_name(name);
        block.set_u32(OFF_PARENT, parent);
        block.set_u32(OFF_SEC_TYPE, sec_type);
        block
    }
}

/// Fill a file header or extension table. Pointers run from the end of
/// the table backwards.
fn fill_data_table(block: &mut Block, keys: &[u32]) {
    block.set_u32(OFF_HIGH_SEQ, keys.len() as u32);
    for (i, &key) in keys.iter().enumerate() {
        block.set_table(HT_SIZE - 1 - i, key);
    }
}

impl VolumeFS for AdfVolume {
    fn label(&self) -> &str {
        &self.label
    }

    fn root(&self) -> DirCursor {
        DirCursor::root(self.root)
    }

    fn create_dir(&mut self, parent: &DirCursor, name: &str) -> AdfResult<DirCursor> {
        let name = amiga_name(name)?;
        self.ensure_absent(parent, &name)?;

        let key = self.bitmap.allocate()?;
        let mut block = self.header_block(key, &name, parent.key(), ST_DIR);
        self.write(key, &mut block)?;
        self.link(parent, &name, key)?;

        Ok(parent.child(&name, key))
    }

    fn open_dir(&self, parent: &DirCursor, name: &str) -> AdfResult<DirCursor> {
        let (key, block) = self
            .find_entry(parent, name)?
            .ok_or_else(|| AdfError::NotFound(parent.join(name)))?;
        if block.get_u32(OFF_SEC_TYPE) != ST_DIR {
            return Err(AdfError::NotADirectory(parent.join(name)));
        }
        Ok(parent.child(&block.name(), key))
    }

    fn write_file(&mut self, dir: &DirCursor, name: &str, data: &[u8]) -> AdfResult<()> {
        let name = amiga_name(name)?;
        self.ensure_absent(dir, &name)?;

        let header_key = self.bitmap.allocate()?;
        let chunks: Vec<&[u8]> = data.chunks(OFS_DATA_SIZE).collect();
        let mut data_keys = Vec::with_capacity(chunks.len());
        let mut ext_keys = Vec::new();
        for i in 0..chunks.len() {
            if i >= HT_SIZE && i % HT_SIZE == 0 {
                ext_keys.push(self.bitmap.allocate()?);
            }
            data_keys.push(self.bitmap.allocate()?);
        }

        for (i, chunk) in chunks.iter().enumerate() {
            let mut block = Block::new();
            block.set_u32(OFF_TYPE, T_DATA);
            block.set_u32(OFF_HEADER_KEY, header_key);
            block.set_u32(OFF_SEQ_NUM, i as u32 + 1);
            block.set_u32(OFF_DATA_SIZE, chunk.len() as u32);
            block.set_u32(OFF_NEXT_DATA, data_keys.get(i + 1).copied().unwrap_or(0));
            block.0[OFF_DATA..OFF_DATA + chunk.len()].copy_from_slice(chunk);
            self.write(data_keys[i], &mut block)?;
        }

        let mut groups = data_keys.chunks(HT_SIZE);
        let mut header = self.header_block(header_key, &name, dir.key(), ST_FILE);
        fill_data_table(&mut header, groups.next().unwrap_or(&[]));
        header.set_u32(OFF_FIRST_DATA, data_keys.first().copied().unwrap_or(0));
        header.set_u32(OFF_BYTE_SIZE, data.len() as u32);
        header.set_u32(OFF_EXTENSION, ext_keys.first().copied().unwrap_or(0));
        self.write(header_key, &mut header)?;

        for (i, group) in groups.enumerate() {
            let mut ext = Block::new();
            ext.set_u32(OFF_TYPE, T_LIST);
            ext.set_u32(OFF_HEADER_KEY, ext_keys[i]);
            fill_data_table(&mut ext, group);
            ext.set_u32(OFF_PARENT, header_key);
            ext.set_u32(OFF_EXTENSION, ext_keys.get(i + 1).copied().unwrap_or(0));
            ext.set_u32(OFF_SEC_TYPE, ST_FILE);
            self.write(ext_keys[i], &mut ext)?;
        }

        self.link(dir, &name, header_key)?;
        debug!(
            "wrote {} ({} bytes, {} data blocks) at block {}",
            dir.join(&name),
            data.len(),
            data_keys.len(),
            header_key
        );
        Ok(())
    }

    fn read_file(&self, dir: &DirCursor, name: &str) -> AdfResult<Vec<u8>> {
        let (key, header) = self
            .find_entry(dir, name)?
            .ok_or_else(|| AdfError::NotFound(dir.join(name)))?;
        if header.get_u32(OFF_SEC_TYPE) != ST_FILE {
            return Err(AdfError::NotAFile(dir.join(name)));
        }

        let size = header.get_u32(OFF_BYTE_SIZE) as usize;
        let mut data = Vec::with_capacity(size);
        let mut next = header.get_u32(OFF_FIRST_DATA);
        for _ in 0..self.chain_limit() {
            if next == 0 || data.len() >= size {
                break;
            }
            let block = self.read(next)?;
            if block.get_u32(OFF_TYPE) != T_DATA || block.get_u32(OFF_HEADER_KEY) != key {
                return Err(AdfError::Corrupt {
                    block: next,
                    reason: "bad data block",
                });
            }
            let len = (block.get_u32(OFF_DATA_SIZE) as usize).min(OFS_DATA_SIZE);
            data.extend_from_slice(&block.0[OFF_DATA..OFF_DATA + len]);
            next = block.get_u32(OFF_NEXT_DATA);
        }

        if data.len() != size {
            return Err(AdfError::Corrupt {
                block: key,
                reason: "file size mismatch",
            });
        }
        Ok(data)
    }

    fn list_dir(&self, dir: &DirCursor) -> AdfResult<Vec<DirEntry>> {
        let parent = self.dir_block(dir)?;
        let mut entries = Vec::new();
        for slot in 0..HT_SIZE {
            let mut key = parent.table(slot);
            while key != 0 {
                if entries.len() as u32 > self.chain_limit() {
                    return Err(AdfError::Corrupt {
                        block: dir.key(),
                        reason: "hash chain loop",
                    });
                }
                let block = self.read(key)?;
                let (kind, size) = match block.get_u32(OFF_SEC_TYPE) {
                    ST_DIR => (EntryKind::Dir, 0),
                    ST_FILE => (EntryKind::File, block.get_u32(OFF_BYTE_SIZE) as u64),
                    _ => {
                        return Err(AdfError::Corrupt {
                            block: key,
                            reason: "unknown entry type",
                        })
                    }
                };
                entries.push(DirEntry {
                    name: block.name(),
                    kind,
                    size,
                    key,
                });
                key = block.get_u32(OFF_NEXT_HASH);
            }
        }
        Ok(entries)
    }

    fn install_boot_block(&mut self, boot: &BootBlock) -> AdfResult<()> {
        let mut buf = *boot.as_bytes();
        buf[..4].copy_from_slice(&[b'D', b'O', b'S', DOS_FLAGS_OFS]);
        buf[OFF_BOOT_ROOT..OFF_BOOT_ROOT + 4].copy_from_slice(&BOOT_ROOT_KEY.to_be_bytes());
        let sum = boot_checksum(&buf);
        buf[OFF_BOOT_CHECKSUM..OFF_BOOT_CHECKSUM + 4].copy_from_slice(&sum.to_be_bytes());

        let mut first = [0u8; BLOCK_SIZE];
        let mut second = [0u8; BLOCK_SIZE];
        first.copy_from_slice(&buf[..BLOCK_SIZE]);
        second.copy_from_slice(&buf[BLOCK_SIZE..]);
        self.device.write_block(0, &first)?;
        self.device.write_block(1, &second)?;
        debug!("installed boot block, checksum {:08x}", sum);
        Ok(())
    }

    fn boot_block(&self) -> Option<BootBlock> {
        let mut buf = [0u8; BOOT_BLOCK_SIZE];
        buf[..BLOCK_SIZE].copy_from_slice(&self.device.read_block(0).ok()?);
        buf[BLOCK_SIZE..].copy_from_slice(&self.device.read_block(1).ok()?);
        if buf[BOOT_HEADER_SIZE..].iter().all(|&b| b == 0) {
            return None;
        }
        Some(BootBlock::from_raw(buf))
    }

    fn free_bytes(&self) -> Option<u64> {
        Some(self.free_blocks() as u64 * OFS_DATA_SIZE as u64)
    }
}
