//! Raw OFS block layout: offsets, checksums, name hashing and dates.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::device::BLOCK_SIZE;

// Block types
pub const T_HEADER: u32 = 2;
pub const T_DATA: u32 = 8;
pub const T_LIST: u32 = 16;

// Secondary types
pub const ST_ROOT: u32 = 1;
pub const ST_DIR: u32 = 2;
pub const ST_FILE: u32 = (-3i32) as u32;

/// Hash table slots in root and directory blocks; also data block
/// pointers per file header or extension block.
pub const HT_SIZE: usize = 72;

/// Payload bytes in an OFS data block.
pub const OFS_DATA_SIZE: usize = 488;

/// Longs in the bitmap block map.
pub const BM_MAP_SIZE: usize = 127;

// Header block offsets (root, directory, file header, extension)
pub const OFF_TYPE: usize = 0x000;
pub const OFF_HEADER_KEY: usize = 0x004;
pub const OFF_HIGH_SEQ: usize = 0x008;
pub const OFF_HT_SIZE: usize = 0x00C;
pub const OFF_FIRST_DATA: usize = 0x010;
pub const OFF_CHECKSUM: usize = 0x014;
pub const OFF_HASH_TABLE: usize = 0x018;
pub const OFF_BM_FLAG: usize = 0x138;
pub const OFF_BM_PAGES: usize = 0x13C;
pub const OFF_BYTE_SIZE: usize = 0x144;
pub const OFF_DATE: usize = 0x1A4;
pub const OFF_NAME_LEN: usize = 0x1B0;
pub const OFF_NAME: usize = 0x1B1;
pub const OFF_DISK_DATE: usize = 0x1D8;
pub const OFF_CREATE_DATE: usize = 0x1E4;
pub const OFF_NEXT_HASH: usize = 0x1F0;
pub const OFF_PARENT: usize = 0x1F4;
pub const OFF_EXTENSION: usize = 0x1F8;
pub const OFF_SEC_TYPE: usize = 0x1FC;

// OFS data block offsets
pub const OFF_SEQ_NUM: usize = 0x008;
pub const OFF_DATA_SIZE: usize = 0x00C;
pub const OFF_NEXT_DATA: usize = 0x010;
pub const OFF_DATA: usize = 0x018;

// Bitmap block offsets
pub const OFF_BM_CHECKSUM: usize = 0x000;
pub const OFF_BM_MAP: usize = 0x004;

// Boot block offsets
pub const OFF_BOOT_CHECKSUM: usize = 0x004;
pub const OFF_BOOT_ROOT: usize = 0x008;
pub const BOOT_HEADER_SIZE: usize = 12;

/// Seconds between the Unix epoch and the AmigaDOS epoch (1978-01-01).
const AMIGA_EPOCH_OFFSET: u64 = 252_460_800;

/// One 512-byte block with big-endian field accessors.
#[derive(Clone)]
pub struct Block(pub [u8; BLOCK_SIZE]);

impl Block {
    pub fn new() -> Self {
        Self([0; BLOCK_SIZE])
    }

    pub fn get_u32(&self, off: usize) -> u32 {
        u32::from_be_bytes([self.0[off], self.0[off + 1], self.0[off + 2], self.0[off + 3]])
    }

    pub fn set_u32(&mut self, off: usize, value: u32) {
        self.0[off..off + 4].copy_from_slice(&value.to_be_bytes());
    }

    /// Hash table / data block pointer slot.
    pub fn table(&self, index: usize) -> u32 {
        self.get_u32(OFF_HASH_TABLE + index * 4)
    }

    pub fn set_table(&mut self, index: usize, value: u32) {
        self.set_u32(OFF_HASH_TABLE + index * 4, value);
    }

    /// BCPL string: length byte followed by up to 30 bytes.
    pub fn name(&self) -> String {
        let len = (self.0[OFF_NAME_LEN] as usize).min(crate::fs::MAX_NAME_LEN);
        String::from_utf8_lossy(&self.0[OFF_NAME..OFF_NAME + len]).into_owned()
    }

    /// Store a name already cut to at most 30 bytes.
    pub fn set_name(&mut self, name: &str) {
        let bytes = name.as_bytes();
        self.0[OFF_NAME_LEN] = bytes.len() as u8;
        self.0[OFF_NAME..OFF_NAME + bytes.len()].copy_from_slice(bytes);
    }

    pub fn set_date(&mut self, off: usize, date: AmigaDate) {
        self.set_u32(off, date.days);
        self.set_u32(off + 4, date.mins);
        self.set_u32(off + 8, date.ticks);
    }

    /// Store the normal checksum at `off`.
    pub fn update_checksum(&mut self, off: usize) {
        self.set_u32(off, 0);
        let sum = normal_sum(&self.0);
        self.set_u32(off, sum.wrapping_neg());
    }

    /// True when all longs (checksum included) sum to zero.
    pub fn checksum_ok(&self) -> bool {
        normal_sum(&self.0) == 0
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}

fn normal_sum(buf: &[u8]) -> u32 {
    buf.chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .fold(0u32, |acc, v| acc.wrapping_add(v))
}

/// Boot block checksum: add with carry over all longs except the
/// checksum itself, inverted.
pub fn boot_checksum(buf: &[u8]) -> u32 {
    let mut sum: u32 = 0;
    for (i, c) in buf.chunks_exact(4).enumerate() {
        if i == OFF_BOOT_CHECKSUM / 4 {
            continue;
        }
        let (next, carry) = sum.overflowing_add(u32::from_be_bytes([c[0], c[1], c[2], c[3]]));
        sum = next + carry as u32;
    }
    !sum
}

/// Hash slot of a name in a directory block (non-international mode).
pub fn hash_name(name: &str) -> usize {
    let bytes = name.as_bytes();
    let mut hash = bytes.len() as u32;
    for &b in bytes {
        hash = (hash.wrapping_mul(13) + b.to_ascii_uppercase() as u32) & 0x7FF;
    }
    hash as usize % HT_SIZE
}

/// AmigaDOS timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AmigaDate {
    /// Days since 1978-01-01.
    pub days: u32,
    /// Minutes since midnight.
    pub mins: u32,
    /// Ticks (1/50 s) within the minute.
    pub ticks: u32,
}

impl AmigaDate {
    /// Convert Unix seconds. Anything before 1978 clamps to the epoch.
    pub fn from_unix(secs: u64) -> Self {
        let secs = secs.saturating_sub(AMIGA_EPOCH_OFFSET);
        let rem = secs % 86_400;
        Self {
            days: (secs / 86_400) as u32,
            mins: (rem / 60) as u32,
            ticks: (rem % 60) as u32 * 50,
        }
    }

    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::from_unix(secs)
    }
}
