//! Boot block composition.
//!
//! A boot block is always exactly [`BOOT_BLOCK_SIZE`] bytes. Sources that
//! are too short are zero-padded, sources that are too long are cut.

use std::fmt;
use std::fs;
use std::path::Path;

use log::warn;

use crate::error::{AdfError, AdfResult};

/// Size of the boot block (two floppy blocks).
pub const BOOT_BLOCK_SIZE: usize = 1024;

/// Minimal DOS boot code.
///
/// The first 12 bytes are the disk header, filled in on install.
///
/// ```text
/// 0c: 43fa 0018       lea     0x26(pc),a1
/// 10: 4eae ffa0       jsr     -0x60(a6)      ; FindResident
/// 14: 4a80            tst.l   d0
/// 16: 670a            beq.b   0x22
/// 18: 2040            movea.l d0,a0
/// 1a: 2068 0016       movea.l 0x16(a0),a0    ; rt_Init
/// 1e: 7000            moveq   #0,d0
/// 20: 4e75            rts
/// 22: 70ff            moveq   #-1,d0
/// 24: 4e75            rts
/// 26: "dos.library",0
/// ```
pub const MINIMAL_BOOT_CODE: &[u8] = b"\0\0\0\0\0\0\0\0\0\0\0\0\
\x43\xfa\x00\x18\x4e\xae\xff\xa0\x4a\x80\x67\x0a\
\x20\x40\x20\x68\x00\x16\x70\x00\x4e\x75\x70\xff\
\x4e\x75\
dos.library\0";

/// How a source compared to the boot block size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFit {
    Exact,
    /// Shorter source of the given length, zero-padded.
    Padded(usize),
    /// Longer source of the given length, truncated.
    Truncated(usize),
}

impl SourceFit {
    fn of(len: usize) -> Self {
        match len {
            BOOT_BLOCK_SIZE => SourceFit::Exact,
            n if n < BOOT_BLOCK_SIZE => SourceFit::Padded(n),
            n => SourceFit::Truncated(n),
        }
    }
}

/// A 1024-byte boot block buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct BootBlock([u8; BOOT_BLOCK_SIZE]);

impl BootBlock {
    /// The built-in minimal DOS loader, zero-padded.
    pub fn minimal() -> Self {
        Self::from_code(MINIMAL_BOOT_CODE).0
    }

    /// Fit arbitrary code into a boot block.
    pub fn from_code(code: &[u8]) -> (Self, SourceFit) {
        let mut buf = [0u8; BOOT_BLOCK_SIZE];
        let len = code.len().min(BOOT_BLOCK_SIZE);
        buf[..len].copy_from_slice(&code[..len]);
        (Self(buf), SourceFit::of(code.len()))
    }

    /// Read a boot block from a file.
    ///
    /// A file that is not exactly 1024 bytes is still used, with a warning.
    pub fn from_file(path: &Path) -> AdfResult<(Self, SourceFit)> {
        let code = fs::read(path).map_err(|source| AdfError::BootFile {
            path: path.to_path_buf(),
            source,
        })?;
        let (block, fit) = Self::from_code(&code);
        if fit != SourceFit::Exact {
            warn!("{}", size_mismatch(code.len()));
        }
        Ok((block, fit))
    }

    pub fn as_bytes(&self) -> &[u8; BOOT_BLOCK_SIZE] {
        &self.0
    }

    pub(crate) fn from_raw(buf: [u8; BOOT_BLOCK_SIZE]) -> Self {
        Self(buf)
    }
}

impl fmt::Debug for BootBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let used = self.0.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        f.debug_struct("BootBlock").field("used", &used).finish()
    }
}

fn size_mismatch(len: usize) -> String {
    format!(
        "bootblock file is not {} bytes (it's {} bytes)",
        BOOT_BLOCK_SIZE, len
    )
}
