//! Free block bitmap.

use log::debug;

use super::block::{Block, BM_MAP_SIZE, OFF_BM_CHECKSUM, OFF_BM_MAP};
use crate::error::{AdfError, AdfResult};

/// In-memory copy of the volume bitmap. A set bit marks a free block.
///
/// Blocks 0 and 1 (the boot block) are not tracked; block `n` lives at
/// bit `(n - 2) % 32` of long `(n - 2) / 32`.
pub struct Bitmap {
    map: Vec<u32>,
    block_count: u32,
    root: u32,
}

impl Bitmap {
    /// Every block free.
    pub fn new(block_count: u32, root: u32) -> Self {
        let mut bitmap = Self {
            map: vec![0; BM_MAP_SIZE],
            block_count,
            root,
        };
        for block in 2..block_count {
            bitmap.set_free(block, true);
        }
        bitmap
    }

    /// Load from an on-disk bitmap block.
    pub fn from_block(block: &Block, block_count: u32, root: u32) -> Self {
        let map = (0..BM_MAP_SIZE)
            .map(|i| block.get_u32(OFF_BM_MAP + i * 4))
            .collect();
        Self {
            map,
            block_count,
            root,
        }
    }

    /// Encode as a bitmap block (checksum in long 0).
    pub fn to_block(&self) -> Block {
        let mut block = Block::new();
        for (i, &word) in self.map.iter().enumerate() {
            block.set_u32(OFF_BM_MAP + i * 4, word);
        }
        block.update_checksum(OFF_BM_CHECKSUM);
        block
    }

    pub fn is_free(&self, block: u32) -> bool {
        if block < 2 || block >= self.block_count {
            return false;
        }
        let bit = (block - 2) as usize;
        self.map[bit / 32] & (1 << (bit % 32)) != 0
    }

    pub fn set_free(&mut self, block: u32, free: bool) {
        if block < 2 || block >= self.block_count {
            return;
        }
        let bit = (block - 2) as usize;
        if free {
            self.map[bit / 32] |= 1 << (bit % 32);
        } else {
            self.map[bit / 32] &= !(1 << (bit % 32));
        }
    }

    /// Mark a specific block as used.
    pub fn reserve(&mut self, block: u32) {
        self.set_free(block, false);
    }

    /// Take the next free block, searching upward from the root block and
    /// wrapping around to block 2.
    pub fn allocate(&mut self) -> AdfResult<u32> {
        let block = (self.root..self.block_count)
            .chain(2..self.root)
            .find(|&b| self.is_free(b))
            .ok_or(AdfError::DiskFull)?;
        self.set_free(block, false);
        debug!("allocated block {}", block);
        Ok(block)
    }

    /// Number of free blocks.
    pub fn free_count(&self) -> u32 {
        (2..self.block_count).filter(|&b| self.is_free(b)).count() as u32
    }
}
