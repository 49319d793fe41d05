//! In-memory volume implementation.

use super::volume_fs::{amiga_name, names_equal, DirCursor, DirEntry, EntryKind, VolumeFS};
use crate::boot::BootBlock;
use crate::error::{AdfError, AdfResult};

#[derive(Debug, Clone)]
enum NodeKind {
    Dir { children: Vec<usize> },
    File { data: Vec<u8> },
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    kind: NodeKind,
}

/// Volume that keeps its directory tree in memory.
///
/// Applies the same naming rules as the on-disk backend, which makes it
/// a drop-in target for exercising the importer without encoding blocks.
#[derive(Debug, Clone)]
pub struct MemoryVolume {
    label: String,
    nodes: Vec<Node>,
    boot: Option<BootBlock>,
}

impl MemoryVolume {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            nodes: vec![Node {
                name: String::new(),
                kind: NodeKind::Dir {
                    children: Vec::new(),
                },
            }],
            boot: None,
        }
    }

    /// Total number of directories and files, root excluded.
    pub fn entry_count(&self) -> usize {
        self.nodes.len() - 1
    }

    fn children(&self, key: u32) -> AdfResult<&[usize]> {
        let node = self
            .nodes
            .get(key as usize)
            .ok_or_else(|| AdfError::NotFound(format!("#{}", key)))?;
        match &node.kind {
            NodeKind::Dir { children } => Ok(children),
            NodeKind::File { .. } => Err(AdfError::NotADirectory(node.name.clone())),
        }
    }

    fn find(&self, dir: &DirCursor, name: &str) -> AdfResult<Option<usize>> {
        Ok(self
            .children(dir.key())?
            .iter()
            .copied()
            .find(|&idx| names_equal(&self.nodes[idx].name, name)))
    }

    fn insert(&mut self, dir: &DirCursor, name: &str, kind: NodeKind) -> AdfResult<usize> {
        let name = amiga_name(name)?;
        if self.find(dir, &name)?.is_some() {
            return Err(AdfError::AlreadyExists(dir.join(&name)));
        }
        let idx = self.nodes.len();
        self.nodes.push(Node { name, kind });
        if let NodeKind::Dir { children } = &mut self.nodes[dir.key() as usize].kind {
            children.push(idx);
        }
        Ok(idx)
    }
}

impl VolumeFS for MemoryVolume {
    fn label(&self) -> &str {
        &self.label
    }

    fn root(&self) -> DirCursor {
        DirCursor::root(0)
    }

    fn create_dir(&mut self, parent: &DirCursor, name: &str) -> AdfResult<DirCursor> {
        let idx = self.insert(
            parent,
            name,
            NodeKind::Dir {
                children: Vec::new(),
            },
        )?;
        Ok(parent.child(&self.nodes[idx].name, idx as u32))
    }

    fn open_dir(&self, parent: &DirCursor, name: &str) -> AdfResult<DirCursor> {
        let idx = self
            .find(parent, name)?
            .ok_or_else(|| AdfError::NotFound(parent.join(name)))?;
        match self.nodes[idx].kind {
            NodeKind::Dir { .. } => Ok(parent.child(&self.nodes[idx].name, idx as u32)),
            NodeKind::File { .. } => Err(AdfError::NotADirectory(parent.join(name))),
        }
    }

    fn write_file(&mut self, dir: &DirCursor, name: &str, data: &[u8]) -> AdfResult<()> {
        self.insert(dir, name, NodeKind::File { data: data.to_vec() })?;
        Ok(())
    }

    fn read_file(&self, dir: &DirCursor, name: &str) -> AdfResult<Vec<u8>> {
        let idx = self
            .find(dir, name)?
            .ok_or_else(|| AdfError::NotFound(dir.join(name)))?;
        match &self.nodes[idx].kind {
            NodeKind::File { data } => Ok(data.clone()),
            NodeKind::Dir { .. } => Err(AdfError::NotAFile(dir.join(name))),
        }
    }

    fn list_dir(&self, dir: &DirCursor) -> AdfResult<Vec<DirEntry>> {
        Ok(self
            .children(dir.key())?
            .iter()
            .map(|&idx| {
                let node = &self.nodes[idx];
                let (kind, size) = match &node.kind {
                    NodeKind::Dir { .. } => (EntryKind::Dir, 0),
                    NodeKind::File { data } => (EntryKind::File, data.len() as u64),
                };
                DirEntry {
                    name: node.name.clone(),
                    kind,
                    size,
                    key: idx as u32,
                }
            })
            .collect())
    }

    fn install_boot_block(&mut self, boot: &BootBlock) -> AdfResult<()> {
        self.boot = Some(boot.clone());
        Ok(())
    }

    fn boot_block(&self) -> Option<BootBlock> {
        self.boot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_file() {
        let mut vol = MemoryVolume::new("test");
        let root = vol.root();
        vol.write_file(&root, "a.txt", b"hello").unwrap();

        assert_eq!(vol.read_file(&root, "a.txt").unwrap(), b"hello");
        assert_eq!(vol.read_file(&root, "A.TXT").unwrap(), b"hello"); // Case insensitive
        assert!(matches!(
            vol.read_file(&root, "b.txt"),
            Err(AdfError::NotFound(_))
        ));
    }

    #[test]
    fn test_nested_dirs() {
        let mut vol = MemoryVolume::new("test");
        let root = vol.root();
        let docs = vol.create_dir(&root, "docs").unwrap();
        let sub = vol.create_dir(&docs, "sub").unwrap();
        vol.write_file(&sub, "x.bin", &[0, 1, 2]).unwrap();

        assert_eq!(sub.path(), "docs/sub");
        let reopened = vol.open_dir(&vol.open_dir(&root, "DOCS").unwrap(), "sub").unwrap();
        assert_eq!(reopened, sub);
        assert_eq!(vol.read_file(&reopened, "x.bin").unwrap(), vec![0, 1, 2]);
        assert_eq!(vol.entry_count(), 3);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut vol = MemoryVolume::new("test");
        let root = vol.root();
        vol.create_dir(&root, "Docs").unwrap();

        assert!(matches!(
            vol.create_dir(&root, "docs"),
            Err(AdfError::AlreadyExists(_))
        ));
        assert!(matches!(
            vol.write_file(&root, "DOCS", b""),
            Err(AdfError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_list_dir_kinds() {
        let mut vol = MemoryVolume::new("test");
        let root = vol.root();
        vol.create_dir(&root, "d").unwrap();
        vol.write_file(&root, "f", b"1234").unwrap();

        let entries = vol.list_dir(&root).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.name == "d" && e.is_dir()));
        assert!(entries.iter().any(|e| e.name == "f" && e.size == 4));
        assert!(matches!(
            vol.open_dir(&root, "f"),
            Err(AdfError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_boot_block_stored_unchanged() {
        let mut vol = MemoryVolume::new("test");
        assert!(vol.boot_block().is_none());

        let boot = BootBlock::minimal();
        vol.install_boot_block(&boot).unwrap();
        assert_eq!(vol.boot_block(), Some(boot));
    }
}
