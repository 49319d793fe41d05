//! VolumeFS trait - the interface every image backend implements.

use crate::boot::BootBlock;
use crate::error::{AdfError, AdfResult};

/// Longest file, directory or volume name AmigaDOS stores.
pub const MAX_NAME_LEN: usize = 30;

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Byte size for files, 0 for directories.
    pub size: u64,
    /// Backend key of the entry (header block or node index).
    pub key: u32,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CursorFrame {
    name: String,
    key: u32,
}

/// A location in the volume's directory tree.
///
/// Cursors are plain values: descending returns a new cursor and the
/// caller keeps the old one, so "going back to the parent" is just
/// dropping the child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirCursor {
    frames: Vec<CursorFrame>,
}

impl DirCursor {
    /// Cursor at the volume root.
    pub fn root(key: u32) -> Self {
        Self {
            frames: vec![CursorFrame {
                name: String::new(),
                key,
            }],
        }
    }

    /// Cursor for a subdirectory of this one.
    pub fn child(&self, name: &str, key: u32) -> Self {
        let mut frames = self.frames.clone();
        frames.push(CursorFrame {
            name: name.to_string(),
            key,
        });
        Self { frames }
    }

    /// Cursor for the parent directory. The root is its own parent.
    pub fn parent(&self) -> Self {
        let mut frames = self.frames.clone();
        if frames.len() > 1 {
            frames.pop();
        }
        Self { frames }
    }

    /// Backend key of the directory this cursor points at.
    pub fn key(&self) -> u32 {
        self.frames[self.frames.len() - 1].key
    }

    /// Number of directories below the root.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn is_root(&self) -> bool {
        self.frames.len() == 1
    }

    /// Slash-separated path from the root, empty at the root.
    pub fn path(&self) -> String {
        self.frames[1..]
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Display path of an entry inside this directory.
    pub fn join(&self, name: &str) -> String {
        if self.is_root() {
            name.to_string()
        } else {
            format!("{}/{}", self.path(), name)
        }
    }
}

/// Filesystem interface of a mounted volume.
///
/// Names follow AmigaDOS rules (see [`amiga_name`]) and compare
/// case-insensitively.
pub trait VolumeFS {
    /// Volume label as stored.
    fn label(&self) -> &str;

    /// Cursor at the root directory.
    fn root(&self) -> DirCursor;

    /// Create a directory under `parent` and return a cursor into it.
    fn create_dir(&mut self, parent: &DirCursor, name: &str) -> AdfResult<DirCursor>;

    /// Return a cursor into an existing subdirectory.
    fn open_dir(&self, parent: &DirCursor, name: &str) -> AdfResult<DirCursor>;

    /// Create a file in `dir` holding exactly `data`.
    fn write_file(&mut self, dir: &DirCursor, name: &str, data: &[u8]) -> AdfResult<()>;

    /// Read the full content of a file in `dir`.
    fn read_file(&self, dir: &DirCursor, name: &str) -> AdfResult<Vec<u8>>;

    /// List the entries of `dir`.
    fn list_dir(&self, dir: &DirCursor) -> AdfResult<Vec<DirEntry>>;

    /// Install a boot block.
    fn install_boot_block(&mut self, boot: &BootBlock) -> AdfResult<()>;

    /// The installed boot block, if any.
    fn boot_block(&self) -> Option<BootBlock>;

    /// Upper bound on the file bytes the volume can still hold, when it
    /// has a fixed capacity.
    fn free_bytes(&self) -> Option<u64> {
        None
    }
}

/// Normalize a name for storage on the volume.
///
/// - Rejects empty names and names containing `:` or `/`
/// - Truncates to 30 bytes, never splitting a UTF-8 sequence
///
/// # Examples
/// ```
/// use adf_core::amiga_name;
/// assert_eq!(amiga_name("readme.txt").unwrap(), "readme.txt");
/// assert!(amiga_name("dh0:foo").is_err());
/// ```
pub fn amiga_name(name: &str) -> AdfResult<String> {
    if name.is_empty() || name.contains(':') || name.contains('/') {
        return Err(AdfError::InvalidName(name.to_string()));
    }
    Ok(truncate_name(name).to_string())
}

/// Cut a name down to [`MAX_NAME_LEN`] bytes on a char boundary.
pub(crate) fn truncate_name(name: &str) -> &str {
    if name.len() <= MAX_NAME_LEN {
        return name;
    }
    let mut end = MAX_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Compare two names the way AmigaDOS does (ASCII case folded).
pub fn names_equal(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amiga_name_basic() {
        assert_eq!(amiga_name("hello.txt").unwrap(), "hello.txt");
        assert_eq!(amiga_name("Disk.info").unwrap(), "Disk.info");
    }

    #[test]
    fn test_amiga_name_rejects_separators() {
        assert!(amiga_name("").is_err());
        assert!(amiga_name("a/b").is_err());
        assert!(amiga_name("df0:").is_err());
    }

    #[test]
    fn test_amiga_name_truncation() {
        let long = "abcdefghijklmnopqrstuvwxyz0123456789";
        assert_eq!(amiga_name(long).unwrap(), "abcdefghijklmnopqrstuvwxyz0123");

        // 29 ASCII bytes followed by a two-byte char must not be split
        let name = format!("{}é", "a".repeat(29));
        assert_eq!(amiga_name(&name).unwrap(), "a".repeat(29));
    }

    #[test]
    fn test_names_equal() {
        assert!(names_equal("README", "readme"));
        assert!(!names_equal("readme", "readme2"));
    }

    #[test]
    fn test_cursor_navigation() {
        let root = DirCursor::root(880);
        assert!(root.is_root());
        assert_eq!(root.depth(), 0);
        assert_eq!(root.path(), "");
        assert_eq!(root.parent(), root);

        let docs = root.child("docs", 882);
        let sub = docs.child("sub", 883);
        assert_eq!(sub.key(), 883);
        assert_eq!(sub.depth(), 2);
        assert_eq!(sub.path(), "docs/sub");
        assert_eq!(sub.join("x.bin"), "docs/sub/x.bin");
        assert_eq!(root.join("a.txt"), "a.txt");

        assert_eq!(sub.parent(), docs);
        assert_eq!(sub.parent().parent(), root);
    }
}
