//! Filesystem adapter.
//!
//! The build pipeline never touches `std::fs` directly. It talks to a
//! [`FileSystem`] so the same core runs against the local disk ([`LocalFs`])
//! or an in-memory tree ([`MemoryFs`]) in tests.

use std::collections::{BTreeMap, HashSet};
use std::ffi::{OsStr, OsString};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{FsError, FsResult};

/// Kind of a directory entry, as reported without following links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Symlinks, devices, sockets. Never followed.
    Other,
}

/// A single entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: OsString,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn new(name: impl Into<OsString>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Entry name as UTF-8, if representable.
    pub fn name_str(&self) -> Option<&str> {
        self.name.to_str()
    }

    /// True for files whose name ends with `suffix` (case-sensitive).
    pub fn is_file_with_suffix(&self, suffix: &str) -> bool {
        self.is_file() && self.name_str().is_some_and(|n| n.ends_with(suffix))
    }
}

/// Storage capabilities consumed by the build pipeline.
///
/// Removal methods are only called on entries known to exist from a prior
/// listing; implementations need not be idempotent on missing paths.
pub trait FileSystem: Send + Sync {
    /// List the direct children of `dir`, in adapter-defined order.
    fn list_entries(&self, dir: &Path) -> FsResult<Vec<DirEntry>>;

    /// Read a file to completion.
    fn read(&self, path: &Path) -> FsResult<Vec<u8>>;

    /// Read a file as UTF-8 text.
    fn read_to_string(&self, path: &Path) -> FsResult<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|e| FsError::Io {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })
    }

    /// Kind of `path` as seen without following links, or `None` if absent.
    fn entry_kind(&self, path: &Path) -> FsResult<Option<EntryKind>>;

    /// Size of a file in bytes.
    fn file_size(&self, path: &Path) -> FsResult<u64>;

    /// Create or truncate a file with `contents`.
    fn write(&self, path: &Path, contents: &[u8]) -> FsResult<()>;

    /// Append `contents` to a file, creating it if absent.
    fn append(&self, path: &Path, contents: &[u8]) -> FsResult<()>;

    /// Copy a file byte-for-byte. Returns the number of bytes copied.
    fn copy_file(&self, from: &Path, to: &Path) -> FsResult<u64> {
        let bytes = self.read(from)?;
        self.write(to, &bytes)?;
        Ok(bytes.len() as u64)
    }

    /// Create a directory and all missing parents. Succeeds if it exists.
    fn create_dir_all(&self, path: &Path) -> FsResult<()>;

    fn remove_file(&self, path: &Path) -> FsResult<()>;

    /// Remove a directory and everything below it.
    fn remove_dir_all(&self, path: &Path) -> FsResult<()>;
}

/// List `dir` sorted by entry name, so results never depend on adapter order.
pub fn sorted_entries(fs: &dyn FileSystem, dir: &Path) -> FsResult<Vec<DirEntry>> {
    let mut entries = fs.list_entries(dir)?;
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Local disk implementation backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for LocalFs {
    fn list_entries(&self, dir: &Path) -> FsResult<Vec<DirEntry>> {
        let read_dir = fs::read_dir(dir).map_err(|e| FsError::from_io(dir, e))?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| FsError::from_io(dir, e))?;
            // file_type() does not traverse symlinks
            let file_type = entry
                .file_type()
                .map_err(|e| FsError::from_io(entry.path(), e))?;

            entries.push(DirEntry::new(entry.file_name(), kind_of(file_type)));
        }

        Ok(entries)
    }

    fn entry_kind(&self, path: &Path) -> FsResult<Option<EntryKind>> {
        match fs::symlink_metadata(path) {
            Ok(metadata) => Ok(Some(kind_of(metadata.file_type()))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FsError::from_io(path, e)),
        }
    }

    fn file_size(&self, path: &Path) -> FsResult<u64> {
        fs::metadata(path)
            .map(|metadata| metadata.len())
            .map_err(|e| FsError::from_io(path, e))
    }

    fn read(&self, path: &Path) -> FsResult<Vec<u8>> {
        fs::read(path).map_err(|e| FsError::from_io(path, e))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> FsResult<()> {
        fs::write(path, contents).map_err(|e| FsError::from_io(path, e))
    }

    fn append(&self, path: &Path, contents: &[u8]) -> FsResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| FsError::from_io(path, e))?;
        file.write_all(contents)
            .map_err(|e| FsError::from_io(path, e))
    }

    fn copy_file(&self, from: &Path, to: &Path) -> FsResult<u64> {
        let mut source = fs::File::open(from).map_err(|e| FsError::from_io(from, e))?;
        let mut dest = fs::File::create(to).map_err(|e| FsError::from_io(to, e))?;
        io::copy(&mut source, &mut dest).map_err(|e| FsError::from_io(to, e))
    }

    fn create_dir_all(&self, path: &Path) -> FsResult<()> {
        fs::create_dir_all(path).map_err(|e| FsError::from_io(path, e))
    }

    fn remove_file(&self, path: &Path) -> FsResult<()> {
        fs::remove_file(path).map_err(|e| FsError::from_io(path, e))
    }

    fn remove_dir_all(&self, path: &Path) -> FsResult<()> {
        fs::remove_dir_all(path).map_err(|e| FsError::from_io(path, e))
    }
}

fn kind_of(file_type: fs::FileType) -> EntryKind {
    if file_type.is_file() {
        EntryKind::File
    } else if file_type.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::Other
    }
}

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Dir,
    Other,
}

impl Node {
    fn kind(&self) -> EntryKind {
        match self {
            Node::File(_) => EntryKind::File,
            Node::Dir => EntryKind::Directory,
            Node::Other => EntryKind::Other,
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    /// Path -> (insertion sequence, node)
    nodes: BTreeMap<PathBuf, (u64, Node)>,
    next_seq: u64,
    failing: HashSet<PathBuf>,
}

impl MemoryState {
    fn insert(&mut self, path: PathBuf, node: Node) {
        let seq = match self.nodes.get(&path) {
            Some((seq, _)) => *seq,
            None => {
                self.next_seq += 1;
                self.next_seq
            }
        };
        self.nodes.insert(path, (seq, node));
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.nodes.get(path), Some((_, Node::Dir)))
    }

    fn check(&self, path: &Path) -> FsResult<()> {
        if self.failing.contains(path) {
            return Err(FsError::Io {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "injected failure"),
            });
        }
        Ok(())
    }

    fn require_parent(&self, path: &Path) -> FsResult<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !self.is_dir(parent) => {
                Err(FsError::NotFound(path.to_path_buf()))
            }
            _ => Ok(()),
        }
    }
}

/// In-memory filesystem.
///
/// Listings come back in insertion order, not name order, and individual
/// paths can be made to fail with [`MemoryFs::fail_on`].
#[derive(Debug, Default)]
pub struct MemoryFs {
    state: Mutex<MemoryState>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a file and any missing parent directories.
    pub fn add_file(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) {
        let path = path.as_ref();
        let mut state = self.lock();
        if let Some(parent) = path.parent() {
            insert_dirs(&mut state, parent);
        }
        state.insert(path.to_path_buf(), Node::File(contents.as_ref().to_vec()));
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        insert_dirs(&mut self.lock(), path.as_ref());
    }

    /// Create an entry that is neither a file nor a directory.
    pub fn add_other(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut state = self.lock();
        if let Some(parent) = path.parent() {
            insert_dirs(&mut state, parent);
        }
        state.insert(path.to_path_buf(), Node::Other);
    }

    /// Make every operation on `path` fail with a permission error.
    pub fn fail_on(&self, path: impl AsRef<Path>) {
        self.lock().failing.insert(path.as_ref().to_path_buf());
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.lock().nodes.contains_key(path.as_ref())
    }

    /// Contents of a file, if `path` is a file.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.lock().nodes.get(path.as_ref()) {
            Some((_, Node::File(bytes))) => Some(bytes.clone()),
            _ => None,
        }
    }

    /// All file paths below `root`, relative to it, in name order.
    pub fn files_under(&self, root: impl AsRef<Path>) -> Vec<PathBuf> {
        let root = root.as_ref();
        self.lock()
            .nodes
            .iter()
            .filter(|(_, (_, node))| matches!(node, Node::File(_)))
            .filter_map(|(path, _)| path.strip_prefix(root).ok().map(Path::to_path_buf))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A panic while holding the lock leaves the map itself consistent
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn insert_dirs(state: &mut MemoryState, path: &Path) {
    for ancestor in path.ancestors().collect::<Vec<_>>().into_iter().rev() {
        if ancestor.as_os_str().is_empty() || state.is_dir(ancestor) {
            continue;
        }
        state.insert(ancestor.to_path_buf(), Node::Dir);
    }
}

impl FileSystem for MemoryFs {
    fn list_entries(&self, dir: &Path) -> FsResult<Vec<DirEntry>> {
        let state = self.lock();
        state.check(dir)?;
        if !state.is_dir(dir) {
            return Err(FsError::NotFound(dir.to_path_buf()));
        }

        let mut children: Vec<(u64, DirEntry)> = state
            .nodes
            .iter()
            .filter(|(path, _)| path.parent() == Some(dir))
            .filter_map(|(path, (seq, node))| {
                let name: &OsStr = path.file_name()?;
                Some((*seq, DirEntry::new(name, node.kind())))
            })
            .collect();

        children.sort_by_key(|(seq, _)| *seq);
        Ok(children.into_iter().map(|(_, entry)| entry).collect())
    }

    fn entry_kind(&self, path: &Path) -> FsResult<Option<EntryKind>> {
        let state = self.lock();
        state.check(path)?;
        Ok(state.nodes.get(path).map(|(_, node)| node.kind()))
    }

    fn file_size(&self, path: &Path) -> FsResult<u64> {
        self.read(path).map(|bytes| bytes.len() as u64)
    }

    fn read(&self, path: &Path) -> FsResult<Vec<u8>> {
        let state = self.lock();
        state.check(path)?;
        match state.nodes.get(path) {
            Some((_, Node::File(bytes))) => Ok(bytes.clone()),
            Some(_) => Err(FsError::Io {
                path: path.to_path_buf(),
                source: io::Error::other("not a file"),
            }),
            None => Err(FsError::NotFound(path.to_path_buf())),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> FsResult<()> {
        let mut state = self.lock();
        state.check(path)?;
        state.require_parent(path)?;
        if state.is_dir(path) {
            return Err(FsError::Io {
                path: path.to_path_buf(),
                source: io::Error::other("is a directory"),
            });
        }
        state.insert(path.to_path_buf(), Node::File(contents.to_vec()));
        Ok(())
    }

    fn append(&self, path: &Path, contents: &[u8]) -> FsResult<()> {
        let mut state = self.lock();
        state.check(path)?;
        state.require_parent(path)?;
        let mut bytes = match state.nodes.get(path) {
            Some((_, Node::File(bytes))) => bytes.clone(),
            None => Vec::new(),
            Some(_) => {
                return Err(FsError::Io {
                    path: path.to_path_buf(),
                    source: io::Error::other("not a file"),
                })
            }
        };
        bytes.extend_from_slice(contents);
        state.insert(path.to_path_buf(), Node::File(bytes));
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> FsResult<()> {
        let mut state = self.lock();
        state.check(path)?;
        if let Some((_, Node::File(_) | Node::Other)) = state.nodes.get(path) {
            return Err(FsError::Io {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::AlreadyExists, "not a directory"),
            });
        }
        insert_dirs(&mut state, path);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> FsResult<()> {
        let mut state = self.lock();
        state.check(path)?;
        match state.nodes.get(path) {
            Some((_, Node::File(_) | Node::Other)) => {
                state.nodes.remove(path);
                Ok(())
            }
            Some((_, Node::Dir)) => Err(FsError::Io {
                path: path.to_path_buf(),
                source: io::Error::other("is a directory"),
            }),
            None => Err(FsError::NotFound(path.to_path_buf())),
        }
    }

    fn remove_dir_all(&self, path: &Path) -> FsResult<()> {
        let mut state = self.lock();
        state.check(path)?;
        if !state.is_dir(path) {
            return Err(FsError::NotFound(path.to_path_buf()));
        }
        state.nodes.retain(|p, _| !p.starts_with(path));
        Ok(())
    }
}
