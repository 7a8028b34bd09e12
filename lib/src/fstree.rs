use std::sync::Arc;
use std::path::Path;
use std::{fs, fmt};

use rustc_hash::FxHashMap;

use crate::error::{Chainable, Result};
use crate::util::{is_markdown, normalize_path};

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct EntryId(pub(crate) usize);

/// The files and directories below a root path, in walk order.
///
/// The root may itself be a file, in which case the tree has one entry.
#[derive(Debug)]
pub struct FsTree {
    entries: Vec<Entry>,
    map: FxHashMap<Arc<Path>, EntryId>,
}

#[derive(Debug)]
pub struct Entry {
    pub id: EntryId,
    pub path: Arc<Path>,
    pub file_name: String,
    pub file_type: fs::FileType,
    pub parent: Option<EntryId>,
    pub depth: usize,
}

impl FsTree {
    fn new() -> Self {
        Self {
            map: FxHashMap::default(),
            entries: vec![],
        }
    }

    pub fn build<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let metadata = fs::metadata(root).chain_with(|| error! {
            "failed to read search root",
            "path" => root.display(),
        })?;

        let mut tree = FsTree::new();
        if metadata.is_file() {
            let file_name = root.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            tree.insert(root, file_name, metadata.file_type(), None, 0);
            return Ok(tree);
        }

        let walker = jwalk::WalkDir::new(root)
            .follow_links(true)
            .skip_hidden(true)
            .sort(true);

        for entry in walker {
            let entry = entry.chain_with(|| error! {
                "failed to walk directory",
                "search root" => root.display(),
            })?;

            let path = entry.path();
            let parent = tree.map.get(&*normalize_path(&*entry.parent_path)).cloned();
            let file_name = entry.file_name.to_string_lossy().into_owned();
            tree.insert(&path, file_name, entry.file_type, parent, entry.depth);
        }

        tracing::debug!(root = %root.display(), entries = tree.len(), "walked directory");
        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn root(&self) -> &Entry {
        &self[EntryId(0)]
    }

    /// Looks up the entry at `path`, relative to the root directory.
    pub fn get<P: AsRef<Path>>(&self, path: P) -> Option<&Entry> {
        let root = self.root();
        let base = match root.file_type.is_dir() {
            true => &*root.path,
            false => root.path.parent().unwrap_or(Path::new("")),
        };

        let full_path = normalize_path(base.join(path));
        self.map.get(&*full_path).map(|&id| &self[id])
    }

    /// Returns `true` if `path` exists. Paths inside the tree are answered
    /// from the tree; anything else is asked of the file system.
    pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
        let path = normalize_path(path);
        if self.map.contains_key(&*path) {
            return true;
        }

        let root = self.root();
        if root.file_type.is_dir() && path.starts_with(&root.path) {
            return false;
        }

        path.exists()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn files(&self) -> impl Iterator<Item = &Entry> {
        self.iter().filter(|e| e.file_type.is_file())
    }

    /// The markdown files in the tree.
    pub fn pages(&self) -> impl Iterator<Item = &Entry> {
        self.files().filter(|e| is_markdown(&e.file_name))
    }

    fn insert(
        &mut self,
        path: &Path,
        file_name: String,
        file_type: fs::FileType,
        parent: Option<EntryId>,
        depth: usize,
    ) -> EntryId {
        let entry = Entry {
            id: EntryId(self.entries.len()),
            path: Arc::from(normalize_path(path).into_boxed_path()),
            file_name,
            file_type,
            parent,
            depth,
        };

        let id = entry.id;
        self.map.insert(entry.path.clone(), id);
        self.entries.push(entry);
        id
    }
}

impl Entry {
    /// File name without the extension.
    pub fn file_stem(&self) -> &str {
        match self.file_name.rsplit_once('.') {
            Some((left, _)) => left,
            None => &self.file_name,
        }
    }

    /// The extension, if any.
    pub fn file_ext(&self) -> Option<&str> {
        self.file_name.rsplit_once('.').map(|(_, right)| right)
    }

    /// The directory `self` lives in.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new(""))
    }
}

impl std::ops::Index<EntryId> for FsTree {
    type Output = Entry;

    fn index(&self, index: EntryId) -> &Self::Output {
        &self.entries[index.0]
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> tempfile::TempDir {
        let dir = tempfile::Builder::new().prefix("site").tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docs/img")).unwrap();
        fs::write(dir.path().join("docs/index.md"), "# Index\n").unwrap();
        fs::write(dir.path().join("docs/getting-started.md"), "# Start\n").unwrap();
        fs::write(dir.path().join("docs/img/logo.png"), [0u8; 4]).unwrap();
        fs::write(dir.path().join(".hidden.md"), "").unwrap();
        dir
    }

    #[test]
    fn walks_and_finds_pages() {
        let dir = site();
        let tree = FsTree::build(dir.path()).unwrap();

        let mut pages: Vec<_> = tree.pages().map(|e| e.file_name.as_str()).collect();
        pages.sort();
        assert_eq!(pages, ["getting-started.md", "index.md"]);
        assert_eq!(tree.files().count(), 3);

        let start = tree.get("docs/getting-started.md").unwrap();
        assert_eq!(start.file_stem(), "getting-started");
        assert_eq!(start.file_ext(), Some("md"));
        assert_eq!(start.depth, 2);
        assert_eq!(tree[start.parent.unwrap()].file_name, "docs");
    }

    #[test]
    fn contains_answers_inside_and_outside() {
        let dir = site();
        let tree = FsTree::build(dir.path().join("docs")).unwrap();
        assert!(tree.contains(dir.path().join("docs/img/../index.md")));
        assert!(!tree.contains(dir.path().join("docs/missing.md")));
        assert!(tree.contains(dir.path().join(".hidden.md")));
    }

    #[test]
    fn single_file_root() {
        let dir = site();
        let tree = FsTree::build(dir.path().join("docs/index.md")).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.pages().count(), 1);
        assert!(tree.get("index.md").is_some());
        assert!(tree.contains(dir.path().join("docs/getting-started.md")));
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FsTree::build(dir.path().join("nope")).is_err());
    }
}
