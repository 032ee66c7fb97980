//! Flatten a directory into the id -> node map file browser widgets expect
//!
//! Node ids come from the filesystem identity of an entry (device + inode), so two paths that
//! reach the same inode (hard links, symlinks back up the tree) collapse to one node. The first
//! path to reach an id keeps it; later ones are skipped, which also stops symlink cycles.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use log::warn;
use serde::Serialize;
use walkdir::WalkDir;

#[derive(Clone, Copy, Debug)]
pub struct TreeLimits {
    /// directories deeper than this below the root are listed but not entered
    pub max_depth: usize,
    /// the walk stops once this many nodes exist
    pub max_nodes: usize,
}

impl Default for TreeLimits {
    fn default() -> Self {
        TreeLimits { max_depth: 32, max_nodes: 100_000 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: String,
    pub name: String,
    pub is_dir: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mod_date: Option<String>,
    /// relative to the storage root
    pub path: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryTree {
    pub root_folder_id: String,
    pub file_map: BTreeMap<String, TreeNode>,
    /// a depth or node guard cut the walk short, or a subdirectory could not be read
    pub truncated: bool,
}

/// Walk `root` and build its node map
///
/// Returns `Ok(None)` when `root` does not exist. Paths in the map are relative to
/// `storage_root`; a root outside the storage root gets paths relative to itself, prefixed with
/// `root_name`.
pub fn build_tree(
    root: &Path,
    root_name: &str,
    storage_root: &Path,
    limits: TreeLimits,
) -> io::Result<Option<DirectoryTree>> {
    let metadata = match fs::metadata(root) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };

    let mut builder = TreeBuilder::new(root, root_name, storage_root, limits);
    let root_id = node_id(root, &metadata);
    builder.insert(TreeNode {
        id: root_id.clone(),
        name: root_name.to_string(),
        is_dir: metadata.is_dir(),
        parent_id: None,
        children_ids: metadata.is_dir().then(Vec::new),
        size: None,
        mod_date: None,
        path: builder.relative(root),
    });

    if metadata.is_dir() {
        builder.walk(root, &root_id)?;
    }

    Ok(Some(DirectoryTree {
        root_folder_id: root_id,
        file_map: builder.nodes,
        truncated: builder.truncated,
    }))
}

struct TreeBuilder<'a> {
    root: &'a Path,
    root_name: &'a str,
    storage_root: &'a Path,
    limits: TreeLimits,
    nodes: BTreeMap<String, TreeNode>,
    /// ids of parents created before the parent itself was seen
    placeholders: HashSet<String>,
    truncated: bool,
}

impl<'a> TreeBuilder<'a> {
    fn new(root: &'a Path, root_name: &'a str, storage_root: &'a Path, limits: TreeLimits) -> Self {
        TreeBuilder {
            root,
            root_name,
            storage_root,
            limits,
            nodes: BTreeMap::new(),
            placeholders: HashSet::new(),
            truncated: false,
        }
    }

    /// Depth first walk below `root`, following symlinks, in file name order
    ///
    /// Only a failure to read `root` itself is an error. Dangling links are skipped; a
    /// subdirectory that can't be read is left out and marks the tree truncated.
    fn walk(&mut self, root: &Path, root_id: &str) -> io::Result<()> {
        let mut dir_ids: HashMap<PathBuf, String> = HashMap::new();
        dir_ids.insert(root.to_path_buf(), root_id.to_string());

        let mut entries = WalkDir::new(root)
            .follow_links(true)
            .min_depth(1)
            .max_depth(self.limits.max_depth)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = entries.next() {
            let entry = match entry {
                Ok(entry) => entry,
                // a symlink back to one of its own ancestors
                Err(err) if err.loop_ancestor().is_some() => continue,
                Err(err) if err.depth() == 0 => return Err(err.into()),
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    match err.io_error().map(io::Error::kind) {
                        Some(io::ErrorKind::NotFound) => warn!("Skipping {}: {}", path.display(), err),
                        _ => {
                            warn!("Leaving {} out of the tree: {}", path.display(), err);
                            self.truncated = true;
                        }
                    }
                    continue;
                }
            };

            if self.nodes.len() >= self.limits.max_nodes {
                warn!("Tree of {} reached {} nodes, stopping", self.root.display(), self.limits.max_nodes);
                self.truncated = true;
                return Ok(());
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    warn!("Skipping {}: {}", entry.path().display(), err);
                    continue;
                }
            };
            let is_dir = metadata.is_dir();
            let id = node_id(entry.path(), &metadata);
            if self.nodes.contains_key(&id) && !self.placeholders.contains(&id) {
                if is_dir {
                    entries.skip_current_dir();
                }
                continue;
            }

            let parent_id = match entry.path().parent() {
                Some(parent) => match dir_ids.get(parent) {
                    Some(id) => id.clone(),
                    None => node_id(parent, &fs::metadata(parent)?),
                },
                None => root_id.to_string(),
            };
            self.insert(TreeNode {
                id: id.clone(),
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
                parent_id: Some(parent_id),
                children_ids: is_dir.then(Vec::new),
                size: (!is_dir).then(|| metadata.len()),
                mod_date: (!is_dir).then(|| mod_date(&metadata)).flatten(),
                path: self.relative(entry.path()),
            });

            if is_dir {
                if entry.depth() >= self.limits.max_depth {
                    warn!("Not descending into {}, depth guard", entry.path().display());
                    self.truncated = true;
                }
                dir_ids.insert(entry.path().to_path_buf(), id);
            }
        }
        Ok(())
    }

    /// Insert a node, tolerating children that arrive before their parent
    ///
    /// A missing parent gets a placeholder that is filled in when the real parent is inserted;
    /// children already collected on the placeholder are kept.
    fn insert(&mut self, node: TreeNode) {
        if let Some(parent_id) = &node.parent_id {
            if !self.nodes.contains_key(parent_id) {
                self.placeholders.insert(parent_id.clone());
            }
            let parent = self
                .nodes
                .entry(parent_id.clone())
                .or_insert_with(|| placeholder(parent_id));
            let children = parent.children_ids.get_or_insert_with(Vec::new);
            if !children.contains(&node.id) {
                children.push(node.id.clone());
            }
        }

        let backfill = self.placeholders.remove(&node.id);
        match self.nodes.get_mut(&node.id) {
            Some(existing) if backfill => {
                let children = existing.children_ids.take();
                *existing = node;
                if let Some(mut collected) = children {
                    let own = existing.children_ids.get_or_insert_with(Vec::new);
                    collected.retain(|id| !own.contains(id));
                    own.extend(collected);
                }
            }
            Some(_) => {}
            None => {
                self.nodes.insert(node.id.clone(), node);
            }
        }
    }

    fn relative(&self, path: &Path) -> PathBuf {
        match path.strip_prefix(self.storage_root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => {
                let inner = path.strip_prefix(self.root).unwrap_or(Path::new(""));
                Path::new(self.root_name).join(inner)
            }
        }
    }
}

fn placeholder(id: &str) -> TreeNode {
    TreeNode {
        id: id.to_string(),
        name: String::new(),
        is_dir: true,
        parent_id: None,
        children_ids: Some(Vec::new()),
        size: None,
        mod_date: None,
        path: PathBuf::new(),
    }
}

fn mod_date(metadata: &Metadata) -> Option<String> {
    let modified: DateTime<Utc> = metadata.modified().ok()?.into();
    Some(modified.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(unix)]
fn node_id(_path: &Path, metadata: &Metadata) -> String {
    use std::os::unix::fs::MetadataExt;
    format!("{:x}-{:x}", metadata.dev(), metadata.ino())
}

/// No inode numbers to lean on, fall back to the canonical path
#[cfg(not(unix))]
fn node_id(path: &Path, _metadata: &Metadata) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()).hash(&mut hasher);
    format!("{:x}", hasher.finish())
}
