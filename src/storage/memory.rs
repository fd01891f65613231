//! In-memory storage: an arena of folder and file nodes.

use std::collections::HashSet;

use crate::error::{CourierError, Result};

use super::{FileId, FolderId, StorageProvider};

/// Default viewer base used for links.
pub const DEFAULT_LINK_BASE: &str = "https://drive.google.com";

#[derive(Debug, Clone)]
enum NodeKind {
    Folder,
    File(Vec<u8>),
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: Option<usize>,
    kind: NodeKind,
}

/// Folder tree held in memory. Node 0 is the root; ids index the arena.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    nodes: Vec<Node>,
    failing: HashSet<String>,
    link_base: String,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_link_base(DEFAULT_LINK_BASE)
    }

    /// Storage whose links start with `link_base`.
    pub fn with_link_base(link_base: &str) -> Self {
        Self {
            nodes: vec![Node {
                name: String::new(),
                parent: None,
                kind: NodeKind::Folder,
            }],
            failing: HashSet::new(),
            link_base: link_base.trim_end_matches('/').to_string(),
        }
    }

    /// Make every later creation of a folder or file named `name` fail.
    pub fn fail_creating(&mut self, name: &str) {
        self.failing.insert(name.to_string());
    }

    /// Number of folders, root included.
    pub fn folder_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::Folder))
            .count()
    }

    /// Number of files.
    pub fn file_count(&self) -> usize {
        self.nodes.len() - self.folder_count()
    }

    /// Content of the file `name` directly inside `folder`.
    pub fn file_content(&self, folder: &FolderId, name: &str) -> Option<&[u8]> {
        let parent = self.folder_index(folder).ok()?;
        self.nodes.iter().find_map(|n| match &n.kind {
            NodeKind::File(data) if n.parent == Some(parent) && n.name == name => {
                Some(data.as_slice())
            }
            _ => None,
        })
    }

    fn folder_index(&self, id: &FolderId) -> Result<usize> {
        let idx = id
            .0
            .strip_prefix("fld")
            .and_then(|n| n.parse::<usize>().ok())
            .ok_or_else(|| CourierError::Host(format!("malformed folder id: {id}")))?;
        match self.nodes.get(idx) {
            Some(Node {
                kind: NodeKind::Folder,
                ..
            }) => Ok(idx),
            _ => Err(CourierError::Host(format!("no such folder: {id}"))),
        }
    }

    fn child(&self, parent: usize, name: &str, want_folder: bool) -> Option<usize> {
        self.nodes.iter().position(|n| {
            n.parent == Some(parent)
                && n.name == name
                && matches!(n.kind, NodeKind::Folder) == want_folder
        })
    }

    fn check_failure(&self, name: &str) -> Result<()> {
        if self.failing.contains(name) {
            return Err(CourierError::Host(format!("storage refused to create '{name}'")));
        }
        Ok(())
    }
}

fn folder_id(idx: usize) -> FolderId {
    FolderId(format!("fld{idx}"))
}

fn file_id(idx: usize) -> FileId {
    FileId(format!("fil{idx}"))
}

impl StorageProvider for MemoryStorage {
    fn root_folder(&self) -> Result<FolderId> {
        Ok(folder_id(0))
    }

    fn find_folder(&self, parent: &FolderId, name: &str) -> Result<Option<FolderId>> {
        let parent = self.folder_index(parent)?;
        Ok(self.child(parent, name, true).map(folder_id))
    }

    fn create_folder(&mut self, parent: &FolderId, name: &str) -> Result<FolderId> {
        let parent = self.folder_index(parent)?;
        self.check_failure(name)?;
        self.nodes.push(Node {
            name: name.to_string(),
            parent: Some(parent),
            kind: NodeKind::Folder,
        });
        Ok(folder_id(self.nodes.len() - 1))
    }

    fn child_folders(&self, parent: &FolderId) -> Result<Vec<(String, FolderId)>> {
        let parent = self.folder_index(parent)?;
        let mut children: Vec<(String, FolderId)> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.parent == Some(parent) && matches!(n.kind, NodeKind::Folder))
            .map(|(i, n)| (n.name.clone(), folder_id(i)))
            .collect();
        children.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(children)
    }

    fn file_exists(&self, folder: &FolderId, name: &str) -> Result<bool> {
        let folder = self.folder_index(folder)?;
        Ok(self.child(folder, name, false).is_some())
    }

    fn create_file(&mut self, folder: &FolderId, name: &str, data: &[u8]) -> Result<FileId> {
        let parent = self.folder_index(folder)?;
        if self.child(parent, name, false).is_some() {
            return Err(CourierError::Collision(name.to_string()));
        }
        self.check_failure(name)?;
        self.nodes.push(Node {
            name: name.to_string(),
            parent: Some(parent),
            kind: NodeKind::File(data.to_vec()),
        });
        Ok(file_id(self.nodes.len() - 1))
    }

    fn file_link(&self, file: &FileId) -> String {
        format!("{}/file/d/{file}/view", self.link_base)
    }

    fn folder_link(&self, folder: &FolderId) -> String {
        format!("{}/drive/folders/{folder}", self.link_base)
    }
}
