//! File storage: the provider trait, identifiers, and backends.

pub mod copy;
pub mod local;
pub mod memory;
pub mod resolver;

use std::fmt;

use tracing::debug;

use crate::error::Result;

/// Opaque identifier of a storage folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderId(pub String);

/// Opaque identifier of a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileId(pub String);

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A folder tree that files can be created in.
///
/// Names are matched exactly (case-sensitive). Implementations never
/// overwrite: `create_file` on a taken name fails with
/// [`crate::error::CourierError::Collision`].
pub trait StorageProvider {
    fn root_folder(&self) -> Result<FolderId>;

    /// Direct child folder of `parent` named `name`.
    fn find_folder(&self, parent: &FolderId, name: &str) -> Result<Option<FolderId>>;

    fn create_folder(&mut self, parent: &FolderId, name: &str) -> Result<FolderId>;

    /// Direct child folders of `parent` as `(name, id)`, sorted by name.
    fn child_folders(&self, parent: &FolderId) -> Result<Vec<(String, FolderId)>>;

    fn file_exists(&self, folder: &FolderId, name: &str) -> Result<bool>;

    fn create_file(&mut self, folder: &FolderId, name: &str, data: &[u8]) -> Result<FileId>;

    /// Link an operator can open to view the file.
    fn file_link(&self, file: &FileId) -> String;

    /// Link an operator can open to view the folder.
    fn folder_link(&self, folder: &FolderId) -> String;
}

/// One folder of a storage listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    pub name: String,
    /// Slash path from the root, e.g. `/Invoices/2024`.
    pub path: String,
    pub id: FolderId,
}

/// Walk the folder tree depth-first from the root, up to `max_depth` levels.
///
/// Children are visited in name order, so a parent always precedes its
/// subfolders. The root itself is not listed.
pub fn list_folders(
    storage: &dyn StorageProvider,
    max_depth: usize,
) -> Result<Vec<FolderEntry>> {
    let root = storage.root_folder()?;
    let mut out = Vec::new();
    walk(storage, &root, "", 1, max_depth, &mut out)?;
    debug!(count = out.len(), max_depth, "Listed storage folders");
    Ok(out)
}

fn walk(
    storage: &dyn StorageProvider,
    folder: &FolderId,
    prefix: &str,
    depth: usize,
    max_depth: usize,
    out: &mut Vec<FolderEntry>,
) -> Result<()> {
    if depth > max_depth {
        return Ok(());
    }
    for (name, id) in storage.child_folders(folder)? {
        let path = format!("{prefix}/{name}");
        out.push(FolderEntry {
            name,
            path: path.clone(),
            id: id.clone(),
        });
        walk(storage, &id, &path, depth + 1, max_depth, out)?;
    }
    Ok(())
}
