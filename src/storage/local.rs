//! Storage backed by a directory tree on the local filesystem.
//!
//! Folder and file identifiers are the first 12 bytes (hex) of the SHA-256
//! of the slash-separated path relative to the root, so they stay stable
//! across runs. Identifiers are resolved through a registry filled by every
//! lookup, listing, and creation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{CourierError, Result};

use super::{FileId, FolderId, StorageProvider};

/// Identifier of the root folder.
const ROOT_ID: &str = "root";

/// Number of digest bytes kept in an identifier.
const ID_BYTES: usize = 12;

/// Folder tree rooted at a local directory.
#[derive(Debug)]
pub struct LocalStorage {
    root: PathBuf,
    known: RefCell<HashMap<String, PathBuf>>,
}

impl LocalStorage {
    /// Open (creating if needed) the directory `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(|e| CourierError::io(root, e))?;
        let root = root.canonicalize().map_err(|e| CourierError::io(root, e))?;
        info!(path = %root.display(), "Opened storage root");
        Ok(Self {
            root,
            known: RefCell::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a known folder.
    pub fn folder_path(&self, folder: &FolderId) -> Result<PathBuf> {
        self.lookup(&folder.0)
            .ok_or_else(|| CourierError::Host(format!("unknown folder id: {folder}")))
    }

    fn lookup(&self, id: &str) -> Option<PathBuf> {
        if id == ROOT_ID {
            return Some(self.root.clone());
        }
        self.known
            .borrow()
            .get(id)
            .map(|relative| self.root.join(relative))
    }

    /// Register `absolute` and return its identifier.
    fn register(&self, absolute: &Path) -> String {
        let relative = absolute.strip_prefix(&self.root).unwrap_or(absolute);
        if relative.as_os_str().is_empty() {
            return ROOT_ID.to_string();
        }
        let id = path_id(relative);
        self.known
            .borrow_mut()
            .entry(id.clone())
            .or_insert_with(|| relative.to_path_buf());
        id
    }
}

/// Stable identifier of a root-relative path.
fn path_id(relative: &Path) -> String {
    let normalized: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let mut hasher = Sha256::new();
    hasher.update(normalized.join("/").as_bytes());
    let digest = hasher.finalize();
    digest
        .iter()
        .take(ID_BYTES)
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Reject names that would escape or alias the parent directory.
fn check_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(CourierError::Host(format!("invalid name for local storage: '{name}'")));
    }
    Ok(())
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

impl StorageProvider for LocalStorage {
    fn root_folder(&self) -> Result<FolderId> {
        Ok(FolderId(ROOT_ID.to_string()))
    }

    fn find_folder(&self, parent: &FolderId, name: &str) -> Result<Option<FolderId>> {
        check_name(name)?;
        let candidate = self.folder_path(parent)?.join(name);
        if candidate.is_dir() {
            Ok(Some(FolderId(self.register(&candidate))))
        } else {
            Ok(None)
        }
    }

    fn create_folder(&mut self, parent: &FolderId, name: &str) -> Result<FolderId> {
        check_name(name)?;
        let path = self.folder_path(parent)?.join(name);
        std::fs::create_dir(&path).map_err(|e| CourierError::io(&path, e))?;
        debug!(path = %path.display(), "Created directory");
        Ok(FolderId(self.register(&path)))
    }

    fn child_folders(&self, parent: &FolderId) -> Result<Vec<(String, FolderId)>> {
        let dir = self.folder_path(parent)?;
        let entries = std::fs::read_dir(&dir).map_err(|e| CourierError::io(&dir, e))?;

        let mut children = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CourierError::io(&dir, e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => children.push((name, FolderId(self.register(&path)))),
                Err(raw) => warn!(name = ?raw, "Skipping folder with non-UTF-8 name"),
            }
        }
        children.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(children)
    }

    fn file_exists(&self, folder: &FolderId, name: &str) -> Result<bool> {
        check_name(name)?;
        Ok(self.folder_path(folder)?.join(name).is_file())
    }

    fn create_file(&mut self, folder: &FolderId, name: &str, data: &[u8]) -> Result<FileId> {
        check_name(name)?;
        let path = self.folder_path(folder)?.join(name);
        if path.is_dir() {
            return Err(CourierError::Host(format!(
                "a directory is in the way: {}",
                path.display()
            )));
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    CourierError::Collision(name.to_string())
                } else {
                    CourierError::io(&path, e)
                }
            })?;

        if let Err(e) = file.write_all(data) {
            drop(file);
            // A truncated file would read as a collision on the next run.
            let _ = std::fs::remove_file(&path);
            return Err(CourierError::io(&path, e));
        }

        debug!(path = %path.display(), bytes = data.len(), "Wrote file");
        Ok(FileId(self.register(&path)))
    }

    fn file_link(&self, file: &FileId) -> String {
        match self.lookup(&file.0) {
            Some(path) => file_url(&path),
            None => file_url(&self.root.join(&file.0)),
        }
    }

    fn folder_link(&self, folder: &FolderId) -> String {
        match self.lookup(&folder.0) {
            Some(path) => file_url(&path),
            None => file_url(&self.root),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::copy::{copy_file_to_folder, CopyOutcome};

    #[test]
    fn test_path_id_is_stable_and_short() {
        let a = path_id(Path::new("Invoices/2024"));
        let b = path_id(Path::new("Invoices/2024"));
        assert_eq!(a, b);
        assert_eq!(a.len(), ID_BYTES * 2);
        assert_ne!(a, path_id(Path::new("Invoices/2025")));
    }

    #[test]
    fn test_check_name() {
        assert!(check_name("ok.pdf").is_ok());
        for bad in ["", ".", "..", "a/b", "a\\b"] {
            assert!(check_name(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_folders_and_files_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = LocalStorage::open(dir.path()).unwrap();
        let root = storage.root_folder().unwrap();

        let sub = storage.create_folder(&root, "Invoices").unwrap();
        assert!(dir.path().join("Invoices").is_dir());
        assert_eq!(storage.find_folder(&root, "Invoices").unwrap(), Some(sub.clone()));

        let file = storage.create_file(&sub, "a.pdf", b"%PDF").unwrap();
        assert_eq!(std::fs::read(dir.path().join("Invoices/a.pdf")).unwrap(), b"%PDF");
        assert!(storage.file_exists(&sub, "a.pdf").unwrap());
        assert!(storage.file_link(&file).starts_with("file://"));
        assert!(storage.file_link(&file).ends_with("a.pdf"));
    }

    #[test]
    fn test_existing_file_is_a_collision() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"original").unwrap();
        let mut storage = LocalStorage::open(dir.path()).unwrap();
        let root = storage.root_folder().unwrap();

        let err = storage.create_file(&root, "a.pdf", b"new").unwrap_err();
        assert!(err.is_collision());
        assert_eq!(std::fs::read(dir.path().join("a.pdf")).unwrap(), b"original");
    }

    #[test]
    fn test_directory_with_file_name_is_not_a_collision() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("x.pdf")).unwrap();
        let mut storage = LocalStorage::open(dir.path()).unwrap();
        let root = storage.root_folder().unwrap();

        assert!(!storage.file_exists(&root, "x.pdf").unwrap());
        let err = storage.create_file(&root, "x.pdf", b"%PDF").unwrap_err();
        assert!(!err.is_collision());

        match copy_file_to_folder(&mut storage, b"%PDF", &root, "x") {
            CopyOutcome::Failed { reason } => assert!(reason.contains("x.pdf"), "{reason}"),
            other => panic!("expected a failure, got {other:?}"),
        }
        assert!(dir.path().join("x.pdf").is_dir());
    }

    #[test]
    fn test_ids_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let first = {
            let mut storage = LocalStorage::open(dir.path()).unwrap();
            let root = storage.root_folder().unwrap();
            storage.create_folder(&root, "x").unwrap()
        };
        let storage = LocalStorage::open(dir.path()).unwrap();
        let root = storage.root_folder().unwrap();
        assert_eq!(storage.find_folder(&root, "x").unwrap(), Some(first));
    }

    #[test]
    fn test_unknown_folder_id() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::open(dir.path()).unwrap();
        let err = storage.child_folders(&FolderId("deadbeef".into())).unwrap_err();
        assert!(matches!(err, CourierError::Host(_)));
    }
}
