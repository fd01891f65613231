//! Slash-delimited folder path resolution.

use tracing::{debug, warn};

use crate::error::{CourierError, Result};

use super::{FolderId, StorageProvider};

/// A folder path resolved to its storage handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFolder {
    pub id: FolderId,
    pub path: String,
}

/// Resolve `path` to a folder, creating missing segments on the way.
///
/// Empty and whitespace-only segments are dropped, so `""`, `"/"` and
/// `"///"` all resolve to the root. Segments are matched exactly as
/// written. Folders created before a failure are left in place.
pub fn resolve_folder_path(
    storage: &mut dyn StorageProvider,
    path: &str,
) -> Result<ResolvedFolder> {
    resolve_inner(storage, path).map_err(|e| {
        warn!(path, error = %e, "Folder path resolution failed");
        CourierError::ResolutionFailure {
            path: path.to_string(),
            reason: e.to_string(),
        }
    })
}

fn resolve_inner(storage: &mut dyn StorageProvider, path: &str) -> Result<ResolvedFolder> {
    let mut current = storage.root_folder()?;

    for segment in path_segments(path) {
        current = match storage.find_folder(&current, segment)? {
            Some(existing) => existing,
            None => {
                let created = storage.create_folder(&current, segment)?;
                debug!(segment, id = %created, "Created folder");
                created
            }
        };
    }

    Ok(ResolvedFolder {
        id: current,
        path: path.to_string(),
    })
}

/// Non-blank segments of a slash path, in order.
pub fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.trim().is_empty())
}
