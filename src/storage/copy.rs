//! Copy attachment content into a storage folder without ever overwriting.

use tracing::{debug, warn};

use crate::error::{CourierError, Result};

use super::{FileId, FolderId, StorageProvider};

/// What a single copy did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// A new file was written.
    Created { file_id: FileId, file_name: String },
    /// A file with the target name was already there; nothing was written.
    AlreadyExists { file_name: String },
    /// Any other failure.
    Failed { reason: String },
}

impl CopyOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }
}

/// Append `.pdf` unless `name` already ends with it (any case).
pub fn ensure_pdf_extension(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(CourierError::InvalidInput("file name is empty".into()));
    }
    if name.to_lowercase().ends_with(".pdf") {
        Ok(name.to_string())
    } else {
        Ok(format!("{name}.pdf"))
    }
}

/// Copy `data` into `folder` as `desired_name` (with a `.pdf` suffix ensured).
pub fn copy_file_to_folder(
    storage: &mut dyn StorageProvider,
    data: &[u8],
    folder: &FolderId,
    desired_name: &str,
) -> CopyOutcome {
    let file_name = match ensure_pdf_extension(desired_name) {
        Ok(name) => name,
        Err(e) => {
            return CopyOutcome::Failed {
                reason: e.to_string(),
            }
        }
    };

    match storage.file_exists(folder, &file_name) {
        Ok(true) => {
            debug!(file = %file_name, folder = %folder, "Target name taken, skipping");
            return CopyOutcome::AlreadyExists { file_name };
        }
        Ok(false) => {}
        Err(e) => {
            warn!(file = %file_name, error = %e, "Existence check failed");
            return CopyOutcome::Failed {
                reason: e.to_string(),
            };
        }
    }

    match storage.create_file(folder, &file_name, data) {
        Ok(file_id) => {
            debug!(file = %file_name, id = %file_id, "Copied file");
            CopyOutcome::Created { file_id, file_name }
        }
        // Lost a race with another writer.
        Err(e) if e.is_collision() => CopyOutcome::AlreadyExists { file_name },
        Err(e) => {
            warn!(file = %file_name, error = %e, "Copy failed");
            CopyOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

/// A file to copy: its original name and content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedBlob {
    pub name: String,
    pub data: Vec<u8>,
}

/// Result of one file of [`copy_multiple`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiCopyResult {
    pub original_name: String,
    pub outcome: CopyOutcome,
}

/// Target names for `files` under an optional custom base name.
///
/// One file takes the base as-is; several become `{base}_{n}.pdf` (1-based,
/// input order) with a trailing `.pdf` of the base dropped first. Without a
/// base every file keeps its own name.
pub fn planned_names(files: &[NamedBlob], custom_base: Option<&str>) -> Vec<String> {
    let base = custom_base.filter(|b| !b.is_empty());
    files
        .iter()
        .enumerate()
        .map(|(i, file)| match base {
            None => file.name.clone(),
            Some(base) if files.len() == 1 => base.to_string(),
            Some(base) => format!("{}_{}.pdf", strip_pdf_suffix(base), i + 1),
        })
        .collect()
}

/// Copy several files into `folder`, named per [`planned_names`].
pub fn copy_multiple(
    storage: &mut dyn StorageProvider,
    files: &[NamedBlob],
    folder: &FolderId,
    custom_base: Option<&str>,
) -> Vec<MultiCopyResult> {
    planned_names(files, custom_base)
        .into_iter()
        .zip(files)
        .map(|(name, file)| MultiCopyResult {
            original_name: file.name.clone(),
            outcome: copy_file_to_folder(storage, &file.data, folder, &name),
        })
        .collect()
}

fn strip_pdf_suffix(name: &str) -> &str {
    let cut = name.len().saturating_sub(4);
    match name.get(cut..) {
        Some(suffix) if suffix.eq_ignore_ascii_case(".pdf") => &name[..cut],
        _ => name,
    }
}
