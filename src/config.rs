//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$PDFCOURIER_CONFIG` (environment variable)
//! 2. `~/.config/pdfcourier/config.toml` (Linux/macOS)
//!    `%APPDATA%\pdfcourier\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Mailbox source.
    pub mail: MailConfig,
    /// File storage target.
    pub storage: StorageConfig,
    /// Workbook location and layout.
    pub ledger: LedgerLayout,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Mailbox source settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Directory scanned recursively for `.eml` files.
    pub source_dir: Option<PathBuf>,
}

/// File storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the local folder tree attachments are filed into.
    pub root_dir: Option<PathBuf>,
    /// How deep `folders` descends below the root.
    pub max_list_depth: usize,
}

/// Sheet names, search keys, and column headers of the workbook.
///
/// Every name the ledger reads or writes is enumerated here once and the
/// struct is handed to [`crate::ledger::Ledger`] explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerLayout {
    /// Workbook file path.
    pub workbook: Option<PathBuf>,
    /// Sheet holding the search criteria as key/value rows.
    pub search_sheet: String,
    /// Sheet holding one row per candidate attachment.
    pub results_sheet: String,
    /// Sheet holding the storage folder listing.
    pub folders_sheet: String,
    /// Keys recognized in the search sheet.
    pub search_keys: SearchKeys,
    /// Header labels of the results sheet.
    pub headers: ResultHeaders,
}

/// Keys recognized in the first column of the search sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchKeys {
    pub start_date: String,
    pub end_date: String,
    pub keywords: String,
    pub folder_path: String,
}

/// Header labels of the results sheet, in column order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultHeaders {
    pub selected: String,
    pub title: String,
    pub received_at: String,
    pub attachment: String,
    pub save_name: String,
    pub save_folder: String,
    pub result: String,
    pub file_link: String,
    pub folder_link: String,
}

impl ResultHeaders {
    /// Header labels in column order.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.selected.clone(),
            self.title.clone(),
            self.received_at.clone(),
            self.attachment.clone(),
            self.save_name.clone(),
            self.save_folder.clone(),
            self.result.clone(),
            self.file_link.clone(),
            self.folder_link.clone(),
        ]
    }
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: None,
            max_list_depth: 5,
        }
    }
}

impl Default for LedgerLayout {
    fn default() -> Self {
        Self {
            workbook: None,
            search_sheet: "Search".to_string(),
            results_sheet: "Results".to_string(),
            folders_sheet: "Folders".to_string(),
            search_keys: SearchKeys::default(),
            headers: ResultHeaders::default(),
        }
    }
}

impl Default for SearchKeys {
    fn default() -> Self {
        Self {
            start_date: "Start date".to_string(),
            end_date: "End date".to_string(),
            keywords: "Keywords".to_string(),
            folder_path: "Folder path".to_string(),
        }
    }
}

impl Default for ResultHeaders {
    fn default() -> Self {
        Self {
            selected: "Save".to_string(),
            title: "Subject".to_string(),
            received_at: "Received".to_string(),
            attachment: "Attachment".to_string(),
            save_name: "Save as".to_string(),
            save_folder: "Folder".to_string(),
            result: "Result".to_string(),
            file_link: "File link".to_string(),
            folder_link: "Folder link".to_string(),
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("PDFCOURIER_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("pdfcourier").join("config.toml"))
}

/// Base directory for the default mailbox, storage root, and workbook.
fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pdfcourier")
}

/// Mailbox directory: configured value or `<data dir>/mail`.
pub fn mail_dir(config: &Config) -> PathBuf {
    config
        .mail
        .source_dir
        .clone()
        .unwrap_or_else(|| data_dir().join("mail"))
}

/// Storage root: configured value or `<data dir>/files`.
pub fn storage_root(config: &Config) -> PathBuf {
    config
        .storage
        .root_dir
        .clone()
        .unwrap_or_else(|| data_dir().join("files"))
}

/// Workbook file: configured value or `<data dir>/workbook.json`.
pub fn workbook_path(config: &Config) -> PathBuf {
    config
        .ledger
        .workbook
        .clone()
        .unwrap_or_else(|| data_dir().join("workbook.json"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pdfcourier")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("pdfcourier.log")
}
