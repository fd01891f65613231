//! Ledger rows and their processing state.

use std::fmt;

use chrono::{DateTime, Utc};

/// Stable address of a results row: the 1-based sheet row (row 1 is the header).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowKey(pub usize);

impl RowKey {
    /// First row below the header.
    pub const FIRST_DATA_ROW: usize = 2;

    /// 0-based index into the data rows (header excluded).
    pub fn data_index(self) -> Option<usize> {
        self.0.checked_sub(Self::FIRST_DATA_ROW)
    }

    /// Key for the 0-based data row `index`.
    pub fn from_data_index(index: usize) -> Self {
        Self(index + Self::FIRST_DATA_ROW)
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What happened to a row during review-and-copy.
///
/// Any state other than `Empty` means the row is done and must not be
/// processed again.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProcessingResult {
    /// Not processed yet.
    #[default]
    Empty,
    /// Copied.
    Ok,
    /// A file of the target name already existed.
    Skip(String),
    /// Any other failure.
    Error(String),
    /// Text typed by the operator that is none of the above.
    Manual(String),
}

impl ProcessingResult {
    /// Parse the text of a result cell.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        if trimmed == "OK" {
            return Self::Ok;
        }
        if let Some(reason) = strip_tag(trimmed, "SKIP") {
            return Self::Skip(reason.to_string());
        }
        if let Some(reason) = strip_tag(trimmed, "ERROR") {
            return Self::Error(reason.to_string());
        }
        Self::Manual(text.to_string())
    }

    /// `true` once the row has been handled in any way.
    pub fn is_handled(&self) -> bool {
        !matches!(self, Self::Empty)
    }
}

/// `"TAG"` or `"TAG: reason"` to the reason.
fn strip_tag<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(tag)?;
    if rest.is_empty() {
        return Some("");
    }
    rest.strip_prefix(':').map(str::trim_start)
}

impl fmt::Display for ProcessingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Ok => f.write_str("OK"),
            Self::Skip(reason) => write!(f, "SKIP: {reason}"),
            Self::Error(reason) => write!(f, "ERROR: {reason}"),
            Self::Manual(text) => f.write_str(text),
        }
    }
}

/// A row to append to the results sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRow {
    pub title: String,
    pub received_at: DateTime<Utc>,
    pub attachment_name: String,
    pub save_name: String,
    pub save_folder: String,
    pub folder_link: Option<String>,
}

/// A results row as read back from the sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub key: RowKey,
    pub selected: bool,
    pub title: String,
    /// Received timestamp as displayed (`YYYY-MM-DD HH:MM:SS`).
    pub received_at: String,
    pub attachment_name: String,
    /// Desired file name; blank means "use the attachment name".
    pub save_name: String,
    /// Desired folder path; blank means "use the search default".
    pub save_folder: String,
    pub result: ProcessingResult,
    pub file_link: Option<String>,
    pub folder_link: Option<String>,
}

/// A partial set of fields to write into one row.
///
/// `None` leaves the field as it is.
#[derive(Debug, Clone, PartialEq)]
pub struct RowUpdate {
    pub key: RowKey,
    pub selected: Option<bool>,
    pub save_name: Option<String>,
    pub save_folder: Option<String>,
    pub result: Option<ProcessingResult>,
    pub file_link: Option<String>,
    pub folder_link: Option<String>,
}

impl RowUpdate {
    /// Empty update addressed to `key`.
    pub fn for_row(key: RowKey) -> Self {
        Self {
            key,
            selected: None,
            save_name: None,
            save_folder: None,
            result: None,
            file_link: None,
            folder_link: None,
        }
    }

    /// Update carrying only a result.
    pub fn result(key: RowKey, result: ProcessingResult) -> Self {
        Self {
            result: Some(result),
            ..Self::for_row(key)
        }
    }

    /// Update returning a row to its unprocessed state: blank result,
    /// no file link and no folder link.
    pub fn reset(key: RowKey) -> Self {
        Self {
            result: Some(ProcessingResult::Empty),
            file_link: Some(String::new()),
            folder_link: Some(String::new()),
            ..Self::for_row(key)
        }
    }
}

/// Format a timestamp the way the ledger displays it.
pub fn format_received(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M:%S").to_string()
}
