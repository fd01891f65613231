//! Spreadsheet-like tabular store: named sheets of typed cells.
//!
//! Rows are addressed 1-based, as in a spreadsheet. A [`Workbook`] lives in
//! memory and, when opened from a path, is persisted as JSON on
//! [`TabularStore::commit`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CourierError, Result};

/// One typed cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    /// Checkbox.
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Self::Empty
        } else {
            Self::Text(value)
        }
    }

    /// Display text of the cell; empty for `Empty`.
    pub fn to_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    /// `true` only for a checked checkbox.
    pub fn is_checked(&self) -> bool {
        matches!(self, Self::Bool(true))
    }
}

/// Operations the ledger needs from a grid host.
pub trait TabularStore {
    fn has_sheet(&self, sheet: &str) -> bool;

    /// Insert an empty sheet at position `index` (clamped to the sheet count).
    fn insert_sheet(&mut self, sheet: &str, index: usize) -> Result<()>;

    /// Every row of the sheet, header included.
    fn read_all(&self, sheet: &str) -> Result<Vec<Vec<Cell>>>;

    /// Number of the last non-empty row (0 for an empty sheet).
    fn last_row(&self, sheet: &str) -> Result<usize>;

    fn append_rows(&mut self, sheet: &str, rows: &[Vec<Cell>]) -> Result<()>;

    /// Overwrite rows starting at the 1-based `first_row`, growing the sheet if needed.
    fn write_rows(&mut self, sheet: &str, first_row: usize, rows: &[Vec<Cell>]) -> Result<()>;

    /// Delete `count` rows starting at the 1-based `first_row`.
    fn delete_rows(&mut self, sheet: &str, first_row: usize, count: usize) -> Result<()>;

    /// Make pending changes durable.
    fn commit(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WorkbookFile {
    sheets: Vec<Sheet>,
}

/// An ordered set of sheets, optionally backed by a JSON file.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    path: Option<PathBuf>,
    sheets: Vec<Sheet>,
}

impl Workbook {
    /// A workbook that is never written anywhere.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load `path`, or start empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            debug!(path = %path.display(), "Workbook does not exist yet, starting empty");
            return Ok(Self {
                path: Some(path),
                sheets: Vec::new(),
            });
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| CourierError::io(&path, e))?;
        let file: WorkbookFile =
            serde_json::from_str(&contents).map_err(|e| CourierError::Workbook {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        info!(path = %path.display(), sheets = file.sheets.len(), "Loaded workbook");
        Ok(Self {
            path: Some(path),
            sheets: file.sheets,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    fn sheet(&self, name: &str) -> Result<&Sheet> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| CourierError::Host(format!("no sheet named '{name}'")))
    }

    fn sheet_mut(&mut self, name: &str) -> Result<&mut Sheet> {
        self.sheets
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| CourierError::Host(format!("no sheet named '{name}'")))
    }
}

fn row_is_blank(row: &[Cell]) -> bool {
    row.iter().all(|c| *c == Cell::Empty)
}

impl TabularStore for Workbook {
    fn has_sheet(&self, sheet: &str) -> bool {
        self.sheets.iter().any(|s| s.name == sheet)
    }

    fn insert_sheet(&mut self, sheet: &str, index: usize) -> Result<()> {
        if self.has_sheet(sheet) {
            return Err(CourierError::Host(format!("sheet '{sheet}' already exists")));
        }
        let index = index.min(self.sheets.len());
        self.sheets.insert(
            index,
            Sheet {
                name: sheet.to_string(),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    fn read_all(&self, sheet: &str) -> Result<Vec<Vec<Cell>>> {
        let sheet = self.sheet(sheet)?;
        let last = self.last_row(&sheet.name)?;
        Ok(sheet.rows[..last].to_vec())
    }

    fn last_row(&self, sheet: &str) -> Result<usize> {
        let sheet = self.sheet(sheet)?;
        Ok(sheet
            .rows
            .iter()
            .rposition(|r| !row_is_blank(r))
            .map_or(0, |i| i + 1))
    }

    fn append_rows(&mut self, sheet: &str, rows: &[Vec<Cell>]) -> Result<()> {
        let last = self.last_row(sheet)?;
        let sheet = self.sheet_mut(sheet)?;
        sheet.rows.truncate(last);
        sheet.rows.extend(rows.iter().cloned());
        Ok(())
    }

    fn write_rows(&mut self, sheet: &str, first_row: usize, rows: &[Vec<Cell>]) -> Result<()> {
        if first_row == 0 {
            return Err(CourierError::InvalidInput("row numbers start at 1".into()));
        }
        let sheet = self.sheet_mut(sheet)?;
        let start = first_row - 1;
        if sheet.rows.len() < start + rows.len() {
            sheet.rows.resize(start + rows.len(), Vec::new());
        }
        for (offset, row) in rows.iter().enumerate() {
            sheet.rows[start + offset] = row.clone();
        }
        Ok(())
    }

    fn delete_rows(&mut self, sheet: &str, first_row: usize, count: usize) -> Result<()> {
        if first_row == 0 {
            return Err(CourierError::InvalidInput("row numbers start at 1".into()));
        }
        let sheet = self.sheet_mut(sheet)?;
        let start = (first_row - 1).min(sheet.rows.len());
        let end = (start + count).min(sheet.rows.len());
        sheet.rows.drain(start..end);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CourierError::io(parent, e))?;
        }

        let file = WorkbookFile {
            sheets: self.sheets.clone(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|e| CourierError::Workbook {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        // Write-then-rename: the file on disk is always a complete workbook.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| CourierError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| CourierError::io(&path, e))?;
        debug!(path = %path.display(), "Saved workbook");
        Ok(())
    }
}
