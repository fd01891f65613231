//! The results ledger: search criteria, candidate rows, and the folder listing,
//! kept in three sheets of a [`TabularStore`].
//!
//! The ledger is the only record of what has been processed. Rows are read and
//! written in whole batches; there is no locking, so two runs against the same
//! workbook may lose each other's updates.

pub mod csv;
pub mod workbook;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::config::LedgerLayout;
use crate::error::{CourierError, Result};
use crate::model::criteria::{
    normalize_folder_path, parse_date_input, parse_keywords, SearchCriteria,
};
use crate::model::row::{format_received, LedgerRow, NewRow, ProcessingResult, RowKey, RowUpdate};
use crate::storage::FolderEntry;

use self::workbook::{Cell, TabularStore};

/// Number of columns of the results sheet.
pub const RESULT_COLUMNS: usize = 9;

const COL_SELECTED: usize = 0;
const COL_TITLE: usize = 1;
const COL_RECEIVED: usize = 2;
const COL_ATTACHMENT: usize = 3;
const COL_SAVE_NAME: usize = 4;
const COL_SAVE_FOLDER: usize = 5;
const COL_RESULT: usize = 6;
const COL_FILE_LINK: usize = 7;
const COL_FOLDER_LINK: usize = 8;

const SEARCH_HEADER: [&str; 2] = ["Key", "Value"];
const FOLDERS_HEADER: [&str; 4] = ["Select", "Name", "Path", "Link"];

/// A folder picked in the folders sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderSelection {
    pub name: String,
    pub path: String,
}

/// Typed access to the workbook sheets.
pub struct Ledger<S: TabularStore> {
    store: S,
    layout: LedgerLayout,
}

impl<S: TabularStore> Ledger<S> {
    pub fn new(store: S, layout: LedgerLayout) -> Self {
        Self { store, layout }
    }

    pub fn layout(&self) -> &LedgerLayout {
        &self.layout
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    // ── Sheet setup ─────────────────────────────────────────────

    /// Create the search and results sheets if they are missing.
    ///
    /// A new search sheet gets default values: the first day of `today`'s
    /// month through `today`, no keywords, and the root folder.
    pub fn initialize(&mut self, today: NaiveDate) -> Result<()> {
        self.ensure_search_sheet(today)?;
        self.ensure_results_sheet()?;
        self.store.commit()?;
        info!("Workbook initialized");
        Ok(())
    }

    fn ensure_search_sheet(&mut self, today: NaiveDate) -> Result<()> {
        let name = self.layout.search_sheet.clone();
        if self.store.has_sheet(&name) {
            return Ok(());
        }
        self.store.insert_sheet(&name, 0)?;

        let defaults = SearchCriteria::default_for(today);
        let keys = &self.layout.search_keys;
        let rows = vec![
            text_row(&SEARCH_HEADER),
            vec![
                Cell::text(&keys.start_date),
                Cell::text(defaults.start_date.format("%Y-%m-%d").to_string()),
            ],
            vec![
                Cell::text(&keys.end_date),
                Cell::text(defaults.end_date.format("%Y-%m-%d").to_string()),
            ],
            vec![Cell::text(&keys.keywords), Cell::Empty],
            vec![Cell::text(&keys.folder_path), Cell::text(defaults.folder_path)],
        ];
        self.store.append_rows(&name, &rows)?;
        debug!(sheet = %name, "Created search sheet");
        Ok(())
    }

    fn ensure_results_sheet(&mut self) -> Result<()> {
        let name = self.layout.results_sheet.clone();
        if self.store.has_sheet(&name) {
            return Ok(());
        }
        self.store.insert_sheet(&name, 1)?;
        let header: Vec<Cell> = self
            .layout
            .headers
            .to_row()
            .into_iter()
            .map(Cell::text)
            .collect();
        self.store.append_rows(&name, &[header])?;
        debug!(sheet = %name, "Created results sheet");
        Ok(())
    }

    fn require_sheet(&self, name: &str) -> Result<()> {
        if self.store.has_sheet(name) {
            Ok(())
        } else {
            Err(CourierError::InvalidInput(format!(
                "sheet '{name}' is missing; initialize the workbook first"
            )))
        }
    }

    // ── Search criteria ─────────────────────────────────────────

    /// Read and validate the search criteria.
    pub fn read_criteria(&self) -> Result<SearchCriteria> {
        let keys = &self.layout.search_keys;
        let mut start = None;
        let mut end = None;
        let mut keywords = Vec::new();
        let mut folder = String::new();

        for (key, value) in self.search_pairs()? {
            if key == keys.start_date {
                start = Some(parse_date_input(&value)?);
            } else if key == keys.end_date {
                end = Some(parse_date_input(&value)?);
            } else if key == keys.keywords {
                keywords = parse_keywords(&value);
            } else if key == keys.folder_path {
                folder = value;
            }
        }

        let start =
            start.ok_or_else(|| CourierError::InvalidInput("start date is missing".into()))?;
        let end = end.ok_or_else(|| CourierError::InvalidInput("end date is missing".into()))?;
        SearchCriteria::new(start, end, keywords, &folder)
    }

    /// The default destination folder alone, without validating the dates.
    pub fn read_default_folder(&self) -> Result<String> {
        let key = &self.layout.search_keys.folder_path;
        let value = self
            .search_pairs()?
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .unwrap_or_default();
        Ok(normalize_folder_path(&value))
    }

    /// Overwrite every criteria value.
    pub fn write_criteria(&mut self, criteria: &SearchCriteria) -> Result<()> {
        criteria.validate()?;
        let keys = self.layout.search_keys.clone();
        self.set_search_value(&keys.start_date, &criteria.start_date.format("%Y-%m-%d").to_string())?;
        self.set_search_value(&keys.end_date, &criteria.end_date.format("%Y-%m-%d").to_string())?;
        self.set_search_value(&keys.keywords, &criteria.keywords.join(", "))?;
        self.set_search_value(&keys.folder_path, &criteria.folder_path)?;
        self.store.commit()
    }

    /// Write the default destination folder.
    pub fn set_folder_path(&mut self, path: &str) -> Result<()> {
        let key = self.layout.search_keys.folder_path.clone();
        self.set_search_value(&key, &normalize_folder_path(path))?;
        self.store.commit()?;
        info!(path, "Default folder updated");
        Ok(())
    }

    /// `(key, value)` text pairs below the search sheet header.
    fn search_pairs(&self) -> Result<Vec<(String, String)>> {
        let sheet = &self.layout.search_sheet;
        self.require_sheet(sheet)?;
        Ok(self
            .store
            .read_all(sheet)?
            .into_iter()
            .skip(1)
            .map(|row| {
                let key = row.first().map(Cell::to_text).unwrap_or_default();
                let value = row.get(1).map(Cell::to_text).unwrap_or_default();
                (key, value)
            })
            .collect())
    }

    /// Set the value of `key`, appending the key row when it is absent.
    fn set_search_value(&mut self, key: &str, value: &str) -> Result<()> {
        let sheet = self.layout.search_sheet.clone();
        self.require_sheet(&sheet)?;
        let rows = self.store.read_all(&sheet)?;
        let row = vec![Cell::text(key), Cell::text(value)];

        match rows
            .iter()
            .skip(1)
            .position(|r| r.first().map(Cell::to_text).as_deref() == Some(key))
        {
            Some(i) => self.store.write_rows(&sheet, i + 2, &[row]),
            None => self.store.append_rows(&sheet, &[row]),
        }
    }

    // ── Results rows ────────────────────────────────────────────

    /// Remove every data row, keeping the header.
    pub fn clear(&mut self) -> Result<()> {
        let sheet = self.layout.results_sheet.clone();
        self.ensure_results_sheet()?;
        let last = self.store.last_row(&sheet)?;
        if last > 1 {
            self.store.delete_rows(&sheet, 2, last - 1)?;
        }
        self.store.commit()?;
        debug!(removed = last.saturating_sub(1), "Cleared results");
        Ok(())
    }

    /// Append rows in one batch, in order, each selected. Returns their keys.
    pub fn append(&mut self, rows: &[NewRow]) -> Result<Vec<RowKey>> {
        let sheet = self.layout.results_sheet.clone();
        self.ensure_results_sheet()?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let first = self.store.last_row(&sheet)? + 1;
        let cells: Vec<Vec<Cell>> = rows.iter().map(new_row_cells).collect();
        self.store.append_rows(&sheet, &cells)?;
        self.store.commit()?;

        info!(count = rows.len(), "Appended result rows");
        Ok((first..first + rows.len()).map(RowKey).collect())
    }

    /// Every data row of the results sheet.
    pub fn list_rows(&self) -> Result<Vec<LedgerRow>> {
        let sheet = &self.layout.results_sheet;
        self.require_sheet(sheet)?;
        Ok(self
            .store
            .read_all(sheet)?
            .iter()
            .skip(1)
            .enumerate()
            .map(|(i, cells)| parse_row(RowKey::from_data_index(i), cells))
            .collect())
    }

    /// Rows whose checkbox is checked.
    pub fn list_selected(&self) -> Result<Vec<LedgerRow>> {
        Ok(self
            .list_rows()?
            .into_iter()
            .filter(|r| r.selected)
            .collect())
    }

    /// Apply all `updates` in a single write.
    ///
    /// The updated table is computed in memory first; an update addressing a
    /// row that does not exist aborts before anything is written.
    pub fn apply_updates(&mut self, updates: &[RowUpdate]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let sheet = self.layout.results_sheet.clone();
        self.require_sheet(&sheet)?;

        let mut table = self.store.read_all(&sheet)?;
        let data_rows = table.len().saturating_sub(1);
        for update in updates {
            match update.key.data_index() {
                Some(i) if i < data_rows => {}
                _ => {
                    return Err(CourierError::InvalidInput(format!(
                        "row {} is not a results row",
                        update.key
                    )))
                }
            }
        }

        let mut first = usize::MAX;
        let mut last = 0;
        for update in updates {
            let idx = update.key.0 - 1;
            let row = &mut table[idx];
            if row.len() < RESULT_COLUMNS {
                row.resize(RESULT_COLUMNS, Cell::Empty);
            }
            apply_update(row, update);
            first = first.min(idx);
            last = last.max(idx);
        }

        self.store.write_rows(&sheet, first + 1, &table[first..=last])?;
        self.store.commit()?;
        info!(count = updates.len(), "Applied row updates");
        Ok(())
    }

    // ── Folder listing ──────────────────────────────────────────

    /// Replace the folders sheet with `entries`, all unchecked.
    pub fn write_folder_list(
        &mut self,
        entries: &[FolderEntry],
        link: &dyn Fn(&FolderEntry) -> String,
    ) -> Result<()> {
        let sheet = self.layout.folders_sheet.clone();
        if self.store.has_sheet(&sheet) {
            let last = self.store.last_row(&sheet)?;
            if last > 0 {
                self.store.delete_rows(&sheet, 1, last)?;
            }
        } else {
            self.store.insert_sheet(&sheet, 2)?;
        }

        let mut rows = vec![text_row(&FOLDERS_HEADER)];
        rows.extend(entries.iter().map(|e| {
            vec![
                Cell::Bool(false),
                Cell::text(&e.name),
                Cell::text(&e.path),
                Cell::text(link(e)),
            ]
        }));
        self.store.append_rows(&sheet, &rows)?;
        self.store.commit()?;
        info!(count = entries.len(), "Wrote folder list");
        Ok(())
    }

    /// The first checked folder of the folders sheet, if any.
    pub fn selected_folder(&self) -> Result<Option<FolderSelection>> {
        let sheet = &self.layout.folders_sheet;
        self.require_sheet(sheet)?;
        let checked: Vec<FolderSelection> = self
            .store
            .read_all(sheet)?
            .iter()
            .skip(1)
            .filter(|r| r.first().is_some_and(Cell::is_checked))
            .map(|r| FolderSelection {
                name: cell_text(r, 1),
                path: cell_text(r, 2),
            })
            .collect();

        if checked.len() > 1 {
            warn!(count = checked.len(), "Several folders checked, using the first");
        }
        Ok(checked.into_iter().next())
    }
}

fn text_row(labels: &[&str]) -> Vec<Cell> {
    labels.iter().map(|l| Cell::text(*l)).collect()
}

fn cell_text(row: &[Cell], col: usize) -> String {
    row.get(col).map(Cell::to_text).unwrap_or_default()
}

fn optional_text(row: &[Cell], col: usize) -> Option<String> {
    Some(cell_text(row, col)).filter(|s| !s.is_empty())
}

fn new_row_cells(row: &NewRow) -> Vec<Cell> {
    let mut cells = vec![Cell::Empty; RESULT_COLUMNS];
    cells[COL_SELECTED] = Cell::Bool(true);
    cells[COL_TITLE] = Cell::text(&row.title);
    cells[COL_RECEIVED] = Cell::text(format_received(&row.received_at));
    cells[COL_ATTACHMENT] = Cell::text(&row.attachment_name);
    cells[COL_SAVE_NAME] = Cell::text(&row.save_name);
    cells[COL_SAVE_FOLDER] = Cell::text(&row.save_folder);
    cells[COL_FOLDER_LINK] = Cell::text(row.folder_link.clone().unwrap_or_default());
    cells
}

fn parse_row(key: RowKey, cells: &[Cell]) -> LedgerRow {
    LedgerRow {
        key,
        selected: cells.get(COL_SELECTED).is_some_and(Cell::is_checked),
        title: cell_text(cells, COL_TITLE),
        received_at: cell_text(cells, COL_RECEIVED),
        attachment_name: cell_text(cells, COL_ATTACHMENT),
        save_name: cell_text(cells, COL_SAVE_NAME),
        save_folder: cell_text(cells, COL_SAVE_FOLDER),
        result: ProcessingResult::parse(&cell_text(cells, COL_RESULT)),
        file_link: optional_text(cells, COL_FILE_LINK),
        folder_link: optional_text(cells, COL_FOLDER_LINK),
    }
}

fn apply_update(row: &mut [Cell], update: &RowUpdate) {
    if let Some(selected) = update.selected {
        row[COL_SELECTED] = Cell::Bool(selected);
    }
    if let Some(ref name) = update.save_name {
        row[COL_SAVE_NAME] = Cell::text(name);
    }
    if let Some(ref folder) = update.save_folder {
        row[COL_SAVE_FOLDER] = Cell::text(folder);
    }
    if let Some(ref result) = update.result {
        row[COL_RESULT] = Cell::text(result.to_string());
    }
    if let Some(ref link) = update.file_link {
        row[COL_FILE_LINK] = Cell::text(link);
    }
    if let Some(ref link) = update.folder_link {
        row[COL_FOLDER_LINK] = Cell::text(link);
    }
}
