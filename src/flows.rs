//! The operator-facing flows: search-and-list, review-and-copy, and the
//! folder listing helpers.
//!
//! Each flow reads what it needs from the ledger, talks to the mail and
//! storage providers, and writes its results back in one batch. Failures of
//! a single row are recorded in that row and never abort a batch.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::error::{CourierError, Result};
use crate::ledger::workbook::TabularStore;
use crate::ledger::{FolderSelection, Ledger};
use crate::mail::extract::extract_email_and_attachments;
use crate::mail::MailProvider;
use crate::model::row::{LedgerRow, NewRow, ProcessingResult, RowUpdate};
use crate::query::{query_for, subject_query};
use crate::storage::copy::{copy_file_to_folder, CopyOutcome};
use crate::storage::resolver::resolve_folder_path;
use crate::storage::{list_folders, StorageProvider};

/// Counts reported by [`search_and_list`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchReport {
    /// Threads returned by the mail search.
    pub threads: usize,
    /// Rows appended, one per PDF attachment.
    pub rows: usize,
    /// Combined size of the listed attachments.
    pub bytes: u64,
}

/// Counts reported by [`review_and_copy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub succeeded: usize,
    /// Rows whose target name was already taken.
    pub skipped: usize,
    pub failed: usize,
    /// Selected rows that already carried a result.
    pub already_processed: usize,
}

impl CopyReport {
    /// Rows looked at, handled or not.
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed + self.already_processed
    }
}

/// Create the search and results sheets if needed.
pub fn initialize<T: TabularStore>(ledger: &mut Ledger<T>, today: NaiveDate) -> Result<()> {
    ledger.initialize(today)
}

/// Search the mailbox with the ledger's criteria and list every PDF found.
///
/// The results sheet is cleared first, so rows from a previous search are
/// gone even when this search finds nothing.
pub fn search_and_list<T: TabularStore>(
    mail: &dyn MailProvider,
    storage: &mut dyn StorageProvider,
    ledger: &mut Ledger<T>,
) -> Result<SearchReport> {
    info!("Search flow started");
    ledger.clear()?;

    let criteria = ledger.read_criteria()?;
    debug!(
        start = %criteria.start_date,
        end = %criteria.end_date,
        keywords = ?criteria.keywords,
        folder = %criteria.folder_path,
        "Search criteria"
    );

    let query = query_for(&criteria);
    let threads = mail.search(&query)?;
    if threads.is_empty() {
        info!("No matching mail");
        return Ok(SearchReport::default());
    }
    info!(threads = threads.len(), "Mail search finished");

    let folder = resolve_folder_path(storage, &criteria.folder_path)?;
    let folder_link = storage.folder_link(&folder.id);

    let mut rows = Vec::new();
    let mut bytes = 0u64;
    for thread in &threads {
        let Some(data) = extract_email_and_attachments(thread) else {
            continue;
        };
        for candidate in data.candidates() {
            bytes += candidate.content.len() as u64;
            rows.push(NewRow {
                title: candidate.source_subject,
                received_at: candidate.source_date,
                attachment_name: candidate.attachment_name,
                save_name: String::new(),
                save_folder: criteria.folder_path.clone(),
                folder_link: Some(folder_link.clone()),
            });
        }
    }

    ledger.append(&rows)?;
    let report = SearchReport {
        threads: threads.len(),
        rows: rows.len(),
        bytes,
    };
    info!(threads = report.threads, rows = report.rows, "Search flow finished");
    Ok(report)
}

enum RowOutcome {
    Copied,
    Skipped,
    Failed,
}

/// Copy the attachment of every selected, unprocessed row into storage.
///
/// `progress` is called with `(current, total)` before each row. All result
/// updates are written in a single batch once every row has been tried.
pub fn review_and_copy<T: TabularStore>(
    mail: &dyn MailProvider,
    storage: &mut dyn StorageProvider,
    ledger: &mut Ledger<T>,
    progress: &mut dyn FnMut(usize, usize),
) -> Result<CopyReport> {
    info!("Copy flow started");
    let default_folder = ledger.read_default_folder()?;
    let rows = ledger.list_selected()?;
    let mut report = CopyReport::default();

    if rows.is_empty() {
        info!("No rows selected");
        return Ok(report);
    }

    let total = rows.len();
    let mut updates = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        progress(i + 1, total);
        debug!(row = %row.key, current = i + 1, total, title = %row.title, "Processing row");

        if row.result.is_handled() {
            debug!(row = %row.key, result = %row.result, "Already processed");
            report.already_processed += 1;
            continue;
        }

        let (update, outcome) = match copy_row(mail, storage, row, &default_folder) {
            Ok(done) => done,
            Err(e) => {
                warn!(row = %row.key, error = %e, "Row failed");
                (
                    RowUpdate::result(row.key, ProcessingResult::Error(e.to_string())),
                    RowOutcome::Failed,
                )
            }
        };
        match outcome {
            RowOutcome::Copied => report.succeeded += 1,
            RowOutcome::Skipped => report.skipped += 1,
            RowOutcome::Failed => report.failed += 1,
        }
        updates.push(update);
    }

    ledger.apply_updates(&updates)?;
    info!(
        succeeded = report.succeeded,
        skipped = report.skipped,
        failed = report.failed,
        already_processed = report.already_processed,
        "Copy flow finished"
    );
    Ok(report)
}

/// Re-locate the row's attachment and copy it. Copy outcomes are classified
/// here; lookup and resolution failures are returned as errors.
fn copy_row(
    mail: &dyn MailProvider,
    storage: &mut dyn StorageProvider,
    row: &LedgerRow,
    default_folder: &str,
) -> Result<(RowUpdate, RowOutcome)> {
    let threads = mail.search(&subject_query(&row.title))?;
    let thread = threads
        .first()
        .ok_or_else(|| CourierError::NotFound("message not found".into()))?;

    let data = extract_email_and_attachments(thread)
        .ok_or_else(|| CourierError::NotFound("no PDF attachment in message".into()))?;
    let attachment = data.attachment(&row.attachment_name).ok_or_else(|| {
        CourierError::NotFound(format!("attachment not found: {}", row.attachment_name))
    })?;

    let folder_path = if row.save_folder.trim().is_empty() {
        default_folder
    } else {
        row.save_folder.as_str()
    };
    let folder = resolve_folder_path(storage, folder_path)?;

    let save_name = if row.save_name.trim().is_empty() {
        attachment.name.as_str()
    } else {
        row.save_name.as_str()
    };

    let done = match copy_file_to_folder(storage, &attachment.data, &folder.id, save_name) {
        CopyOutcome::Created { file_id, file_name } => {
            info!(row = %row.key, file = %file_name, folder = %folder.path, "Copied attachment");
            let mut update = RowUpdate::result(row.key, ProcessingResult::Ok);
            update.file_link = Some(storage.file_link(&file_id));
            update.folder_link = Some(storage.folder_link(&folder.id));
            update.save_name = Some(file_name);
            (update, RowOutcome::Copied)
        }
        CopyOutcome::AlreadyExists { file_name } => {
            info!(row = %row.key, file = %file_name, "Target name taken, skipped");
            let reason = CourierError::Collision(file_name).to_string();
            (
                RowUpdate::result(row.key, ProcessingResult::Skip(reason)),
                RowOutcome::Skipped,
            )
        }
        CopyOutcome::Failed { reason } => {
            warn!(row = %row.key, reason = %reason, "Copy failed");
            (
                RowUpdate::result(row.key, ProcessingResult::Error(reason)),
                RowOutcome::Failed,
            )
        }
    };
    Ok(done)
}

/// Write the storage folder tree to the folders sheet. Returns the number of
/// folders listed.
pub fn list_storage_folders<T: TabularStore>(
    storage: &dyn StorageProvider,
    ledger: &mut Ledger<T>,
    max_depth: usize,
) -> Result<usize> {
    let entries = list_folders(storage, max_depth)?;
    ledger.write_folder_list(&entries, &|e| storage.folder_link(&e.id))?;
    Ok(entries.len())
}

/// Make the checked folder of the folders sheet the default destination.
pub fn apply_selected_folder<T: TabularStore>(
    ledger: &mut Ledger<T>,
) -> Result<FolderSelection> {
    let selection = ledger.selected_folder()?.ok_or_else(|| {
        CourierError::InvalidInput("no folder is checked in the folders sheet".into())
    })?;
    ledger.set_folder_path(&selection.path)?;
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerLayout;
    use crate::ledger::workbook::Workbook;
    use crate::mail::memory::MemoryMailbox;
    use crate::mail::{Attachment, Message, Thread};
    use crate::model::row::RowKey;
    use crate::storage::memory::MemoryStorage;
    use chrono::{DateTime, Utc};

    fn thread(id: &str, subject: &str, ts: i64, names: &[&str]) -> Thread {
        Thread {
            id: id.to_string(),
            messages: vec![Message {
                id: format!("<{id}@example.com>"),
                subject: subject.to_string(),
                from: "billing@example.com".to_string(),
                date: DateTime::<Utc>::from_timestamp(ts, 0).unwrap(),
                body: String::new(),
                attachments: names
                    .iter()
                    .map(|n| Attachment {
                        name: n.to_string(),
                        content_type: "application/pdf".to_string(),
                        data: format!("%PDF {n}").into_bytes(),
                    })
                    .collect(),
            }],
        }
    }

    // 2024-03-05 and 2024-03-10
    const MAR_05: i64 = 1_709_640_000;
    const MAR_10: i64 = 1_710_072_000;

    fn setup() -> (MemoryMailbox, MemoryStorage, Ledger<Workbook>) {
        let mail = MemoryMailbox::new(vec![
            thread("t1", "Invoice March", MAR_05, &["inv.pdf", "notes.txt"]),
            thread("t2", "Receipt", MAR_10, &["r1.pdf", "r2.PDF"]),
        ]);
        let mut ledger = Ledger::new(Workbook::in_memory(), LedgerLayout::default());
        ledger
            .initialize(NaiveDate::from_ymd_opt(2024, 3, 17).unwrap())
            .unwrap();
        (mail, MemoryStorage::new(), ledger)
    }

    #[test]
    fn test_search_lists_one_row_per_pdf() {
        let (mail, mut storage, mut ledger) = setup();
        let report = search_and_list(&mail, &mut storage, &mut ledger).unwrap();
        assert_eq!((report.threads, report.rows), (2, 3));
        assert_eq!(report.bytes, 34);

        let rows = ledger.list_rows().unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.attachment_name.as_str()).collect();
        assert_eq!(names, vec!["r1.pdf", "r2.PDF", "inv.pdf"]);
        assert!(rows.iter().all(|r| r.selected && r.save_folder == "/"));
        assert_eq!(
            rows[0].folder_link.as_deref(),
            Some("https://drive.google.com/drive/folders/fld0")
        );
    }

    #[test]
    fn test_search_with_no_match_clears_rows() {
        let (mail, mut storage, mut ledger) = setup();
        search_and_list(&mail, &mut storage, &mut ledger).unwrap();

        let empty = MemoryMailbox::new(Vec::new());
        let report = search_and_list(&empty, &mut storage, &mut ledger).unwrap();
        assert_eq!(report, SearchReport::default());
        assert!(ledger.list_rows().unwrap().is_empty());
    }

    #[test]
    fn test_copy_then_rerun_is_stable() {
        let (mail, mut storage, mut ledger) = setup();
        search_and_list(&mail, &mut storage, &mut ledger).unwrap();

        let mut calls = Vec::new();
        let report =
            review_and_copy(&mail, &mut storage, &mut ledger, &mut |c, t| calls.push((c, t)))
                .unwrap();
        assert_eq!(report.succeeded, 3);
        assert_eq!(calls, vec![(1, 3), (2, 3), (3, 3)]);
        assert_eq!(storage.file_count(), 3);

        let rows = ledger.list_rows().unwrap();
        assert!(rows.iter().all(|r| r.result == ProcessingResult::Ok));
        assert!(rows.iter().all(|r| r.file_link.is_some()));

        let again = review_and_copy(&mail, &mut storage, &mut ledger, &mut |_, _| {}).unwrap();
        assert_eq!(again.already_processed, 3);
        assert_eq!(again.succeeded, 0);
        assert_eq!(ledger.list_rows().unwrap(), rows);
    }

    #[test]
    fn test_collision_is_a_skip() {
        let (mail, mut storage, mut ledger) = setup();
        search_and_list(&mail, &mut storage, &mut ledger).unwrap();
        let root = storage.root_folder().unwrap();
        storage.create_file(&root, "inv.pdf", b"older").unwrap();

        let report = review_and_copy(&mail, &mut storage, &mut ledger, &mut |_, _| {}).unwrap();
        assert_eq!((report.succeeded, report.skipped), (2, 1));
        let row = &ledger.list_rows().unwrap()[2];
        assert_eq!(
            row.result,
            ProcessingResult::Skip("File already exists: inv.pdf".into())
        );
        assert_eq!(storage.file_content(&root, "inv.pdf"), Some(&b"older"[..]));
    }

    #[test]
    fn test_row_save_name_and_folder_win() {
        let (mail, mut storage, mut ledger) = setup();
        search_and_list(&mail, &mut storage, &mut ledger).unwrap();

        let mut edit = RowUpdate::for_row(RowKey(4));
        edit.save_name = Some("march-invoice".into());
        edit.save_folder = Some("/Invoices/2024".into());
        let mut off = RowUpdate::for_row(RowKey(2));
        off.selected = Some(false);
        ledger.apply_updates(&[edit, off]).unwrap();

        let report = review_and_copy(&mail, &mut storage, &mut ledger, &mut |_, _| {}).unwrap();
        assert_eq!(report.total(), 2);

        let rows = ledger.list_rows().unwrap();
        assert_eq!(rows[0].result, ProcessingResult::Empty);
        assert_eq!(rows[2].save_name, "march-invoice.pdf");
        assert_ne!(rows[2].folder_link, rows[1].folder_link);

        let invoices = storage.find_folder(&storage.root_folder().unwrap(), "Invoices").unwrap().unwrap();
        let year = storage.find_folder(&invoices, "2024").unwrap().unwrap();
        assert!(storage.file_content(&year, "march-invoice.pdf").is_some());
    }

    #[test]
    fn test_missing_message_fails_only_its_row() {
        const MAR_08: i64 = 1_709_899_200;
        let mail = MemoryMailbox::new(vec![
            thread("a", "Statement A", MAR_10, &["a.pdf"]),
            thread("b", "Statement B", MAR_08, &["b.pdf"]),
            thread("c", "Statement C", MAR_05, &["c.pdf"]),
        ]);
        let (_, mut storage, mut ledger) = setup();
        search_and_list(&mail, &mut storage, &mut ledger).unwrap();

        let without_b = MemoryMailbox::new(vec![
            thread("a", "Statement A", MAR_10, &["a.pdf"]),
            thread("c", "Statement C", MAR_05, &["c.pdf"]),
        ]);
        let report =
            review_and_copy(&without_b, &mut storage, &mut ledger, &mut |_, _| {}).unwrap();
        assert_eq!((report.succeeded, report.failed), (2, 1));

        let rows = ledger.list_rows().unwrap();
        assert_eq!(rows[0].result, ProcessingResult::Ok);
        assert_eq!(rows[2].result, ProcessingResult::Ok);
        match &rows[1].result {
            ProcessingResult::Error(reason) => assert!(reason.contains("not found"), "{reason}"),
            other => panic!("expected an error, got {other:?}"),
        }
    }

    #[test]
    fn test_subject_with_quote_is_found_again() {
        let mail = MemoryMailbox::new(vec![
            thread("q", r#"Receipt for 12" vinyl"#, MAR_10, &["r.pdf"]),
            thread("p", "Receipt for 12", MAR_05, &["other.pdf"]),
        ]);
        let (_, mut storage, mut ledger) = setup();
        search_and_list(&mail, &mut storage, &mut ledger).unwrap();

        let report = review_and_copy(&mail, &mut storage, &mut ledger, &mut |_, _| {}).unwrap();
        assert_eq!((report.succeeded, report.failed), (2, 0));

        let rows = ledger.list_rows().unwrap();
        assert_eq!(rows[0].title, r#"Receipt for 12" vinyl"#);
        assert_eq!(rows[0].result, ProcessingResult::Ok);
        let root = storage.root_folder().unwrap();
        assert_eq!(storage.file_content(&root, "r.pdf"), Some(&b"%PDF r.pdf"[..]));
        assert!(storage.file_content(&root, "other.pdf").is_some());
    }

    #[test]
    fn test_missing_attachment_is_reported_by_name() {
        let (mail, mut storage, mut ledger) = setup();
        search_and_list(&mail, &mut storage, &mut ledger).unwrap();
        let trimmed = MemoryMailbox::new(vec![
            thread("t1", "Invoice March", MAR_05, &["inv.pdf"]),
            thread("t2", "Receipt", MAR_10, &["r1.pdf"]),
        ]);

        review_and_copy(&trimmed, &mut storage, &mut ledger, &mut |_, _| {}).unwrap();
        assert_eq!(
            ledger.list_rows().unwrap()[1].result,
            ProcessingResult::Error("Not found: attachment not found: r2.PDF".into())
        );
    }

    #[test]
    fn test_folder_listing_and_selection() {
        let (_, mut storage, mut ledger) = setup();
        resolve_folder_path(&mut storage, "/Invoices/2024").unwrap();
        resolve_folder_path(&mut storage, "/Archive").unwrap();

        let listed = list_storage_folders(&storage, &mut ledger, 5).unwrap();
        assert_eq!(listed, 3);
        assert!(matches!(
            apply_selected_folder(&mut ledger),
            Err(CourierError::InvalidInput(_))
        ));
    }
}
