//! End-to-end tests over the local backends: an `.eml` directory, a folder
//! tree on disk, and a JSON workbook.

use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use chrono::NaiveDate;
use predicates::prelude::*;

use pdfcourier::config::LedgerLayout;
use pdfcourier::error::CourierError;
use pdfcourier::flows;
use pdfcourier::ledger::csv::export_results_csv;
use pdfcourier::ledger::workbook::Workbook;
use pdfcourier::ledger::Ledger;
use pdfcourier::mail::eml_dir::EmlDirectory;
use pdfcourier::mail::MailProvider;
use pdfcourier::model::criteria::SearchCriteria;
use pdfcourier::model::row::{ProcessingResult, RowKey, RowUpdate};
use pdfcourier::query::build_search_query;
use pdfcourier::storage::local::LocalStorage;
use pdfcourier::storage::StorageProvider;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn january(keywords: &[&str], folder: &str) -> SearchCriteria {
    SearchCriteria::new(
        date(2024, 1, 1),
        date(2024, 1, 31),
        keywords.iter().map(|k| k.to_string()).collect(),
        folder,
    )
    .unwrap()
}

/// A workbook at `path`, initialized and holding `criteria`.
fn ledger_at(path: &Path, criteria: &SearchCriteria) -> Ledger<Workbook> {
    let mut ledger = Ledger::new(Workbook::open(path).unwrap(), LedgerLayout::default());
    flows::initialize(&mut ledger, date(2024, 2, 5)).unwrap();
    ledger.write_criteria(criteria).unwrap();
    ledger
}

fn reopen(path: &Path) -> Ledger<Workbook> {
    Ledger::new(Workbook::open(path).unwrap(), LedgerLayout::default())
}

// ─── Mail directory ─────────────────────────────────────────────────

#[test]
fn test_eml_directory_search_window() {
    let mail = EmlDirectory::open(fixture("mail")).unwrap();
    assert_eq!(mail.threads().len(), 4);

    let query = build_search_query(date(2024, 1, 1), date(2024, 1, 31), &[]);
    let threads = mail.search(&query).unwrap();
    let subjects: Vec<&str> = threads
        .iter()
        .map(|t| t.messages[0].subject.as_str())
        .collect();
    assert_eq!(subjects, vec!["Receipt 1001", "Invoice January"]);

    let query = build_search_query(date(2024, 1, 1), date(2024, 1, 31), &["invoice".into()]);
    assert_eq!(mail.search(&query).unwrap().len(), 1);

    let query = build_search_query(date(2023, 12, 1), date(2024, 1, 31), &["invoice".into()]);
    assert_eq!(mail.search(&query).unwrap().len(), 2);
}

#[test]
fn test_subject_lookup_is_exact() {
    let mail = EmlDirectory::open(fixture("mail")).unwrap();
    assert_eq!(mail.search("subject:\"invoice january\"").unwrap().len(), 1);
    assert!(mail.search("subject:\"Invoice\"").unwrap().is_empty());
}

// ─── Full round ─────────────────────────────────────────────────────

#[test]
fn test_search_then_copy_files_attachments() {
    let temp = assert_fs::TempDir::new().unwrap();
    let wb_path = temp.child("workbook.json");
    let files = temp.child("files");

    let mail = EmlDirectory::open(fixture("mail")).unwrap();
    let mut storage = LocalStorage::open(files.path()).unwrap();
    let mut ledger = ledger_at(wb_path.path(), &january(&[], "/Invoices/2024"));

    let report = flows::search_and_list(&mail, &mut storage, &mut ledger).unwrap();
    assert_eq!((report.threads, report.rows), (2, 3));
    files.child("Invoices/2024").assert(predicate::path::is_dir());

    let rows = reopen(wb_path.path()).list_rows().unwrap();
    let names: Vec<&str> = rows.iter().map(|r| r.attachment_name.as_str()).collect();
    assert_eq!(names, vec!["receipt-a.pdf", "receipt-b.PDF", "invoice-jan.pdf"]);
    assert_eq!(rows[2].received_at, "2024-01-10 09:30:00");
    assert!(rows.iter().all(|r| r.save_folder == "/Invoices/2024"));

    // Route the invoice elsewhere under its own name.
    let mut edit = RowUpdate::for_row(RowKey(4));
    edit.save_folder = Some("/Invoices/January".into());
    edit.save_name = Some("2024-01 invoice".into());
    ledger.apply_updates(&[edit]).unwrap();

    let report = flows::review_and_copy(&mail, &mut storage, &mut ledger, &mut |_, _| {}).unwrap();
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 0);

    files.child("Invoices/2024/receipt-a.pdf").assert("%PDF-1.5\n");
    files.child("Invoices/2024/receipt-b.PDF").assert("%PDF-1.6\n");
    files
        .child("Invoices/January/2024-01 invoice.pdf")
        .assert("%PDF-1.4\n");
    files
        .child("Invoices/2024/readme.txt")
        .assert(predicate::path::missing());

    wb_path.assert(predicate::str::contains("\"OK\""));
    let rows = reopen(wb_path.path()).list_rows().unwrap();
    assert!(rows.iter().all(|r| r.result == ProcessingResult::Ok));
    assert_eq!(rows[2].save_name, "2024-01 invoice.pdf");
    let link = rows[2].file_link.as_deref().unwrap();
    assert!(link.starts_with("file://"), "{link}");
    assert!(link.ends_with("2024-01 invoice.pdf"), "{link}");
}

#[test]
fn test_rerun_and_collisions_never_overwrite() {
    let temp = assert_fs::TempDir::new().unwrap();
    let wb_path = temp.child("workbook.json");
    let files = temp.child("files");
    files.child("receipt-a.pdf").write_str("kept").unwrap();

    let mail = EmlDirectory::open(fixture("mail")).unwrap();
    let mut storage = LocalStorage::open(files.path()).unwrap();
    let mut ledger = ledger_at(wb_path.path(), &january(&["receipt"], "/"));

    flows::search_and_list(&mail, &mut storage, &mut ledger).unwrap();
    let report = flows::review_and_copy(&mail, &mut storage, &mut ledger, &mut |_, _| {}).unwrap();
    assert_eq!((report.succeeded, report.skipped), (1, 1));
    files.child("receipt-a.pdf").assert("kept");

    let rows = ledger.list_rows().unwrap();
    assert_eq!(
        rows[0].result,
        ProcessingResult::Skip("File already exists: receipt-a.pdf".into())
    );
    assert_eq!(rows[0].file_link, None);

    let again = flows::review_and_copy(&mail, &mut storage, &mut ledger, &mut |_, _| {}).unwrap();
    assert_eq!(again.already_processed, 2);
    assert_eq!(again.total(), 2);
    assert_eq!(ledger.list_rows().unwrap(), rows);
}

#[test]
fn test_operator_text_counts_as_handled() {
    let temp = assert_fs::TempDir::new().unwrap();
    let wb_path = temp.child("workbook.json");

    let mail = EmlDirectory::open(fixture("mail")).unwrap();
    let mut storage = LocalStorage::open(temp.child("files").path()).unwrap();
    let mut ledger = ledger_at(wb_path.path(), &january(&["invoice"], "/"));
    flows::search_and_list(&mail, &mut storage, &mut ledger).unwrap();

    let note = RowUpdate::result(RowKey(2), ProcessingResult::Manual("filed by hand".into()));
    ledger.apply_updates(&[note]).unwrap();

    let report = flows::review_and_copy(&mail, &mut storage, &mut ledger, &mut |_, _| {}).unwrap();
    assert_eq!(report.already_processed, 1);
    temp.child("files/invoice-jan.pdf")
        .assert(predicate::path::missing());
}

#[test]
fn test_search_replaces_previous_rows() {
    let temp = assert_fs::TempDir::new().unwrap();
    let wb_path = temp.child("workbook.json");

    let mail = EmlDirectory::open(fixture("mail")).unwrap();
    let mut storage = LocalStorage::open(temp.child("files").path()).unwrap();
    let mut ledger = ledger_at(wb_path.path(), &january(&[], "/"));
    flows::search_and_list(&mail, &mut storage, &mut ledger).unwrap();
    assert_eq!(ledger.list_rows().unwrap().len(), 3);

    ledger.write_criteria(&january(&["no such subject"], "/")).unwrap();
    let report = flows::search_and_list(&mail, &mut storage, &mut ledger).unwrap();
    assert_eq!(report.threads, 0);
    assert!(reopen(wb_path.path()).list_rows().unwrap().is_empty());
}

#[test]
fn test_invalid_criteria_abort_search() {
    let temp = assert_fs::TempDir::new().unwrap();
    let wb_path = temp.child("workbook.json");
    let mut ledger = ledger_at(wb_path.path(), &january(&[], "/"));

    // Hand-edit the end date to precede the start date.
    let raw = std::fs::read_to_string(wb_path.path()).unwrap();
    wb_path
        .write_str(&raw.replace("\"2024-01-31\"", "\"2023-12-31\""))
        .unwrap();
    ledger = Ledger::new(Workbook::open(wb_path.path()).unwrap(), ledger.layout().clone());

    let mail = EmlDirectory::open(fixture("mail")).unwrap();
    let mut storage = LocalStorage::open(temp.child("files").path()).unwrap();
    let err = flows::search_and_list(&mail, &mut storage, &mut ledger).unwrap_err();
    assert!(matches!(err, CourierError::InvalidInput(_)), "{err}");
}

// ─── Folder listing and selection ───────────────────────────────────

#[test]
fn test_folder_listing_and_selection() {
    let temp = assert_fs::TempDir::new().unwrap();
    let wb_path = temp.child("workbook.json");
    let files = temp.child("files");
    files.child("Clients/Acme").create_dir_all().unwrap();
    files.child("Archive").create_dir_all().unwrap();

    let storage = LocalStorage::open(files.path()).unwrap();
    let mut ledger = ledger_at(wb_path.path(), &january(&[], "/"));

    let count = flows::list_storage_folders(&storage, &mut ledger, 5).unwrap();
    assert_eq!(count, 3);
    wb_path.assert(predicate::str::contains("/Clients/Acme"));

    // Check the "Acme" row (header, Archive, Clients, Acme) by hand.
    let raw = std::fs::read_to_string(wb_path.path()).unwrap();
    let mut doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let folders = doc["sheets"]
        .as_array_mut()
        .unwrap()
        .iter_mut()
        .find(|s| s["name"] == "Folders")
        .unwrap();
    assert_eq!(folders["rows"][3][2], "/Clients/Acme");
    folders["rows"][3][0] = serde_json::Value::Bool(true);
    wb_path
        .write_str(&serde_json::to_string(&doc).unwrap())
        .unwrap();

    let mut ledger = reopen(wb_path.path());
    let selection = flows::apply_selected_folder(&mut ledger).unwrap();
    assert_eq!(selection.name, "Acme");
    assert_eq!(reopen(wb_path.path()).read_criteria().unwrap().folder_path, "/Clients/Acme");

    let root = storage.root_folder().unwrap();
    let clients = storage.find_folder(&root, "Clients").unwrap().unwrap();
    assert!(storage.folder_link(&clients).starts_with("file://"));
}

// ─── CSV export ─────────────────────────────────────────────────────

#[test]
fn test_export_after_search() {
    let temp = assert_fs::TempDir::new().unwrap();
    let wb_path = temp.child("workbook.json");
    let csv = temp.child("out.csv");

    let mail = EmlDirectory::open(fixture("mail")).unwrap();
    let mut storage = LocalStorage::open(temp.child("files").path()).unwrap();
    let mut ledger = ledger_at(wb_path.path(), &january(&[], "/"));
    flows::search_and_list(&mail, &mut storage, &mut ledger).unwrap();

    let layout = ledger.layout().clone();
    export_results_csv(&ledger.list_rows().unwrap(), &layout.headers, csv.path()).unwrap();
    csv.assert(predicate::str::contains("Save,Subject,Received"));
    csv.assert(predicate::str::contains("true,Receipt 1001,2024-01-20 14:00:00,receipt-a.pdf"));
}
