//! `pdfcourier`: find PDF attachments in a mailbox, review them in a
//! workbook ledger, and file the chosen ones into a folder tree.
//!
//! The mailbox, the folder tree, and the workbook are reached through the
//! [`mail::MailProvider`], [`storage::StorageProvider`] and
//! [`ledger::workbook::TabularStore`] traits; [`flows`] drives them.

pub mod config;
pub mod error;
pub mod flows;
pub mod ledger;
pub mod mail;
pub mod model;
pub mod query;
pub mod storage;
