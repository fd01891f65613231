//! Mailbox access: the provider trait, thread/message types, and backends.

pub mod eml_dir;
pub mod extract;
pub mod memory;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::query::{matches_message, MailQuery};

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The `Message-ID` header value.
    pub id: String,
    pub subject: String,
    /// Raw `From:` value.
    pub from: String,
    pub date: DateTime<Utc>,
    /// Plain-text body.
    pub body: String,
    pub attachments: Vec<Attachment>,
}

/// A conversation: messages in chronological order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    pub id: String,
    pub messages: Vec<Message>,
}

impl Thread {
    /// Date of the newest message, if any.
    pub fn last_date(&self) -> Option<DateTime<Utc>> {
        self.messages.iter().map(|m| m.date).max()
    }
}

/// A mailbox that can be searched with the query language of [`crate::query`].
pub trait MailProvider {
    /// Threads with at least one matching message, newest first.
    fn search(&self, query: &str) -> Result<Vec<Thread>>;
}

/// Filter `threads` by `query`, newest thread first.
///
/// Shared by the local backends: a thread matches when any of its messages does.
pub(crate) fn filter_threads<'a>(
    threads: impl IntoIterator<Item = &'a Thread>,
    query: &MailQuery,
) -> Vec<Thread> {
    let mut matched: Vec<Thread> = threads
        .into_iter()
        .filter(|t| t.messages.iter().any(|m| matches_message(query, m)))
        .cloned()
        .collect();
    matched.sort_by(|a, b| b.last_date().cmp(&a.last_date()));
    matched
}
