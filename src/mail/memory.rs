//! In-memory mailbox.

use tracing::debug;

use crate::error::Result;
use crate::query::parse_query;

use super::{filter_threads, MailProvider, Thread};

/// A mailbox holding threads in memory, searched with the local matcher.
#[derive(Debug, Clone, Default)]
pub struct MemoryMailbox {
    threads: Vec<Thread>,
}

impl MemoryMailbox {
    pub fn new(threads: Vec<Thread>) -> Self {
        Self { threads }
    }

    pub fn push(&mut self, thread: Thread) {
        self.threads.push(thread);
    }

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }
}

impl MailProvider for MemoryMailbox {
    fn search(&self, query: &str) -> Result<Vec<Thread>> {
        let parsed = parse_query(query);
        let found = filter_threads(&self.threads, &parsed);
        debug!(query, count = found.len(), "Searched in-memory mailbox");
        Ok(found)
    }
}
