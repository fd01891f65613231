//! Mailbox backed by a directory of `.eml` files (RFC 5322 messages without MBOX framing).
//!
//! Every file is parsed once when the directory is opened; messages are then
//! grouped into threads through their `References` / `In-Reply-To` headers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use mail_parser::{HeaderValue, MessageParser, MimeHeaders};
use tracing::{debug, info, warn};

use crate::error::{CourierError, Result};
use crate::query::parse_query;

use super::{filter_threads, Attachment, MailProvider, Message, Thread};

/// Longest reply chain followed when grouping messages into threads.
const MAX_THREAD_DEPTH: usize = 64;

/// A parsed message plus the headers needed to thread it.
#[derive(Debug, Clone)]
pub struct ParsedEml {
    pub message: Message,
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
}

/// Read-only mailbox over every `.eml` file below a directory.
#[derive(Debug)]
pub struct EmlDirectory {
    root: PathBuf,
    threads: Vec<Thread>,
}

impl EmlDirectory {
    /// Scan `root` recursively and load every `.eml` file.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut files = Vec::new();
        collect_eml_files(&root, &mut files)?;
        files.sort();

        let mut parsed = Vec::with_capacity(files.len());
        for path in &files {
            let data = std::fs::read(path).map_err(|e| CourierError::io(path, e))?;
            match parse_eml_bytes(&data) {
                Some(mut eml) => {
                    if eml.message.id.is_empty() {
                        eml.message.id = path.display().to_string();
                    }
                    parsed.push(eml);
                }
                None => warn!(path = %path.display(), "Skipping unparseable message"),
            }
        }

        let threads = group_into_threads(parsed);
        info!(
            path = %root.display(),
            files = files.len(),
            threads = threads.len(),
            "Loaded mail directory"
        );
        Ok(Self { root, threads })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }
}

impl MailProvider for EmlDirectory {
    fn search(&self, query: &str) -> Result<Vec<Thread>> {
        let parsed = parse_query(query);
        let found = filter_threads(&self.threads, &parsed);
        debug!(query, count = found.len(), "Searched mail directory");
        Ok(found)
    }
}

/// Parse one raw message. Returns `None` when `mail-parser` rejects it.
pub fn parse_eml_bytes(data: &[u8]) -> Option<ParsedEml> {
    let msg = MessageParser::default().parse(data)?;

    let date = msg
        .date()
        .and_then(|d| DateTime::parse_from_rfc3339(&d.to_rfc3339()).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_default();

    let attachments = msg
        .attachments()
        .enumerate()
        .map(|(idx, part)| {
            let name = part
                .attachment_name()
                .map(String::from)
                .unwrap_or_else(|| format!("attachment_{idx}"));
            let content_type = part
                .content_type()
                .map(|ct| match ct.subtype() {
                    Some(sub) => format!("{}/{sub}", ct.ctype()),
                    None => ct.ctype().to_string(),
                })
                .unwrap_or_else(|| "application/octet-stream".to_string());
            Attachment {
                name,
                content_type,
                data: part.contents().to_vec(),
            }
        })
        .collect();

    let message = Message {
        id: msg.message_id().unwrap_or_default().to_string(),
        subject: msg.subject().unwrap_or_default().to_string(),
        from: msg
            .header_raw("From")
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
        date,
        body: msg.body_text(0).map(|s| s.into_owned()).unwrap_or_default(),
        attachments,
    };

    Some(ParsedEml {
        message,
        in_reply_to: header_ids(msg.in_reply_to()).into_iter().next(),
        references: header_ids(msg.references()),
    })
}

/// Message ids carried by a `References` / `In-Reply-To` header value.
fn header_ids(value: &HeaderValue<'_>) -> Vec<String> {
    match value {
        HeaderValue::Text(id) => vec![id.to_string()],
        HeaderValue::TextList(ids) => ids.iter().map(|id| id.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// Group messages by the root of their reply chain.
///
/// The root is the first `References` entry, else the `In-Reply-To` chain
/// followed through known messages, else the message itself. Messages inside
/// a thread are ordered by date.
fn group_into_threads(parsed: Vec<ParsedEml>) -> Vec<Thread> {
    let parents: HashMap<String, Option<String>> = parsed
        .iter()
        .map(|eml| (eml.message.id.clone(), parent_of(eml)))
        .collect();

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Message>> = HashMap::new();

    for eml in parsed {
        let root = thread_root(&eml.message.id, &parents);
        let entry = groups.entry(root.clone()).or_default();
        if entry.is_empty() {
            order.push(root);
        }
        entry.push(eml.message);
    }

    order
        .into_iter()
        .filter_map(|id| {
            let mut messages = groups.remove(&id)?;
            messages.sort_by_key(|m| m.date);
            Some(Thread { id, messages })
        })
        .collect()
}

fn parent_of(eml: &ParsedEml) -> Option<String> {
    eml.references
        .first()
        .cloned()
        .or_else(|| eml.in_reply_to.clone())
}

/// Follow parent links up from `id`. A reference cycle is named by its
/// smallest id, so every member of the cycle lands in the same thread.
fn thread_root(id: &str, parents: &HashMap<String, Option<String>>) -> String {
    let mut chain: Vec<&str> = vec![id];
    let mut current = id;
    for _ in 0..MAX_THREAD_DEPTH {
        let parent = match parents.get(current) {
            Some(Some(parent)) => parent.as_str(),
            Some(None) => return current.to_string(),
            // Parent not in this mailbox: it still names the thread.
            None => return current.to_string(),
        };
        if let Some(start) = chain.iter().position(|seen| *seen == parent) {
            return chain[start..]
                .iter()
                .min()
                .map_or_else(|| current.to_string(), |root| root.to_string());
        }
        chain.push(parent);
        current = parent;
    }
    current.to_string()
}

/// Recursively collect `*.eml` files below `dir`.
fn collect_eml_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| CourierError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| CourierError::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            collect_eml_files(&path, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("eml"))
        {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &[u8] = b"From: Billing <billing@example.com>\r\n\
Subject: Invoice 42\r\n\
Date: Mon, 15 Jan 2024 10:00:00 +0000\r\n\
Message-ID: <inv42@example.com>\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/plain\r\n\
\r\n\
Please find the invoice attached.\r\n\
--XYZ\r\n\
Content-Type: application/pdf; name=\"invoice-42.pdf\"\r\n\
Content-Disposition: attachment; filename=\"invoice-42.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQK\r\n\
--XYZ--\r\n";

    #[test]
    fn test_parse_eml_bytes() {
        let eml = parse_eml_bytes(SIMPLE).unwrap();
        let m = &eml.message;
        assert_eq!(m.subject, "Invoice 42");
        assert_eq!(m.id, "inv42@example.com");
        assert!(m.from.contains("billing@example.com"));
        assert_eq!(m.date.format("%Y-%m-%d %H:%M").to_string(), "2024-01-15 10:00");
        assert!(m.body.contains("invoice attached"));
        assert_eq!(m.attachments.len(), 1);
        assert_eq!(m.attachments[0].name, "invoice-42.pdf");
        assert_eq!(m.attachments[0].content_type, "application/pdf");
        assert_eq!(m.attachments[0].data, b"%PDF-1.4\n");
        assert!(eml.references.is_empty());
    }

    fn parsed(id: &str, secs: i64, in_reply_to: Option<&str>, references: &[&str]) -> ParsedEml {
        ParsedEml {
            message: Message {
                id: id.to_string(),
                subject: id.to_string(),
                from: String::new(),
                date: DateTime::from_timestamp(secs, 0).unwrap(),
                body: String::new(),
                attachments: Vec::new(),
            },
            in_reply_to: in_reply_to.map(String::from),
            references: references.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_group_into_threads() {
        let threads = group_into_threads(vec![
            parsed("b", 300, Some("a"), &["a"]),
            parsed("a", 100, None, &[]),
            parsed("c", 200, None, &[]),
            parsed("d", 400, Some("b"), &[]),
        ]);
        assert_eq!(threads.len(), 2);
        let a = threads.iter().find(|t| t.id == "a").unwrap();
        let ids: Vec<&str> = a.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "d"]);
        assert!(threads.iter().any(|t| t.id == "c" && t.messages.len() == 1));
    }

    #[test]
    fn test_reference_cycle_is_one_thread() {
        let threads = group_into_threads(vec![
            parsed("b", 200, Some("a"), &["a"]),
            parsed("a", 100, Some("b"), &["b"]),
            parsed("c", 300, Some("b"), &[]),
            parsed("self", 50, Some("self"), &[]),
        ]);
        assert_eq!(threads.len(), 2);
        let a = threads.iter().find(|t| t.id == "a").unwrap();
        let ids: Vec<&str> = a.messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(threads.iter().any(|t| t.id == "self" && t.messages.len() == 1));
    }

    #[test]
    fn test_open_directory_and_search() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("2024")).unwrap();
        std::fs::write(dir.path().join("2024").join("inv.eml"), SIMPLE).unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"not mail").unwrap();

        let mailbox = EmlDirectory::open(dir.path()).unwrap();
        assert_eq!(mailbox.threads().len(), 1);

        let hits = mailbox
            .search("has:attachment filename:pdf after:2024/01/01 before:2024/02/01 (subject:(invoice))")
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(mailbox.search("subject:(receipt)").unwrap().is_empty());
    }

    #[test]
    fn test_open_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = EmlDirectory::open(dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, CourierError::Io { .. }));
    }
}
