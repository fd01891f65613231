//! PDF attachments extracted from a mail thread.

use chrono::{DateTime, Utc};

/// A PDF attachment kept by the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfAttachment {
    /// Filename as sent, ending in `.pdf` (any case).
    pub name: String,
    /// Decoded file content.
    pub data: Vec<u8>,
}

/// The latest message of a thread together with its PDF attachments.
///
/// Only produced when at least one PDF attachment exists.
#[derive(Debug, Clone)]
pub struct EmailData {
    pub subject: String,
    pub date: DateTime<Utc>,
    pub message_id: String,
    /// Plain-text body of the message.
    pub body: String,
    pub attachments: Vec<PdfAttachment>,
}

/// One candidate attachment: the unit the ledger holds a row for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentCandidate {
    pub source_subject: String,
    pub source_date: DateTime<Utc>,
    pub attachment_name: String,
    pub content: Vec<u8>,
    pub source_message_id: String,
}

impl EmailData {
    /// Split into one candidate per attachment, in attachment order.
    pub fn candidates(&self) -> Vec<AttachmentCandidate> {
        self.attachments
            .iter()
            .map(|att| AttachmentCandidate {
                source_subject: self.subject.clone(),
                source_date: self.date,
                attachment_name: att.name.clone(),
                content: att.data.clone(),
                source_message_id: self.message_id.clone(),
            })
            .collect()
    }

    /// Find an attachment by exact name.
    pub fn attachment(&self, name: &str) -> Option<&PdfAttachment> {
        self.attachments.iter().find(|att| att.name == name)
    }
}

/// Attachment names joined with `", "`, or an empty string for `None`.
pub fn attachment_names(data: Option<&EmailData>) -> String {
    data.map(|d| {
        d.attachments
            .iter()
            .map(|att| att.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    })
    .unwrap_or_default()
}
