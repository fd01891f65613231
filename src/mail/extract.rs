//! Attachment extraction: the latest message of a thread and its PDFs.

use tracing::debug;

use crate::model::candidate::{EmailData, PdfAttachment};

use super::{Attachment, Message, Thread};

/// Extract the latest message of `thread` with its PDF attachments.
///
/// Earlier messages of the thread are ignored. Returns `None` for an empty
/// thread or when the latest message carries no PDF.
pub fn extract_email_and_attachments(thread: &Thread) -> Option<EmailData> {
    let message = thread.messages.last()?;
    let attachments = pdf_attachments(message);

    if attachments.is_empty() {
        debug!(thread = %thread.id, subject = %message.subject, "No PDF attachment in latest message");
        return None;
    }

    Some(EmailData {
        subject: message.subject.clone(),
        date: message.date,
        message_id: message.id.clone(),
        body: message.body.clone(),
        attachments,
    })
}

/// Attachments whose name ends in `.pdf`, any case.
pub fn pdf_attachments(message: &Message) -> Vec<PdfAttachment> {
    message
        .attachments
        .iter()
        .filter(|att| is_pdf_name(&att.name))
        .map(|att: &Attachment| PdfAttachment {
            name: att.name.clone(),
            data: att.data.clone(),
        })
        .collect()
}

/// `true` if `name` ends in `.pdf`, case-insensitively.
pub fn is_pdf_name(name: &str) -> bool {
    name.to_lowercase().ends_with(".pdf")
}
