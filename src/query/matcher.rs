//! Evaluate a parsed [`MailQuery`] against a message.

use crate::mail::Message;

use super::parse::{Clause, MailQuery, SearchField, SearchOperator, SearchTerm};

/// Check whether a single message matches the query.
///
/// Applies date and attachment filters first (cheapest), then clauses.
pub fn matches_message(query: &MailQuery, message: &Message) -> bool {
    let day = message.date.date_naive();
    if let Some(after) = query.after {
        if day < after {
            return false;
        }
    }
    if let Some(before) = query.before {
        if day >= before {
            return false;
        }
    }

    if let Some(want_att) = query.has_attachment {
        if message.attachments.is_empty() == want_att {
            return false;
        }
    }

    query
        .clauses
        .iter()
        .all(|clause| clause_matches(clause, message))
}

fn clause_matches(clause: &Clause, message: &Message) -> bool {
    match clause {
        Clause::Term(term) => term_matches(term, message),
        Clause::Not(inner) => !clause_matches(inner, message),
        Clause::AnyOf(clauses) => clauses.iter().any(|c| clause_matches(c, message)),
        Clause::AllOf(clauses) => clauses.iter().all(|c| clause_matches(c, message)),
    }
}

fn term_matches(term: &SearchTerm, message: &Message) -> bool {
    match term.field {
        SearchField::All => {
            matches_text(&message.subject, &term.operator)
                || matches_text(&message.from, &term.operator)
        }
        SearchField::From => matches_text(&message.from, &term.operator),
        SearchField::Subject => matches_text(&message.subject, &term.operator),
        SearchField::Filename => message
            .attachments
            .iter()
            .any(|att| matches_text(&att.name, &term.operator)),
    }
}

/// Case-insensitive text matching.
fn matches_text(haystack: &str, op: &SearchOperator) -> bool {
    let haystack_lower = haystack.to_lowercase();
    match op {
        SearchOperator::Contains(needle) => haystack_lower.contains(needle.as_str()),
        SearchOperator::Exact(phrase) => haystack_lower == *phrase,
    }
}
