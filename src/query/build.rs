//! Mail-search query construction.

use chrono::NaiveDate;
use tracing::debug;

use crate::model::criteria::SearchCriteria;

/// Date format used inside `after:` / `before:` terms.
const QUERY_DATE_FORMAT: &str = "%Y/%m/%d";

/// Build the search query for PDF-bearing mail in a date window.
///
/// Keywords are OR'd as `subject:(kw)` clauses and passed through unescaped.
/// The mail host treats `before:` as exclusive of its day.
pub fn build_search_query(start: NaiveDate, end: NaiveDate, keywords: &[String]) -> String {
    let mut query = format!(
        "has:attachment filename:pdf after:{} before:{}",
        start.format(QUERY_DATE_FORMAT),
        end.format(QUERY_DATE_FORMAT)
    );

    if !keywords.is_empty() {
        let clause = keywords
            .iter()
            .map(|kw| format!("subject:({kw})"))
            .collect::<Vec<_>>()
            .join(" OR ");
        query.push_str(&format!(" ({clause})"));
    }

    debug!(query = %query, "Built search query");
    query
}

/// [`build_search_query`] over a criteria value.
pub fn query_for(criteria: &SearchCriteria) -> String {
    build_search_query(criteria.start_date, criteria.end_date, &criteria.keywords)
}

/// Query re-locating a message by its exact subject line.
///
/// `\` and `"` in the subject are backslash-escaped so the quoted value
/// survives tokenizing.
pub fn subject_query(subject: &str) -> String {
    let escaped = subject.replace('\\', "\\\\").replace('"', "\\\"");
    format!("subject:\"{escaped}\"")
}
