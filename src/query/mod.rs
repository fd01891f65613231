//! Mail-search queries: building them from criteria, parsing, and matching.

pub mod build;
pub mod matcher;
pub mod parse;

pub use build::{build_search_query, query_for, subject_query};
pub use matcher::matches_message;
pub use parse::{parse_query, MailQuery};
