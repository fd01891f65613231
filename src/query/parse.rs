//! Search query parser.
//!
//! Parses the query strings produced by [`super::build`] (and typed by hand)
//! into a structured [`MailQuery`] so local mailboxes can evaluate them.
//!
//! # Supported syntax
//!
//! **Field-specific**:
//! - `subject:invoice` / `subject:(invoice)` / `subject:"exact subject"`
//! - `from:user@example.com`
//! - `filename:pdf`
//! - `has:attachment` / `has:no-attachment`
//!
//! **Date filters** (`YYYY/MM/DD` or `YYYY-MM-DD`):
//! - `after:2024/01/01` (inclusive)
//! - `before:2024/02/01` (exclusive)
//!
//! **Operators**:
//! - `term1 term2`: implicit AND
//! - `term1 OR term2`: OR between neighbours
//! - `(term1 OR term2)`: grouping
//! - `-term`: NOT
//! - `"exact phrase"`: quoted phrase

use chrono::NaiveDate;

/// Which field a term looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchField {
    /// Subject or sender.
    All,
    From,
    Subject,
    /// Any attachment name.
    Filename,
}

/// How to match text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOperator {
    /// Case-insensitive substring match.
    Contains(String),
    /// Whole-value match, still case-insensitive.
    Exact(String),
}

/// A single field test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTerm {
    pub field: SearchField,
    pub operator: SearchOperator,
}

/// A boolean combination of terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    Term(SearchTerm),
    Not(Box<Clause>),
    AnyOf(Vec<Clause>),
    AllOf(Vec<Clause>),
}

/// A fully parsed search query. Top-level clauses are AND'ed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailQuery {
    pub clauses: Vec<Clause>,
    /// Messages on or after this day.
    pub after: Option<NaiveDate>,
    /// Messages strictly before this day.
    pub before: Option<NaiveDate>,
    /// `Some(true)` for has:attachment, `Some(false)` for has:no-attachment.
    pub has_attachment: Option<bool>,
}

impl MailQuery {
    /// `true` when the query places no restriction at all.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
            && self.after.is_none()
            && self.before.is_none()
            && self.has_attachment.is_none()
    }
}

/// Parse a query string into a structured [`MailQuery`].
///
/// Never fails: unrecognized syntax is treated as a plain text search.
pub fn parse_query(input: &str) -> MailQuery {
    let mut query = MailQuery::default();
    let clauses = parse_sequence(tokenize(input.trim()), &mut query);
    query.clauses = clauses;
    query
}

/// Parse a token list into AND'ed clauses, folding `OR` into its neighbours.
fn parse_sequence(tokens: Vec<String>, query: &mut MailQuery) -> Vec<Clause> {
    let mut clauses: Vec<Clause> = Vec::new();
    let mut join_next = false;

    for token in tokens {
        if token == "OR" {
            join_next = !clauses.is_empty();
            continue;
        }

        let Some(clause) = parse_clause(&token, query) else {
            continue;
        };

        if join_next {
            join_next = false;
            match clauses.pop() {
                Some(Clause::AnyOf(mut alternatives)) => {
                    alternatives.push(clause);
                    clauses.push(Clause::AnyOf(alternatives));
                }
                Some(previous) => clauses.push(Clause::AnyOf(vec![previous, clause])),
                None => clauses.push(clause),
            }
        } else {
            clauses.push(clause);
        }
    }

    clauses
}

/// Parse one token. Filters (`has:`, `after:`, `before:`) update `query`
/// and yield no clause.
fn parse_clause(token: &str, query: &mut MailQuery) -> Option<Clause> {
    let (negated, body) = match token.strip_prefix('-') {
        Some(stripped) if !stripped.is_empty() => (true, stripped),
        _ => (false, token),
    };

    let clause = if let Some(inner) = group_body(body) {
        let mut inner_clauses = parse_sequence(tokenize(inner), query);
        match inner_clauses.len() {
            0 => return None,
            1 => inner_clauses.pop()?,
            _ => Clause::AllOf(inner_clauses),
        }
    } else {
        Clause::Term(parse_term(body, negated, query)?)
    };

    if negated {
        Some(Clause::Not(Box::new(clause)))
    } else {
        Some(clause)
    }
}

/// Parse a `field:value` or bare-word token.
fn parse_term(token: &str, negated: bool, query: &mut MailQuery) -> Option<SearchTerm> {
    if let Some(value) = token.strip_prefix("subject:") {
        return Some(SearchTerm {
            field: SearchField::Subject,
            operator: make_operator(value),
        });
    }
    if let Some(value) = token.strip_prefix("from:") {
        return Some(SearchTerm {
            field: SearchField::From,
            operator: make_operator(value),
        });
    }
    if let Some(value) = token.strip_prefix("filename:") {
        return Some(SearchTerm {
            field: SearchField::Filename,
            operator: make_operator(value),
        });
    }
    if let Some(value) = token.strip_prefix("has:") {
        match value {
            "attachment" | "attachments" => query.has_attachment = Some(!negated),
            "no-attachment" | "no-attachments" => query.has_attachment = Some(negated),
            _ => {}
        }
        return None;
    }
    if let Some(value) = token.strip_prefix("after:") {
        if let Some(d) = parse_query_date(value) {
            query.after = Some(d);
        }
        return None;
    }
    if let Some(value) = token.strip_prefix("before:") {
        if let Some(d) = parse_query_date(value) {
            query.before = Some(d);
        }
        return None;
    }

    Some(SearchTerm {
        field: SearchField::All,
        operator: make_operator(token),
    })
}

/// Build an operator from a value (quoted → Exact, `(..)` or bare → Contains).
fn make_operator(value: &str) -> SearchOperator {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let body = unescape_quoted(&value[1..value.len() - 1]);
        return SearchOperator::Exact(body.to_lowercase());
    }
    let unwrapped = group_body(value).unwrap_or(value).trim();
    SearchOperator::Contains(unwrapped.to_lowercase())
}

/// Undo the `\"` and `\\` escapes allowed inside a quoted value.
fn unescape_quoted(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(ch);
    }
    out
}

/// Content of a `( ... )` token, if it is one.
fn group_body(token: &str) -> Option<&str> {
    if token.len() >= 2 && token.starts_with('(') && token.ends_with(')') {
        Some(&token[1..token.len() - 1])
    } else {
        None
    }
}

/// Tokenize input respecting quoted strings and parentheses.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut depth = 0usize;

    for ch in input.chars() {
        if escaped {
            escaped = false;
            current.push(ch);
            continue;
        }
        match ch {
            '\\' if in_quotes => {
                escaped = true;
                current.push(ch);
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '(' if !in_quotes => {
                depth += 1;
                current.push(ch);
            }
            ')' if !in_quotes => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            c if c.is_whitespace() && !in_quotes && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Parse `2024/01/04` or `2024-01-04`.
fn parse_query_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y/%m/%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}
