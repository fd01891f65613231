//! Search criteria read from the search sheet.

use chrono::{Datelike, NaiveDate};

use crate::error::{CourierError, Result};

/// Marker for the storage root folder.
pub const ROOT_FOLDER: &str = "/";

/// Date window, keyword filter, and default destination of a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    /// First day of the window.
    pub start_date: NaiveDate,
    /// Last day of the window, as typed by the operator.
    pub end_date: NaiveDate,
    /// Subject keywords, OR'd together. Empty means no subject filter.
    pub keywords: Vec<String>,
    /// Default destination folder path. Never empty.
    pub folder_path: String,
}

impl SearchCriteria {
    /// Build criteria, enforcing the date order and the non-empty folder path.
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        keywords: Vec<String>,
        folder_path: &str,
    ) -> Result<Self> {
        let criteria = Self {
            start_date,
            end_date,
            keywords,
            folder_path: normalize_folder_path(folder_path),
        };
        criteria.validate()?;
        Ok(criteria)
    }

    /// Check the invariants of a criteria value.
    pub fn validate(&self) -> Result<()> {
        if self.start_date > self.end_date {
            return Err(CourierError::InvalidInput(format!(
                "start date {} is after end date {}",
                self.start_date, self.end_date
            )));
        }
        if self.folder_path.is_empty() {
            return Err(CourierError::InvalidInput(
                "destination folder path is empty".into(),
            ));
        }
        Ok(())
    }

    /// Default window: first day of `today`'s month through `today`, root folder.
    pub fn default_for(today: NaiveDate) -> Self {
        let start = today.with_day(1).unwrap_or(today);
        Self {
            start_date: start,
            end_date: today,
            keywords: Vec::new(),
            folder_path: ROOT_FOLDER.to_string(),
        }
    }
}

/// Parse a `YYYY-MM-DD` date typed into the search sheet.
pub fn parse_date_input(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    let well_formed = trimmed.len() == 10
        && trimmed.char_indices().all(|(i, c)| match i {
            4 | 7 => c == '-',
            _ => c.is_ascii_digit(),
        });
    if !well_formed {
        return Err(CourierError::InvalidInput(format!(
            "invalid date format, expected YYYY-MM-DD: '{trimmed}'"
        )));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| CourierError::InvalidInput(format!("invalid date: '{trimmed}'")))
}

/// Split a comma-separated keyword string, trimming and dropping blanks.
pub fn parse_keywords(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

/// Trim a folder path, falling back to the root marker when blank.
pub fn normalize_folder_path(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        ROOT_FOLDER.to_string()
    } else {
        trimmed.to_string()
    }
}
