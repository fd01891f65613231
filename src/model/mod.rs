//! Core data model: search criteria, extracted candidates, ledger rows.

pub mod candidate;
pub mod criteria;
pub mod row;
