//! Shared domain models.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::month::Month;

/// Stable identifier of a spending category.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub String);

impl CategoryId {
    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CategoryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Polarity of a category, which decides how its status is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    #[default]
    /// Money going out; staying under budget is good.
    Expense,
    /// Money coming in; exceeding the target is good.
    Income,
    /// Movement between accounts; read like an expense.
    Transfer,
}

/// A budgetable category row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Identifier used in cell keys.
    pub id: CategoryId,
    /// Display name.
    pub name: String,
    /// Status polarity.
    pub kind: CategoryKind,
    /// Section the row is grouped under (e.g. `Housing`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl Category {
    /// Convenience constructor without a section.
    pub fn new(id: &str, name: &str, kind: CategoryKind) -> Self {
        Self {
            id: CategoryId::from(id),
            name: name.to_string(),
            kind,
            section: None,
        }
    }

    /// Builder-style section assignment.
    pub fn in_section(mut self, section: &str) -> Self {
        self.section = Some(section.to_string());
        self
    }
}

/// Identity of a grid cell: one category crossed with one month.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey {
    /// Row.
    pub category: CategoryId,
    /// Column.
    pub month: Month,
}

impl CellKey {
    /// Build a key from its parts.
    pub fn new(category: impl Into<CategoryId>, month: Month) -> Self {
        Self {
            category: category.into(),
            month,
        }
    }
}

impl From<String> for CategoryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.month)
    }
}

/// Budgeted and observed amounts for one cell, in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BudgetCell {
    /// Planned amount; never negative.
    pub budgeted_cents: i64,
    /// Observed amount; expenses are usually negative.
    pub actual_cents: i64,
}

impl BudgetCell {
    /// Remaining budget after the absolute actual.
    pub fn remaining_cents(&self) -> i64 {
        self.budgeted_cents - self.actual_cents.abs()
    }
}

/// A single cell value to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellUpdate {
    /// Target cell.
    pub key: CellKey,
    /// New budgeted amount.
    pub budgeted_cents: i64,
}

/// A ledger transaction shown in an expanded cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Ledger identifier.
    pub id: String,
    /// Booking date.
    pub date: NaiveDate,
    /// Counterparty.
    pub payee: String,
    /// Signed amount in cents.
    pub amount_cents: i64,
    /// Category the transaction is filed under.
    pub category: CategoryId,
    /// Free text note.
    #[serde(default)]
    pub memo: Option<String>,
}
