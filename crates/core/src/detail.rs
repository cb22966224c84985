//! Transaction panel of an expanded cell.

use crate::{
    models::{CellKey, Transaction},
    money::format_currency,
};

/// Rows shown before linking to the full list.
pub const MAX_DETAIL_ROWS: usize = 10;

/// Loading state of the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailState {
    /// Waiting for the ledger.
    Loading,
    /// Transactions, newest first.
    Loaded(Vec<Transaction>),
    /// The ledger call failed.
    Failed(String),
}

/// One rendered transaction line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRow {
    /// `15 Jan`.
    pub date: String,
    /// Counterparty.
    pub payee: String,
    /// Formatted amount.
    pub amount: String,
}

/// Expanded-cell panel contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionDetail {
    key: CellKey,
    category_name: String,
    state: DetailState,
}

impl ExpansionDetail {
    /// Panel for `key`, waiting on the ledger.
    pub fn loading(key: CellKey, category_name: impl Into<String>) -> Self {
        Self {
            key,
            category_name: category_name.into(),
            state: DetailState::Loading,
        }
    }

    /// Cell the panel belongs to.
    pub fn key(&self) -> &CellKey {
        &self.key
    }

    /// Current state.
    pub fn state(&self) -> &DetailState {
        &self.state
    }

    /// Header: category name and month (`Groceries`, `January 2025`).
    pub fn title(&self) -> (&str, String) {
        (&self.category_name, self.key.month.long_label())
    }

    /// Store the ledger result.
    pub fn load(&mut self, result: Result<Vec<Transaction>, String>) {
        self.state = match result {
            Ok(mut transactions) => {
                transactions.sort_by(|a, b| b.date.cmp(&a.date));
                DetailState::Loaded(transactions)
            }
            Err(message) => DetailState::Failed(message),
        };
    }

    /// Up to [`MAX_DETAIL_ROWS`] lines, newest first.
    pub fn rows(&self, symbol: &str) -> Vec<DetailRow> {
        let DetailState::Loaded(transactions) = &self.state else {
            return Vec::new();
        };
        transactions
            .iter()
            .take(MAX_DETAIL_ROWS)
            .map(|tx| DetailRow {
                date: tx.date.format("%d %b").to_string(),
                payee: tx.payee.clone(),
                amount: format_currency(tx.amount_cents, symbol),
            })
            .collect()
    }

    /// Link text when rows were cut off.
    pub fn view_all_label(&self) -> Option<String> {
        match &self.state {
            DetailState::Loaded(transactions) if transactions.len() > MAX_DETAIL_ROWS => {
                Some(format!("View all {} transactions →", transactions.len()))
            }
            _ => None,
        }
    }

    /// Placeholder line when there is nothing to list.
    pub fn placeholder(&self) -> Option<&str> {
        match &self.state {
            DetailState::Loading => Some("Loading..."),
            DetailState::Loaded(transactions) if transactions.is_empty() => {
                Some("No transactions for this month")
            }
            DetailState::Loaded(_) => None,
            DetailState::Failed(message) => Some(message),
        }
    }
}
