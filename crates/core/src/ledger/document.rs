use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    error::PersistenceError,
    models::{BudgetCell, Category, CategoryId, CategoryKind, CellKey, CellUpdate, Transaction},
    month::Month,
};

use super::LedgerSnapshot;

/// Stored budget value for one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetRecord {
    /// Category row.
    pub category: CategoryId,
    /// Budget month.
    pub month: Month,
    /// Planned amount.
    pub budgeted_cents: i64,
}

/// Serialized ledger: categories, budgets and transactions.
///
/// Actual amounts are never stored; they are the sum of the transactions
/// filed under a category in a month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerDocument {
    #[serde(default)]
    categories: Vec<Category>,
    #[serde(default)]
    budgets: Vec<BudgetRecord>,
    #[serde(default)]
    transactions: Vec<Transaction>,
}

impl LedgerDocument {
    /// Empty ledger with the given category rows.
    pub fn new(categories: Vec<Category>) -> Self {
        Self {
            categories,
            ..Self::default()
        }
    }

    /// Category rows in display order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Record a transaction.
    pub fn push_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    /// Budgeted and actual amounts for one cell.
    pub fn cell(&self, key: &CellKey) -> BudgetCell {
        BudgetCell {
            budgeted_cents: self.budgeted(key),
            actual_cents: self.actual(key),
        }
    }

    fn budgeted(&self, key: &CellKey) -> i64 {
        self.budgets
            .iter()
            .find(|record| record.category == key.category && record.month == key.month)
            .map(|record| record.budgeted_cents)
            .unwrap_or(0)
    }

    fn actual(&self, key: &CellKey) -> i64 {
        self.transactions
            .iter()
            .filter(|tx| tx.category == key.category && month_of(tx.date) == Some(key.month))
            .map(|tx| tx.amount_cents)
            .sum()
    }

    /// Check that an update addresses a known category and a valid amount.
    pub fn validate(&self, update: &CellUpdate) -> Result<(), PersistenceError> {
        if update.budgeted_cents < 0 {
            return Err(PersistenceError::new(format!(
                "refusing negative budget for {}",
                update.key
            )));
        }
        if !self.categories.iter().any(|c| c.id == update.key.category) {
            return Err(PersistenceError::new(format!(
                "unknown category '{}'",
                update.key.category
            )));
        }
        Ok(())
    }

    /// Store a budget value, replacing any previous one.
    pub fn set_budget(&mut self, update: &CellUpdate) {
        match self.budgets.iter_mut().find(|record| {
            record.category == update.key.category && record.month == update.key.month
        }) {
            Some(record) => record.budgeted_cents = update.budgeted_cents,
            None => self.budgets.push(BudgetRecord {
                category: update.key.category.clone(),
                month: update.key.month,
                budgeted_cents: update.budgeted_cents,
            }),
        }
    }

    /// Transactions of one cell, newest first.
    pub fn transactions_for(&self, key: &CellKey) -> Vec<Transaction> {
        let mut found: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|tx| tx.category == key.category && month_of(tx.date) == Some(key.month))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
        found
    }

    /// Categories and cell values for the requested months.
    pub fn snapshot(&self, months: &[Month]) -> LedgerSnapshot {
        let mut actuals: BTreeMap<CellKey, i64> = BTreeMap::new();
        for tx in &self.transactions {
            if let Some(month) = month_of(tx.date) {
                *actuals
                    .entry(CellKey::new(tx.category.clone(), month))
                    .or_default() += tx.amount_cents;
            }
        }

        let mut cells = Vec::with_capacity(self.categories.len() * months.len());
        for category in &self.categories {
            for month in months {
                let key = CellKey::new(category.id.clone(), *month);
                let cell = BudgetCell {
                    budgeted_cents: self.budgeted(&key),
                    actual_cents: actuals.get(&key).copied().unwrap_or(0),
                };
                cells.push((key, cell));
            }
        }

        LedgerSnapshot {
            categories: self.categories.clone(),
            months: months.to_vec(),
            cells,
        }
    }

    /// Sample ledger covering the year around `today`.
    pub fn demo(today: Month) -> Self {
        let categories = vec![
            Category::new("rent", "Rent", CategoryKind::Expense).in_section("Housing"),
            Category::new("utilities", "Utilities", CategoryKind::Expense).in_section("Housing"),
            Category::new("groceries", "Groceries", CategoryKind::Expense).in_section("Daily"),
            Category::new("dining", "Dining Out", CategoryKind::Expense).in_section("Daily"),
            Category::new("transport", "Transport", CategoryKind::Expense).in_section("Daily"),
            Category::new("salary", "Salary", CategoryKind::Income).in_section("Income"),
            Category::new("savings", "Savings", CategoryKind::Transfer).in_section("Transfers"),
        ];
        let plan: [(&str, i64, &str); 7] = [
            ("rent", 120_000, "Landlord"),
            ("utilities", 15_000, "City Power"),
            ("groceries", 45_000, "Corner Market"),
            ("dining", 12_000, "Bistro"),
            ("transport", 8_000, "Transit Pass"),
            ("salary", 350_000, "Employer"),
            ("savings", 50_000, "Savings Account"),
        ];

        let mut doc = Self::new(categories);
        let mut next_id = 1_u32;
        for (index, month) in today.offset(-11).range_to(today.offset(2)).into_iter().enumerate() {
            for (row, (id, budget, payee)) in plan.iter().enumerate() {
                let key = CellKey::new(*id, month);
                doc.set_budget(&CellUpdate {
                    key,
                    budgeted_cents: *budget,
                });
                if month > today {
                    continue;
                }
                // spread the actuals from 70% to 115% of the plan
                let spread = ((index * 7 + row * 13) % 10) as i64;
                let amount = budget * (70 + spread * 5) / 100;
                for (part, day) in [(2_i64, 4_u32), (1, 18)] {
                    let Some(date) = NaiveDate::from_ymd_opt(month.year(), month.number(), day)
                    else {
                        continue;
                    };
                    let share = amount * part / 3;
                    let signed = if *id == "salary" { share } else { -share };
                    doc.push_transaction(Transaction {
                        id: format!("tx-{next_id:05}"),
                        date,
                        payee: payee.to_string(),
                        amount_cents: signed,
                        category: CategoryId::from(*id),
                        memo: None,
                    });
                    next_id += 1;
                }
            }
        }
        doc
    }
}

fn month_of(date: NaiveDate) -> Option<Month> {
    use chrono::Datelike;
    Month::new(date.year(), date.month())
}
