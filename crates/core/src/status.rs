//! Budget status classification and its color semantics.
//!
//! Thresholds are compared with exact integer arithmetic on the cent values;
//! `percent_used` is only reported for display.

use serde::{Deserialize, Serialize};

use crate::models::CategoryKind;

/// Position of an actual amount relative to its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BudgetStatus {
    /// No budget set.
    None,
    /// Below 90%.
    Under,
    /// From 90% up to (not including) 99%.
    Approaching,
    /// Within 99–101% inclusive.
    OnBudget,
    /// Above 101%.
    Over,
}

impl BudgetStatus {
    /// Position along `under → approaching → on-budget → over`.
    pub fn rank(self) -> u8 {
        match self {
            BudgetStatus::None => 0,
            BudgetStatus::Under => 1,
            BudgetStatus::Approaching => 2,
            BudgetStatus::OnBudget => 3,
            BudgetStatus::Over => 4,
        }
    }

    /// Kebab-case label (`on-budget`).
    pub fn label(self) -> &'static str {
        match self {
            BudgetStatus::None => "none",
            BudgetStatus::Under => "under",
            BudgetStatus::Approaching => "approaching",
            BudgetStatus::OnBudget => "on-budget",
            BudgetStatus::Over => "over",
        }
    }
}

/// Visual outcome of a status for a given category kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusClass {
    /// Not color coded.
    None,
    /// Favorable.
    Success,
    /// Close to the limit.
    Warning,
    /// Right on target.
    Neutral,
    /// Unfavorable.
    Danger,
}

impl StatusClass {
    /// CSS-style class name (`status-success`); empty for [`StatusClass::None`].
    pub fn class_name(self) -> &'static str {
        match self {
            StatusClass::None => "",
            StatusClass::Success => "status-success",
            StatusClass::Warning => "status-warning",
            StatusClass::Neutral => "status-neutral",
            StatusClass::Danger => "status-danger",
        }
    }
}

/// Classification result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusResult {
    /// Where the actual sits relative to the budget.
    pub status: BudgetStatus,
    /// Percentage of the budget used (signed for income).
    pub percent_used: f64,
}

/// Classify an actual amount against its budget.
pub fn classify(actual_cents: i64, budget_cents: i64, kind: CategoryKind) -> StatusResult {
    if budget_cents <= 0 {
        return StatusResult {
            status: BudgetStatus::None,
            percent_used: 0.0,
        };
    }

    let used = match kind {
        CategoryKind::Income => i128::from(actual_cents),
        CategoryKind::Expense | CategoryKind::Transfer => i128::from(actual_cents).abs(),
    };
    let budget = i128::from(budget_cents);
    let scaled = used * 100;

    let status = if scaled >= budget * 99 && scaled <= budget * 101 {
        BudgetStatus::OnBudget
    } else if scaled > budget * 101 {
        BudgetStatus::Over
    } else if scaled >= budget * 90 {
        BudgetStatus::Approaching
    } else {
        BudgetStatus::Under
    };

    StatusResult {
        status,
        percent_used: used as f64 / budget as f64 * 100.0,
    }
}

/// Map a status to its color class; income inverts the expense polarity.
pub fn status_class(status: BudgetStatus, kind: CategoryKind) -> StatusClass {
    match (status, kind) {
        (BudgetStatus::None, _) => StatusClass::None,
        (BudgetStatus::Approaching, _) => StatusClass::Warning,
        (BudgetStatus::OnBudget, _) => StatusClass::Neutral,
        (BudgetStatus::Over, CategoryKind::Income) => StatusClass::Success,
        (BudgetStatus::Under, CategoryKind::Income) => StatusClass::Danger,
        (BudgetStatus::Under, _) => StatusClass::Success,
        (BudgetStatus::Over, _) => StatusClass::Danger,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_budget_has_no_status() {
        for actual in [-50_000, 0, 1, 99_999] {
            for kind in [
                CategoryKind::Expense,
                CategoryKind::Income,
                CategoryKind::Transfer,
            ] {
                let result = classify(actual, 0, kind);
                assert_eq!(result.status, BudgetStatus::None);
                assert_eq!(result.percent_used, 0.0);
                assert_eq!(status_class(result.status, kind), StatusClass::None);
            }
        }
    }

    #[test]
    fn exactly_at_budget_is_on_budget() {
        for cents in [1, 99, 100, 40_000, 123_456_789] {
            assert_eq!(
                classify(cents, cents, CategoryKind::Expense).status,
                BudgetStatus::OnBudget
            );
            assert_eq!(
                classify(-cents, cents, CategoryKind::Expense).status,
                BudgetStatus::OnBudget
            );
        }
    }

    #[test]
    fn expense_thresholds() {
        let budget = 10_000;
        assert_eq!(classify(-8_999, budget, CategoryKind::Expense).status, BudgetStatus::Under);
        assert_eq!(
            classify(-9_000, budget, CategoryKind::Expense).status,
            BudgetStatus::Approaching
        );
        assert_eq!(
            classify(-9_899, budget, CategoryKind::Expense).status,
            BudgetStatus::Approaching
        );
        assert_eq!(
            classify(-9_900, budget, CategoryKind::Expense).status,
            BudgetStatus::OnBudget
        );
        assert_eq!(
            classify(-10_100, budget, CategoryKind::Expense).status,
            BudgetStatus::OnBudget
        );
        assert_eq!(classify(-10_101, budget, CategoryKind::Expense).status, BudgetStatus::Over);
        let result = classify(-5_000, budget, CategoryKind::Transfer);
        assert_eq!(result.status, BudgetStatus::Under);
        assert!((result.percent_used - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn income_keeps_sign() {
        let budget = 300_000;
        assert_eq!(classify(330_000, budget, CategoryKind::Income).status, BudgetStatus::Over);
        assert_eq!(classify(150_000, budget, CategoryKind::Income).status, BudgetStatus::Under);
        assert_eq!(
            classify(-300_000, budget, CategoryKind::Income).status,
            BudgetStatus::Under
        );
        assert_eq!(
            classify(285_000, budget, CategoryKind::Income).status,
            BudgetStatus::Approaching
        );
        let result = classify(-150_000, budget, CategoryKind::Income);
        assert!(result.percent_used < 0.0);
    }

    #[test]
    fn expense_status_never_moves_backward_as_spending_grows() {
        for budget in [1, 7, 100, 9_999, 40_000] {
            let mut previous = BudgetStatus::Under.rank();
            let limit = budget * 3;
            let step = (budget / 50).max(1);
            let mut actual = 0;
            while actual <= limit {
                let rank = classify(-actual, budget, CategoryKind::Expense).status.rank();
                assert!(rank >= previous, "budget {budget} actual {actual}");
                previous = rank;
                actual += step;
            }
        }
    }

    #[test]
    fn class_mapping_inverts_for_income() {
        assert_eq!(
            status_class(BudgetStatus::Over, CategoryKind::Income),
            status_class(BudgetStatus::Under, CategoryKind::Expense)
        );
        assert_eq!(
            status_class(BudgetStatus::Under, CategoryKind::Income),
            status_class(BudgetStatus::Over, CategoryKind::Expense)
        );
        for kind in [CategoryKind::Expense, CategoryKind::Income, CategoryKind::Transfer] {
            assert_eq!(status_class(BudgetStatus::Approaching, kind), StatusClass::Warning);
            assert_eq!(status_class(BudgetStatus::OnBudget, kind), StatusClass::Neutral);
        }
        assert_eq!(
            status_class(BudgetStatus::Over, CategoryKind::Transfer).class_name(),
            "status-danger"
        );
    }
}
