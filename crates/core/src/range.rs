//! Month windows: the grid's loaded range and the batch modal's target range.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{error::RangeError, month::Month};

/// Longest custom range a user may select.
pub const MAX_CUSTOM_MONTHS: usize = 36;

/// Inclusive month span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: Month,
    end: Month,
}

impl DateRange {
    /// Validated span of at most `max` months.
    pub fn bounded(start: Month, end: Month, max: usize) -> Result<Self, RangeError> {
        if end < start {
            return Err(RangeError::Inverted);
        }
        let months = start.count_to(end);
        if months > max {
            return Err(RangeError::ExceedsMaxMonths { months, max });
        }
        Ok(Self { start, end })
    }

    /// First month.
    pub fn start(&self) -> Month {
        self.start
    }

    /// Last month.
    pub fn end(&self) -> Month {
        self.end
    }

    /// Number of months covered.
    pub fn len(&self) -> usize {
        self.start.count_to(self.end)
    }

    /// Always false; a range covers at least one month.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Every month, in calendar order.
    pub fn months(&self) -> Vec<Month> {
        self.start.range_to(self.end)
    }

    /// Whether `month` lies inside the span.
    pub fn contains(&self, month: Month) -> bool {
        self.start <= month && month <= self.end
    }

    /// Header text: `Jan - Dec 2025` or `Feb 2024 - Jan 2025`.
    pub fn label(&self) -> String {
        if self.start.year() == self.end.year() {
            format!(
                "{} - {} {}",
                self.start.short_name(),
                self.end.short_name(),
                self.end.year()
            )
        } else {
            format!(
                "{} {} - {} {}",
                self.start.short_name(),
                self.start.year(),
                self.end.short_name(),
                self.end.year()
            )
        }
    }
}

/// Named windows offered by the grid's range selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangePreset {
    /// Current month and the eleven before it.
    Rolling12,
    /// January to December of the current year.
    ThisYear,
    /// January to December of the previous year.
    LastYear,
    /// The three months of the current quarter.
    ThisQuarter,
    /// User-chosen bounds.
    Custom {
        /// First month.
        start: Month,
        /// Last month.
        end: Month,
    },
}

impl RangePreset {
    /// Presets listed in the selector, custom excluded.
    pub const NAMED: [RangePreset; 4] = [
        RangePreset::Rolling12,
        RangePreset::ThisYear,
        RangePreset::LastYear,
        RangePreset::ThisQuarter,
    ];

    /// Config identifier (`rolling-12`).
    pub fn id(&self) -> &'static str {
        match self {
            RangePreset::Rolling12 => "rolling-12",
            RangePreset::ThisYear => "this-year",
            RangePreset::LastYear => "last-year",
            RangePreset::ThisQuarter => "this-quarter",
            RangePreset::Custom { .. } => "custom",
        }
    }

    /// Look up a named preset by identifier.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::NAMED
            .into_iter()
            .find(|preset| preset.id() == id.trim())
    }

    /// Display name.
    pub fn label(&self) -> &'static str {
        match self {
            RangePreset::Rolling12 => "Rolling 12 Months",
            RangePreset::ThisYear => "This Year",
            RangePreset::LastYear => "Last Year",
            RangePreset::ThisQuarter => "This Quarter",
            RangePreset::Custom { .. } => "Custom Range",
        }
    }

    /// Concrete span relative to `today`.
    pub fn resolve(&self, today: Month) -> Result<DateRange, RangeError> {
        let (start, end) = match *self {
            RangePreset::Rolling12 => (today.offset(-11), today),
            RangePreset::ThisYear => year_bounds(today.year()),
            RangePreset::LastYear => year_bounds(today.year() - 1),
            RangePreset::ThisQuarter => {
                let start = today.quarter_start();
                (start, start.offset(2))
            }
            RangePreset::Custom { start, end } => {
                return DateRange::bounded(start, end, MAX_CUSTOM_MONTHS)
            }
        };
        DateRange::bounded(start, end, MAX_CUSTOM_MONTHS)
    }
}

fn year_bounds(year: i32) -> (Month, Month) {
    (Month::january(year), Month::december(year))
}

/// Source of the months currently loaded into the grid.
#[derive(Debug, Clone)]
pub struct DateRangeStore {
    today: Month,
    preset: RangePreset,
    range: DateRange,
}

impl DateRangeStore {
    /// Store resolved against `today`.
    pub fn new(today: Month, preset: RangePreset) -> Result<Self, RangeError> {
        let range = preset.resolve(today)?;
        Ok(Self {
            today,
            preset,
            range,
        })
    }

    /// Switch presets; an invalid selection keeps the previous range.
    pub fn select(&mut self, preset: RangePreset) -> Result<DateRange, RangeError> {
        let range = preset.resolve(self.today)?;
        info!(preset = preset.id(), range = %range.label(), "date range selected");
        self.preset = preset;
        self.range = range;
        Ok(range)
    }

    /// Reference month for relative presets.
    pub fn today(&self) -> Month {
        self.today
    }

    /// Active preset.
    pub fn preset(&self) -> RangePreset {
        self.preset
    }

    /// Active span.
    pub fn range(&self) -> DateRange {
        self.range
    }

    /// Loaded months in calendar order.
    pub fn months(&self) -> Vec<Month> {
        self.range.months()
    }
}

/// Month windows offered by the batch adjustment modal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchRange {
    /// Current month plus the two after it.
    Next3,
    /// Current month plus the five after it.
    Next6,
    /// Current month plus the eleven after it.
    Next12,
    /// User-chosen bounds.
    Custom {
        /// First month.
        start: Month,
        /// Last month.
        end: Month,
    },
}

impl BatchRange {
    /// Presets shown as buttons.
    pub const PRESETS: [BatchRange; 3] = [BatchRange::Next3, BatchRange::Next6, BatchRange::Next12];

    /// Display name.
    pub fn label(&self) -> &'static str {
        match self {
            BatchRange::Next3 => "Next 3 months",
            BatchRange::Next6 => "Next 6 months",
            BatchRange::Next12 => "Next 12 months",
            BatchRange::Custom { .. } => "Custom",
        }
    }

    /// Concrete months starting from `today`.
    pub fn resolve(&self, today: Month) -> Result<Vec<Month>, RangeError> {
        let range = match *self {
            BatchRange::Next3 => DateRange::bounded(today, today.offset(2), MAX_CUSTOM_MONTHS),
            BatchRange::Next6 => DateRange::bounded(today, today.offset(5), MAX_CUSTOM_MONTHS),
            BatchRange::Next12 => DateRange::bounded(today, today.offset(11), MAX_CUSTOM_MONTHS),
            BatchRange::Custom { start, end } => DateRange::bounded(start, end, MAX_CUSTOM_MONTHS),
        }?;
        Ok(range.months())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(s: &str) -> Month {
        s.parse().expect("valid month")
    }

    #[test]
    fn presets_resolve_against_today() -> anyhow::Result<()> {
        let today = m("2025-05");
        let rolling = RangePreset::Rolling12.resolve(today)?;
        assert_eq!((rolling.start(), rolling.end()), (m("2024-06"), m("2025-05")));
        assert_eq!(rolling.len(), 12);

        let year = RangePreset::ThisYear.resolve(today)?;
        assert_eq!((year.start(), year.end()), (m("2025-01"), m("2025-12")));
        let last = RangePreset::LastYear.resolve(today)?;
        assert_eq!((last.start(), last.end()), (m("2024-01"), m("2024-12")));
        let quarter = RangePreset::ThisQuarter.resolve(today)?;
        assert_eq!(quarter.months(), vec![m("2025-04"), m("2025-05"), m("2025-06")]);
        Ok(())
    }

    #[test]
    fn custom_range_is_capped() {
        let ok = RangePreset::Custom {
            start: m("2024-01"),
            end: m("2026-12"),
        };
        assert_eq!(ok.resolve(m("2025-01")).map(|r| r.len()), Ok(36));

        let too_long = RangePreset::Custom {
            start: m("2022-01"),
            end: m("2025-01"),
        };
        assert_eq!(
            too_long.resolve(m("2025-01")),
            Err(RangeError::ExceedsMaxMonths { months: 37, max: 36 })
        );

        let inverted = RangePreset::Custom {
            start: m("2025-12"),
            end: m("2025-01"),
        };
        assert_eq!(inverted.resolve(m("2025-01")), Err(RangeError::Inverted));
    }

    #[test]
    fn store_keeps_previous_range_on_error() -> anyhow::Result<()> {
        let mut store = DateRangeStore::new(m("2025-05"), RangePreset::Rolling12)?;
        let bad = RangePreset::Custom {
            start: m("2020-01"),
            end: m("2025-01"),
        };
        assert!(store.select(bad).is_err());
        assert_eq!(store.preset(), RangePreset::Rolling12);
        assert_eq!(store.months().len(), 12);
        store.select(RangePreset::ThisQuarter)?;
        assert_eq!(store.months().len(), 3);
        Ok(())
    }

    #[test]
    fn batch_presets_start_this_month() -> anyhow::Result<()> {
        let today = m("2025-11");
        assert_eq!(
            BatchRange::Next3.resolve(today)?,
            vec![m("2025-11"), m("2025-12"), m("2026-01")]
        );
        assert_eq!(BatchRange::Next12.resolve(today)?.len(), 12);
        let custom = BatchRange::Custom {
            start: m("2025-01"),
            end: m("2028-01"),
        };
        assert!(custom.resolve(today).is_err());
        Ok(())
    }

    #[test]
    fn labels() {
        let same = DateRange::bounded(m("2025-01"), m("2025-12"), 36).expect("valid");
        assert_eq!(same.label(), "Jan - Dec 2025");
        let cross = DateRange::bounded(m("2024-02"), m("2025-01"), 36).expect("valid");
        assert_eq!(cross.label(), "Feb 2024 - Jan 2025");
        assert_eq!(RangePreset::from_id("this-quarter"), Some(RangePreset::ThisQuarter));
        assert_eq!(RangePreset::from_id("custom"), None);
    }
}
