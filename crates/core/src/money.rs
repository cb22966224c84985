//! Currency text parsing and integer-cent arithmetic.
//!
//! Every amount is an `i64` count of cents. Parsing works on the decimal
//! digits directly so no value ever passes through floating point.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ValidationError;

/// Currency symbols stripped before numeric parsing.
const CURRENCY_SYMBOLS: &[char] = &['€', '$', '£', '¥'];

static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-)?([0-9]*)(?:\.([0-9]*))?$").expect("failed to compile amount regex")
});

/// Largest budget amount accepted, `999,999,999,999.99`.
pub const MAX_CENTS: i64 = 99_999_999_999_999;

/// Percentage expressed in hundredths of a percent (`250` = 2.5%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Percent(i64);

impl Percent {
    /// Whole-percent constructor.
    pub const fn whole(percent: i64) -> Self {
        Self(percent * 100)
    }

    /// Constructor from hundredths of a percent.
    pub const fn from_hundredths(hundredths: i64) -> Self {
        Self(hundredths)
    }

    /// Raw hundredths of a percent.
    pub const fn hundredths(self) -> i64 {
        self.0
    }

    /// The same magnitude with the sign flipped.
    pub const fn negate(self) -> Self {
        Self(-self.0)
    }
}

impl std::fmt::Display for Percent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        if abs % 100 == 0 {
            write!(f, "{sign}{}%", abs / 100)
        } else {
            let frac = format!("{:02}", abs % 100);
            write!(f, "{sign}{}.{}%", abs / 100, frac.trim_end_matches('0'))
        }
    }
}

/// Parse free-form budget text into cents.
///
/// Currency symbols, thousands separators and surrounding whitespace are
/// ignored. Empty input is zero. Fractions beyond two places round half away
/// from zero (`400.995` → `40100`).
pub fn parse_cents(raw: &str) -> Result<i64, ValidationError> {
    let (negative, cents) = parse_scaled(raw, 2)?;
    if negative && cents != 0 {
        return Err(ValidationError::Negative);
    }
    if cents > MAX_CENTS {
        return Err(ValidationError::TooLarge);
    }
    Ok(cents)
}

/// Parse percentage text (`5`, `2.5%`, `-10`) into hundredths of a percent.
///
/// Unlike amounts, percentages may be negative. Empty input is rejected.
pub fn parse_percent(raw: &str) -> Result<Percent, ValidationError> {
    let cleaned = raw.trim().trim_end_matches('%');
    if cleaned.trim().is_empty() {
        return Err(ValidationError::NotANumber);
    }
    let (negative, hundredths) = parse_scaled(cleaned, 2)?;
    Ok(Percent(if negative { -hundredths } else { hundredths }))
}

/// Parses `raw` as an unsigned magnitude scaled by `10^scale` plus a sign flag.
fn parse_scaled(raw: &str, scale: u32) -> Result<(bool, i64), ValidationError> {
    let cleaned: String = raw
        .chars()
        .filter(|ch| !CURRENCY_SYMBOLS.contains(ch) && *ch != ',' && !ch.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return Ok((false, 0));
    }

    let caps = AMOUNT_RE
        .captures(&cleaned)
        .ok_or(ValidationError::NotANumber)?;
    let negative = caps.get(1).is_some();
    let whole = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let frac = caps.get(3).map(|m| m.as_str()).unwrap_or("");
    if whole.is_empty() && frac.is_empty() {
        return Err(ValidationError::NotANumber);
    }

    let factor = 10_i64.pow(scale);
    let mut value: i64 = 0;
    for digit in whole.bytes() {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(i64::from(digit - b'0')))
            .ok_or(ValidationError::NotANumber)?;
    }
    value = value.checked_mul(factor).ok_or(ValidationError::NotANumber)?;

    let digits = frac.as_bytes();
    let mut place = factor / 10;
    for digit in digits.iter().take(scale as usize) {
        value = value
            .checked_add(i64::from(digit - b'0') * place)
            .ok_or(ValidationError::NotANumber)?;
        place /= 10;
    }
    if let Some(next) = digits.get(scale as usize) {
        if *next >= b'5' {
            value = value.checked_add(1).ok_or(ValidationError::NotANumber)?;
        }
    }

    Ok((negative, value))
}

/// Integer division rounding half away from zero.
pub fn div_round_half_away(numerator: i128, denominator: i128) -> i128 {
    debug_assert!(denominator > 0);
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder.abs() * 2 >= denominator {
        quotient + numerator.signum()
    } else {
        quotient
    }
}

/// `round(base + base × p / 100)`, clamped to `0..=MAX_CENTS`.
pub fn apply_percent(base_cents: i64, percent: Percent) -> i64 {
    let delta = div_round_half_away(i128::from(base_cents) * i128::from(percent.0), 10_000);
    let result = i128::from(base_cents) + delta;
    result.clamp(0, i128::from(MAX_CENTS)) as i64
}

/// Two-decimal plain rendering used to seed edit drafts (`50000` → `500.00`).
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Full currency rendering with thousands separators (`123456` → `€1,234.56`).
pub fn format_currency(cents: i64, symbol: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!(
        "{sign}{symbol}{}.{:02}",
        group_thousands(abs / 100),
        abs % 100
    )
}

/// Compact cell rendering: whole units below 1000, `K` with one decimal above.
pub fn format_compact(cents: i64, symbol: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let units = abs / 100;
    if units < 1000 {
        return format!("{sign}{symbol}{units}");
    }
    // tenths of a thousand, rounded half up on the cent value
    let tenths = (abs + 5_000) / 10_000;
    if tenths % 10 == 0 {
        format!("{sign}{symbol}{}K", tenths / 10)
    } else {
        format!("{sign}{symbol}{}.{}K", tenths / 10, tenths % 10)
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
