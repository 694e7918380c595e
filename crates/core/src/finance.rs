//! Pure money math shared by eligibility scoring and derived workflow fields.
//!
//! Every function works on unrounded [`Decimal`] values; rounding happens only
//! through [`round_for_display`] / [`round_whole`] at the presentation edge.
//! Arithmetic saturates at the [`Decimal`] range so oversized inputs clamp
//! instead of panicking.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "months", rename_all = "snake_case")]
pub enum PayoffEstimate {
    Months(u32),
    /// The payment never covers the monthly interest.
    NeverPaysOff,
}

impl PayoffEstimate {
    pub fn months(self) -> Option<u32> {
        match self {
            Self::Months(months) => Some(months),
            Self::NeverPaysOff => None,
        }
    }

    pub fn display(self) -> String {
        match self {
            Self::Months(1) => "1 month".to_string(),
            Self::Months(months) => format!("{months} months"),
            Self::NeverPaysOff => "never pays off".to_string(),
        }
    }
}

/// Totals itemized amounts; negative items contribute nothing.
pub fn sum_itemized<I>(items: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    items
        .into_iter()
        .filter(|item| *item > Decimal::ZERO)
        .fold(Decimal::ZERO, |total, item| total.saturating_add(item))
}

/// Income minus expenses; negative means a monthly deficit.
pub fn monthly_surplus(income: Decimal, expenses: Decimal) -> Decimal {
    income.saturating_sub(expenses)
}

/// What a party could pay: positive disposable income over the horizon plus
/// positive asset equity. A deficit contributes zero, never a negative amount.
pub fn collection_potential(
    monthly_disposable_income: Decimal,
    asset_equity: Decimal,
    horizon_months: u32,
) -> Decimal {
    let income_part =
        monthly_disposable_income.max(Decimal::ZERO).saturating_mul(Decimal::from(horizon_months));
    income_part.saturating_add(asset_equity.max(Decimal::ZERO))
}

/// Equity after a forced-sale discount; encumbrances beyond value yield zero.
pub fn quick_sale_equity(value: Decimal, encumbrance: Decimal, factor: Decimal) -> Decimal {
    value.saturating_mul(factor).saturating_sub(encumbrance).max(Decimal::ZERO)
}

/// Months to retire `principal` with a fixed payment at `monthly_rate`.
///
/// Returns [`PayoffEstimate::NeverPaysOff`] whenever the payment does not
/// exceed the first month's interest, instead of feeding a non-positive value
/// to the logarithm.
pub fn amortized_months(
    principal: Decimal,
    monthly_payment: Decimal,
    monthly_rate: Decimal,
) -> PayoffEstimate {
    if principal <= Decimal::ZERO {
        return PayoffEstimate::Months(0);
    }
    if monthly_payment <= Decimal::ZERO {
        return PayoffEstimate::NeverPaysOff;
    }

    let rate = monthly_rate.max(Decimal::ZERO);
    if rate.is_zero() {
        return principal
            .checked_div(monthly_payment)
            .and_then(|months| months.ceil().to_u32())
            .map(PayoffEstimate::Months)
            .unwrap_or(PayoffEstimate::NeverPaysOff);
    }

    if monthly_payment <= principal.saturating_mul(rate) {
        return PayoffEstimate::NeverPaysOff;
    }

    let (Some(p), Some(m), Some(r)) = (principal.to_f64(), monthly_payment.to_f64(), rate.to_f64())
    else {
        return PayoffEstimate::NeverPaysOff;
    };

    let months = -(1.0 - p * r / m).ln() / (1.0 + r).ln();
    if !months.is_finite() || months < 0.0 || months > f64::from(u32::MAX) {
        return PayoffEstimate::NeverPaysOff;
    }

    PayoffEstimate::Months(months.ceil() as u32)
}

/// Annual percentage (e.g. `8` for 8%) to a monthly decimal rate.
pub fn monthly_rate_from_annual_pct(annual_pct: Decimal) -> Decimal {
    annual_pct / Decimal::ONE_HUNDRED / Decimal::from(12)
}

pub fn days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

/// Ratio clamped to `0.0..=1.0`; a zero denominator yields `0.0`.
pub fn clamped_ratio(numerator: Decimal, denominator: Decimal) -> f64 {
    if denominator <= Decimal::ZERO {
        return 0.0;
    }

    match numerator.checked_div(denominator) {
        Some(ratio) => ratio.to_f64().unwrap_or(0.0).clamp(0.0, 1.0),
        // only a huge numerator over a tiny denominator overflows
        None if numerator > Decimal::ZERO => 1.0,
        None => 0.0,
    }
}

pub fn round_for_display(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn round_whole(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}
