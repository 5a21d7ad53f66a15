//! Return template — year-by-year projection of premiums against the death
//! benefit for a stored policy.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Serialize;

use crate::error::TemplateError;
use crate::onboarding::model::{MAX_LE_MONTHS, PolicyRecord, PremiumSchedule};
use crate::onboarding::years::{BUFFER_YEARS, years_covered};

/// Decimal places kept for return ratios.
const RATIO_DP: u32 = 6;

/// Position of a projection year relative to life expectancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LeMarker {
    #[serde(rename = "LE")]
    Le,
    #[serde(rename = "LE+1")]
    LePlus1,
    #[serde(rename = "LE+2")]
    LePlus2,
    #[serde(rename = "LE+3")]
    LePlus3,
}

impl LeMarker {
    /// Marker for row `index` when LE falls in year `remaining_le_years`.
    fn for_row(index: u32, remaining_le_years: u32) -> Option<Self> {
        let le_index = remaining_le_years.checked_sub(1)?;
        match index.checked_sub(le_index)? {
            0 => Some(Self::Le),
            1 => Some(Self::LePlus1),
            2 => Some(Self::LePlus2),
            3 => Some(Self::LePlus3),
            _ => None,
        }
    }
}

/// One year of the projection table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionRow {
    pub year: i32,
    pub premium: Decimal,
    pub cumulative_premium: Decimal,
    pub total_cost: Decimal,
    pub profit: Decimal,
    pub simple_return: Decimal,
    pub average_annual_return: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<LeMarker>,
}

/// The generated template for one policy and investment amount.
#[derive(Debug, Clone, Serialize)]
pub struct ReturnTemplate {
    pub insured_name: String,
    pub carrier_name: String,
    pub age: i64,
    pub life_expectancy_months: u32,
    pub elapsed_months: i64,
    pub remaining_le_months: u32,
    pub remaining_le_years: u32,
    pub death_benefit: Decimal,
    pub investment: Decimal,
    /// Premiums due this month and the next two.
    pub next_three_months_premium: Decimal,
    pub rows: Vec<ProjectionRow>,
}

/// Whole months from `from` to `to`, ignoring days.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    i64::from(to.year() - from.year()) * 12 + i64::from(to.month()) - i64::from(from.month())
}

/// Premium due in `month` (1-12) of `year`.
///
/// A year with fewer than twelve entries is aligned to the end of the
/// year: nine entries cover April to December and January to March are 0.
pub fn monthly_premium(schedule: &PremiumSchedule, year: i32, month: u32) -> f64 {
    let Some(values) = schedule.get(year) else {
        return 0.0;
    };
    let month = month.clamp(1, 12) as usize;
    let n = values.len();
    if n >= 12 {
        return values[month - 1];
    }
    let offset = 12 - n;
    (month - 1)
        .checked_sub(offset)
        .and_then(|idx| values.get(idx).copied())
        .unwrap_or(0.0)
}

fn money(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

fn ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    numerator
        .checked_div(denominator)
        .map(|r| r.round_dp(RATIO_DP))
        .unwrap_or(Decimal::ZERO)
}

/// Build the return template for `record` as of `today`.
pub fn generate(
    record: &PolicyRecord,
    investment: Decimal,
    today: NaiveDate,
) -> Result<ReturnTemplate, TemplateError> {
    if investment < Decimal::ZERO {
        return Err(TemplateError::InvalidInvestment(format!(
            "must not be negative (got {investment})"
        )));
    }

    let meta = &record.metadata;
    let elapsed_months = months_between(meta.le_report_date, today);
    // Stored rows never went through step-1 checks, so clamp here as well.
    let remaining_le_months = (i64::from(meta.life_expectancy_months) - elapsed_months)
        .clamp(0, i64::from(MAX_LE_MONTHS)) as u32;
    let remaining_le_years = years_covered(remaining_le_months);
    let total_years = remaining_le_years + BUFFER_YEARS;

    let days_at_report = (meta.le_report_date - meta.date_of_birth).num_days() as f64;
    let age = (days_at_report / 365.25 + elapsed_months as f64 / 12.0) as i64;

    let next_three_months_premium = (0..3u32)
        .map(|offset| {
            let zero_based = today.month0() + offset;
            let year = today.year() + (zero_based / 12) as i32;
            let month = zero_based % 12 + 1;
            money(monthly_premium(&record.premiums, year, month))
        })
        .sum();

    let mut cumulative = Decimal::ZERO;
    let rows = (0..total_years)
        .map(|i| {
            let year = today.year() + i as i32;
            let premium = money(record.premiums.annual_total(year));
            cumulative += premium;
            let total_cost = investment + cumulative;
            let profit = meta.death_benefit - total_cost;
            let simple_return = ratio(profit, total_cost);
            ProjectionRow {
                year,
                premium,
                cumulative_premium: cumulative,
                total_cost,
                profit,
                simple_return,
                average_annual_return: ratio(simple_return, Decimal::from(i + 1)),
                marker: LeMarker::for_row(i, remaining_le_years),
            }
        })
        .collect();

    Ok(ReturnTemplate {
        insured_name: meta.insured_name.clone(),
        carrier_name: meta.carrier_name.clone(),
        age,
        life_expectancy_months: meta.life_expectancy_months,
        elapsed_months,
        remaining_le_months,
        remaining_le_years,
        death_benefit: meta.death_benefit,
        investment,
        next_three_months_premium,
        rows,
    })
}
