//! Premium-year range derived from a life-expectancy estimate.

use chrono::{Datelike, NaiveDate};

/// Years of premium funding planned beyond the life-expectancy horizon.
pub const BUFFER_YEARS: u32 = 3;

/// Whole years covered by `months`, rounded up (13 months -> 2 years).
pub fn years_covered(months: u32) -> u32 {
    months.div_ceil(12)
}

/// Number of calendar years premiums are collected for.
pub fn remaining_years(life_expectancy_months: u32) -> u32 {
    years_covered(life_expectancy_months) + BUFFER_YEARS
}

/// Ascending calendar years for which premiums must be collected.
///
/// The schedule starts at the later of the report year and the current
/// year, so a stale report never produces years in the past.
/// `life_expectancy_months` must be at least 1; that is checked by
/// [`MetadataInput::validate`](super::model::MetadataInput::validate).
pub fn compute_years(
    life_expectancy_months: u32,
    le_report_date: NaiveDate,
    today: NaiveDate,
) -> Vec<i32> {
    let start_year = le_report_date.year().max(today.year());
    (0..remaining_years(life_expectancy_months))
        .map(|offset| start_year + offset as i32)
        .collect()
}
