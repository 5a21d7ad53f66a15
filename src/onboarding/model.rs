//! Policy record data models.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::OnboardingError;

/// Earliest date accepted for date of birth and LE report date.
pub fn earliest_accepted_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Longest life expectancy accepted, in months (100 years).
pub const MAX_LE_MONTHS: u32 = 1200;

/// Step-1 form input, before precondition checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataInput {
    #[serde(default)]
    pub insured_name: String,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub carrier_name: String,
    pub life_expectancy_months: u32,
    pub le_report_date: NaiveDate,
    #[serde(default)]
    pub death_benefit: Decimal,
    #[serde(default)]
    pub internal_cost: Decimal,
}

impl MetadataInput {
    /// Check every field against its valid range and freeze the result.
    ///
    /// - `date_of_birth`, `le_report_date`: 1900-01-01 ..= `today`
    /// - `life_expectancy_months`: 1 ..= [`MAX_LE_MONTHS`]
    /// - `death_benefit`: >= 0
    /// - `internal_cost`: >= 0, rounded to cents
    ///
    /// Names are trimmed but may be empty.
    pub fn validate(self, today: NaiveDate) -> Result<PolicyMetadata, OnboardingError> {
        check_date("date_of_birth", self.date_of_birth, today)?;
        check_date("le_report_date", self.le_report_date, today)?;

        if self.life_expectancy_months < 1 {
            return Err(OnboardingError::InvalidField {
                field: "life_expectancy_months",
                message: "must be at least 1 month".to_string(),
            });
        }
        if self.life_expectancy_months > MAX_LE_MONTHS {
            return Err(OnboardingError::InvalidField {
                field: "life_expectancy_months",
                message: format!(
                    "must be at most {MAX_LE_MONTHS} months (got {})",
                    self.life_expectancy_months
                ),
            });
        }
        if self.death_benefit < Decimal::ZERO {
            return Err(OnboardingError::InvalidField {
                field: "death_benefit",
                message: format!("must not be negative (got {})", self.death_benefit),
            });
        }
        if self.internal_cost < Decimal::ZERO {
            return Err(OnboardingError::InvalidField {
                field: "internal_cost",
                message: format!("must not be negative (got {})", self.internal_cost),
            });
        }

        Ok(PolicyMetadata {
            insured_name: self.insured_name.trim().to_string(),
            date_of_birth: self.date_of_birth,
            carrier_name: self.carrier_name.trim().to_string(),
            life_expectancy_months: self.life_expectancy_months,
            le_report_date: self.le_report_date,
            death_benefit: self.death_benefit.normalize(),
            internal_cost: self.internal_cost.round_dp(2),
        })
    }
}

fn check_date(field: &'static str, value: NaiveDate, today: NaiveDate) -> Result<(), OnboardingError> {
    let earliest = earliest_accepted_date();
    if value < earliest {
        return Err(OnboardingError::InvalidField {
            field,
            message: format!("{value} is before {earliest}"),
        });
    }
    if value > today {
        return Err(OnboardingError::InvalidField {
            field,
            message: format!("{value} is in the future"),
        });
    }
    Ok(())
}

/// Policy metadata captured in step 1. Never changed once captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyMetadata {
    pub insured_name: String,
    pub date_of_birth: NaiveDate,
    pub carrier_name: String,
    pub life_expectancy_months: u32,
    pub le_report_date: NaiveDate,
    pub death_benefit: Decimal,
    pub internal_cost: Decimal,
}

/// Parsed monthly premiums keyed by calendar year, ascending.
///
/// Years without any premiums are never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PremiumSchedule(BTreeMap<i32, Vec<f64>>);

impl PremiumSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a year's premiums. An empty list is ignored.
    pub fn insert(&mut self, year: i32, premiums: Vec<f64>) {
        if !premiums.is_empty() {
            self.0.insert(year, premiums);
        }
    }

    pub fn get(&self, year: i32) -> Option<&[f64]> {
        self.0.get(&year).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &[f64])> {
        self.0.iter().map(|(year, values)| (*year, values.as_slice()))
    }

    /// Total of all premiums entered for `year` (0 if absent).
    pub fn annual_total(&self, year: i32) -> f64 {
        self.get(year).map(|v| v.iter().sum()).unwrap_or(0.0)
    }
}

impl FromIterator<(i32, Vec<f64>)> for PremiumSchedule {
    fn from_iter<T: IntoIterator<Item = (i32, Vec<f64>)>>(iter: T) -> Self {
        let mut schedule = Self::new();
        for (year, premiums) in iter {
            schedule.insert(year, premiums);
        }
        schedule
    }
}

/// A completed onboarding record, ready for the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub metadata: PolicyMetadata,
    pub premiums: PremiumSchedule,
}

impl PolicyRecord {
    /// Assemble a record. Fails when no year has any premium.
    pub fn new(metadata: PolicyMetadata, premiums: PremiumSchedule) -> Result<Self, OnboardingError> {
        if premiums.is_empty() {
            return Err(OnboardingError::EmptySchedule);
        }
        Ok(Self { metadata, premiums })
    }

    /// Selection key used when listing stored policies (`"Jane Doe"` -> `"jane_doe"`).
    pub fn key(&self) -> String {
        policy_key(&self.metadata.insured_name)
    }
}

/// Lower-cased name with spaces replaced by underscores.
pub fn policy_key(insured_name: &str) -> String {
    insured_name.to_lowercase().replace(' ', "_")
}
