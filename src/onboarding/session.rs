//! OnboardingSession — the two-step wizard state for one user.
//!
//! The session is owned by whoever drives the wizard (the HTTP layer keeps
//! one per browser session) and is passed by `&mut` into each transition.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::OnboardingError;
use crate::store::{PolicyRow, RecordStore};

use super::model::{MetadataInput, PolicyMetadata, PolicyRecord, PremiumSchedule};
use super::premiums::parse_year_block_report;
use super::state::OnboardingStep;
use super::years::compute_years;

/// Result of a successful step-2 submission.
#[derive(Debug, Clone, Serialize)]
pub struct SavedPolicy {
    pub record: PolicyRecord,
    /// Non-empty lines that could not be read as amounts, by year.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub dropped_lines: BTreeMap<i32, Vec<usize>>,
}

/// Snapshot of a session for display.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub id: Uuid,
    pub step: OnboardingStep,
    pub step_number: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PolicyMetadata>,
    pub years: Vec<i32>,
    pub pending_premiums: BTreeMap<i32, String>,
}

/// One onboarding session.
#[derive(Debug, Clone)]
pub struct OnboardingSession {
    id: Uuid,
    step: OnboardingStep,
    metadata: Option<PolicyMetadata>,
    years: Vec<i32>,
    pending_text: BTreeMap<i32, String>,
}

impl Default for OnboardingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl OnboardingSession {
    /// A fresh session on step 1 with nothing captured.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            step: OnboardingStep::default(),
            metadata: None,
            years: Vec::new(),
            pending_text: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn step(&self) -> OnboardingStep {
        self.step
    }

    pub fn metadata(&self) -> Option<&PolicyMetadata> {
        self.metadata.as_ref()
    }

    /// Years premiums are collected for; empty before step 1 completes.
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    /// Raw premium text from the last step-2 submission.
    pub fn pending_text(&self) -> &BTreeMap<i32, String> {
        &self.pending_text
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            id: self.id,
            step: self.step,
            step_number: self.step.number(),
            metadata: self.metadata.clone(),
            years: self.years.clone(),
            pending_premiums: self.pending_text.clone(),
        }
    }

    /// Step 1: capture policy metadata and derive the premium years.
    ///
    /// On success the session moves to [`OnboardingStep::AwaitingPremiums`]
    /// and any earlier premium text is cleared. A failed check leaves the
    /// session untouched.
    pub fn submit_metadata(
        &mut self,
        input: MetadataInput,
        today: NaiveDate,
    ) -> Result<&[i32], OnboardingError> {
        self.require(OnboardingStep::AwaitingMetadata, "submit policy information")?;

        let metadata = input.validate(today)?;
        let years = compute_years(metadata.life_expectancy_months, metadata.le_report_date, today);

        info!(
            session = %self.id,
            insured = %metadata.insured_name,
            first_year = years.first().copied().unwrap_or_default(),
            year_count = years.len(),
            "Policy information captured"
        );

        self.metadata = Some(metadata);
        self.years = years;
        self.pending_text.clear();
        self.step = OnboardingStep::AwaitingPremiums;
        Ok(&self.years)
    }

    /// Step 2: parse pasted premiums per year and append the record.
    ///
    /// Only years from the session's sequence are read; a missing year
    /// counts as empty text. The session stays on step 2 whatever the
    /// outcome, and keeps the submitted text so a failed save can be
    /// retried.
    pub async fn submit_premiums(
        &mut self,
        raw_text_by_year: BTreeMap<i32, String>,
        store: &dyn RecordStore,
    ) -> Result<SavedPolicy, OnboardingError> {
        self.require(OnboardingStep::AwaitingPremiums, "save premiums")?;
        let metadata = self
            .metadata
            .clone()
            .ok_or_else(|| OnboardingError::WrongStep {
                action: "save premiums",
                step: "policy information is missing".to_string(),
            })?;

        self.pending_text = raw_text_by_year
            .into_iter()
            .filter(|(year, _)| self.years.contains(year))
            .collect();

        let mut premiums = PremiumSchedule::new();
        let mut dropped_lines = BTreeMap::new();
        for &year in &self.years {
            let text = self.pending_text.get(&year).map(String::as_str).unwrap_or("");
            let parsed = parse_year_block_report(text);
            if !parsed.dropped_lines.is_empty() {
                debug!(
                    session = %self.id,
                    year,
                    lines = ?parsed.dropped_lines,
                    "Dropped unparsable premium lines"
                );
                dropped_lines.insert(year, parsed.dropped_lines);
            }
            premiums.insert(year, parsed.values);
        }

        let record = PolicyRecord::new(metadata, premiums)?;
        let row = PolicyRow::from_record(&record)?;

        if let Err(e) = store.append(&row).await {
            warn!(session = %self.id, store = store.name(), error = %e, "Failed to save policy");
            return Err(e.into());
        }

        let saved_years: Vec<i32> = record.premiums.years().collect();
        info!(
            session = %self.id,
            store = store.name(),
            insured = %record.metadata.insured_name,
            years = ?saved_years,
            "Policy saved"
        );
        Ok(SavedPolicy {
            record,
            dropped_lines,
        })
    }

    /// Abandon everything and return to step 1.
    pub fn restart(&mut self) {
        debug!(session = %self.id, from = %self.step, "Onboarding restarted");
        self.step = OnboardingStep::AwaitingMetadata;
        self.metadata = None;
        self.years.clear();
        self.pending_text.clear();
    }

    fn require(&self, step: OnboardingStep, action: &'static str) -> Result<(), OnboardingError> {
        if self.step == step {
            Ok(())
        } else {
            Err(OnboardingError::WrongStep {
                action,
                step: self.step.to_string(),
            })
        }
    }
}
