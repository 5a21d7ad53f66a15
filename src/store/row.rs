//! Row encoding for the policies sheet.
//!
//! Column order is fixed; downstream consumers of the sheet read these
//! eight columns positionally and by header name.

use std::collections::BTreeMap;
use std::io;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::onboarding::model::{PolicyMetadata, PolicyRecord, PremiumSchedule};

/// Header row of the policies sheet, in column order.
pub const HEADERS: [&str; 8] = [
    "insured_name",
    "dob",
    "carrier",
    "le_months",
    "le_report_date",
    "death_benefit",
    "internal_cost",
    "premiums_json",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One persisted policy, as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyRow {
    pub insured_name: String,
    pub date_of_birth: String,
    pub carrier_name: String,
    pub life_expectancy_months: u32,
    pub le_report_date: String,
    pub death_benefit: Decimal,
    pub internal_cost: Decimal,
    pub premiums_json: String,
}

impl PolicyRow {
    pub fn from_record(record: &PolicyRecord) -> Result<Self, StoreError> {
        let meta = &record.metadata;
        Ok(Self {
            insured_name: meta.insured_name.clone(),
            date_of_birth: meta.date_of_birth.format(DATE_FORMAT).to_string(),
            carrier_name: meta.carrier_name.clone(),
            life_expectancy_months: meta.life_expectancy_months,
            le_report_date: meta.le_report_date.format(DATE_FORMAT).to_string(),
            death_benefit: meta.death_benefit,
            internal_cost: meta.internal_cost,
            premiums_json: encode_schedule(&record.premiums)?,
        })
    }

    /// The eight cell values in column order.
    pub fn to_values(&self) -> Vec<Value> {
        vec![
            Value::from(self.insured_name.as_str()),
            Value::from(self.date_of_birth.as_str()),
            Value::from(self.carrier_name.as_str()),
            Value::from(self.life_expectancy_months),
            Value::from(self.le_report_date.as_str()),
            decimal_value(self.death_benefit),
            decimal_value(self.internal_cost),
            Value::from(self.premiums_json.as_str()),
        ]
    }

    /// Rebuild a row from cells keyed by header name.
    ///
    /// Numeric columns accept either numbers or numeric text, since sheet
    /// cells may come back in either form.
    pub fn from_named(cells: &Map<String, Value>) -> Result<Self, StoreError> {
        let text = |key: &str| cells.get(key).map(value_to_text).unwrap_or_default();
        let months = text("le_months");

        Ok(Self {
            insured_name: text("insured_name"),
            date_of_birth: text("dob"),
            carrier_name: text("carrier"),
            life_expectancy_months: parse_months(&months)?,
            le_report_date: text("le_report_date"),
            death_benefit: parse_decimal("death_benefit", &text("death_benefit"))?,
            internal_cost: parse_decimal("internal_cost", &text("internal_cost"))?,
            premiums_json: text("premiums_json"),
        })
    }

    /// Rebuild a row from positional cells.
    pub fn from_values(values: &[Value]) -> Result<Self, StoreError> {
        let cells: Map<String, Value> = HEADERS
            .iter()
            .zip(values.iter())
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        Self::from_named(&cells)
    }

    /// Decode back into a [`PolicyRecord`].
    pub fn to_record(&self) -> Result<PolicyRecord, StoreError> {
        let metadata = PolicyMetadata {
            insured_name: self.insured_name.clone(),
            date_of_birth: parse_date("dob", &self.date_of_birth)?,
            carrier_name: self.carrier_name.clone(),
            life_expectancy_months: self.life_expectancy_months,
            le_report_date: parse_date("le_report_date", &self.le_report_date)?,
            death_benefit: self.death_benefit,
            internal_cost: self.internal_cost,
        };
        Ok(PolicyRecord {
            metadata,
            premiums: decode_schedule(&self.premiums_json)?,
        })
    }
}

/// Encode a schedule as `{"2025": [100.0, 100.0], "2026": [105.5]}`.
pub fn encode_schedule(schedule: &PremiumSchedule) -> Result<String, StoreError> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    schedule
        .serialize(&mut ser)
        .map_err(|e| StoreError::MalformedRow(format!("premium schedule: {e}")))?;
    String::from_utf8(buf).map_err(|e| StoreError::MalformedRow(e.to_string()))
}

/// Decode a schedule written by [`encode_schedule`] or edited by hand.
///
/// Year keys may be `"2025"` or `"2025.0"`; keys that are not years are
/// skipped. Amounts may be numbers or currency text; unreadable amounts
/// count as 0.
pub fn decode_schedule(text: &str) -> Result<PremiumSchedule, StoreError> {
    if text.trim().is_empty() {
        return Ok(PremiumSchedule::new());
    }
    let raw: BTreeMap<String, Value> = serde_json::from_str(text)
        .map_err(|e| StoreError::MalformedRow(format!("premiums_json: {e}")))?;

    let schedule = raw
        .into_iter()
        .filter_map(|(key, value)| {
            let year = coerce_year(&key)?;
            let premiums = match value {
                Value::Array(items) => items.iter().map(amount_or_zero).collect(),
                _ => Vec::new(),
            };
            Some((year, premiums))
        })
        .collect();
    Ok(schedule)
}

fn coerce_year(key: &str) -> Option<i32> {
    let key = key.trim();
    key.parse::<i32>()
        .ok()
        .or_else(|| key.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.round() as i32))
}

fn amount_or_zero(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => crate::onboarding::premiums::parse_amount(s).unwrap_or(0.0),
        _ => 0.0,
    }
}

fn decimal_value(d: Decimal) -> Value {
    if d.fract().is_zero() {
        if let Some(i) = d.to_i64() {
            return Value::from(i);
        }
    }
    d.to_f64().map(Value::from).unwrap_or(Value::Null)
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn parse_months(text: &str) -> Result<u32, StoreError> {
    let text = text.trim();
    text.parse::<u32>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().and_then(|v| v.to_u32()))
        .ok_or_else(|| StoreError::MalformedRow(format!("le_months: '{text}' is not a month count")))
}

fn parse_decimal(field: &str, text: &str) -> Result<Decimal, StoreError> {
    let cleaned: String = text.chars().filter(|c| !matches!(c, '$' | ',')).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(cleaned)
        .or_else(|_| Decimal::from_scientific(cleaned))
        .ok()
        .or_else(|| cleaned.parse::<f64>().ok().and_then(Decimal::from_f64))
        .ok_or_else(|| StoreError::MalformedRow(format!("{field}: '{text}' is not an amount")))
}

fn parse_date(field: &str, text: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
        .map_err(|e| StoreError::MalformedRow(format!("{field}: '{text}': {e}")))
}

/// JSON formatter with `": "` and `", "` separators.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_f64<W>(&mut self, writer: &mut W, value: f64) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(float_text(value).as_bytes())
    }
}

/// Shortest round-trip text for a finite float, with a forced `.0` on whole
/// numbers and a signed two-digit exponent outside `1e-4 ..< 1e16`
/// (`100.0`, `0.0001`, `1e-05`, `1.5e+16`).
fn float_text(value: f64) -> String {
    let sci = format!("{value:e}");
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    if !(-4..16).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exp.unsigned_abs());
    }
    let plain = value.to_string();
    if plain.contains('.') { plain } else { format!("{plain}.0") }
}
