//! Record normalization
//!
//! [`normalize`] is a pure function: no I/O and no shared state. It validates
//! one provider record and converts it into canonical form, or explains why
//! the record has to be skipped.

use serde_json::Value;

use crate::catalog::reference;

use super::types::{NormalizedRecord, RawRecord, SkipReason};

/// Earliest year accepted from any provider
pub const MIN_YEAR: i32 = 1800;

/// Latest year accepted from any provider
pub const MAX_YEAR: i32 = 2100;

/// Placeholders that mean "no value" for every provider (compared case-insensitively)
const DEFAULT_SENTINELS: &[&str] = &["", "..", "...", "-", "--", "na", "n/a", "null", "nan", "none"];

/// Missing-value placeholders specific to one provider
///
/// IRENA publishes `0` for cells it has no data for; IMF uses `no data`.
pub fn provider_sentinels(source_code: &str) -> &'static [&'static str] {
    match source_code.to_ascii_uppercase().as_str() {
        "IRENA" => &["0", "0.0"],
        "IMF" => &["no data", "n.a."],
        "UNHCR" => &["*"],
        _ => &[],
    }
}

fn is_sentinel(source_code: &str, text: &str) -> bool {
    DEFAULT_SENTINELS
        .iter()
        .chain(provider_sentinels(source_code))
        .any(|s| s.eq_ignore_ascii_case(text))
}

/// Validate and canonicalize one raw record
pub fn normalize(source_code: &str, raw: &RawRecord) -> Result<NormalizedRecord, SkipReason> {
    let country_iso3 = normalize_country(raw.country_code.as_deref())?;
    let indicator_code = raw
        .indicator_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .ok_or(SkipReason::MissingIndicatorCode)?
        .to_string();
    let year = parse_year(&raw.year)?;
    let value = parse_value(source_code, &raw.value)?;

    Ok(NormalizedRecord {
        country_iso3,
        indicator_code,
        year,
        value,
        is_estimated: raw.flags.estimated,
        source_note: raw
            .note
            .as_deref()
            .map(str::trim)
            .filter(|note| !note.is_empty())
            .map(str::to_string),
        metadata: raw.metadata.clone(),
    })
}

/// Upper-case the code and translate known ISO2 codes to ISO3
///
/// Unknown codes pass through unchanged; deciding whether a country exists is
/// the resolver's job.
fn normalize_country(code: Option<&str>) -> Result<String, SkipReason> {
    let code = code
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or(SkipReason::MissingCountryCode)?
        .to_ascii_uppercase();

    if code.len() == 2 {
        if let Some(iso3) = reference::iso2_to_iso3(&code) {
            return Ok(iso3.to_string());
        }
    }
    Ok(code)
}

fn parse_year(value: &Value) -> Result<i32, SkipReason> {
    let year = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.is_finite() => f as i64,
                    _ => return Err(SkipReason::BadYear(n.to_string())),
                }
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(SkipReason::BadYear(s.to_string()));
            }
            s.parse::<i64>()
                .map_err(|_| SkipReason::BadYear(s.to_string()))?
        }
        Value::Null => return Err(SkipReason::BadYear("missing".to_string())),
        other => return Err(SkipReason::BadYear(other.to_string())),
    };

    if !(i64::from(MIN_YEAR)..=i64::from(MAX_YEAR)).contains(&year) {
        return Err(SkipReason::BadYear(year.to_string()));
    }
    i32::try_from(year).map_err(|_| SkipReason::BadYear(year.to_string()))
}

fn parse_value(source_code: &str, value: &Value) -> Result<Option<f64>, SkipReason> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.is_finite() => Ok(Some(f)),
            _ => Err(SkipReason::UnparsableValue(n.to_string())),
        },
        Value::String(s) => {
            let text = s.trim();
            if is_sentinel(source_code, text) {
                return Ok(None);
            }
            match text.parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(Some(f)),
                _ => Err(SkipReason::UnparsableValue(text.to_string())),
            }
        }
        other => Err(SkipReason::UnparsableValue(other.to_string())),
    }
}
