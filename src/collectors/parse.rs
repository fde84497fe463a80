//! Parsers for the output of external scrapers
//!
//! Scrapers either print a JSON object mapping entity ids to values, or, for
//! the free-dates page, one line per centre with the centre name and the text
//! of its column separated by a tab.

use crate::error::CollectorError;
use crate::state::{EntityId, Entries, Value, ValueKind};
use serde::{Deserialize, Serialize};

/// Format of scraper output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// JSON object mapping entity ids to counts or `{"label": ...}` records
    #[default]
    Json,
    /// `<centre name>\t<column text>` per line
    FreeDatesText,
}

/// Parse scraper output and check every value has the expected kind
pub fn parse_output(
    format: OutputFormat,
    output: &str,
    expected: ValueKind,
) -> Result<Entries, CollectorError> {
    let entries = match format {
        OutputFormat::Json => serde_json::from_str::<Entries>(output.trim()).map_err(|e| {
            CollectorError::ParseError(format!("Invalid JSON mapping: {}", e))
        })?,
        OutputFormat::FreeDatesText => parse_free_dates_lines(output)?,
    };

    check_kind(&entries, expected)?;
    Ok(entries)
}

/// Reject entries whose values do not belong to the monitored domain
pub fn check_kind(entries: &Entries, expected: ValueKind) -> Result<(), CollectorError> {
    match entries.iter().find(|(_, value)| value.kind() != expected) {
        Some((id, value)) => Err(CollectorError::ParseError(format!(
            "'{}' has a {:?} value, expected {:?}",
            id,
            value.kind(),
            expected
        ))),
        None => Ok(()),
    }
}

fn parse_free_dates_lines(output: &str) -> Result<Entries, CollectorError> {
    let mut entries = Entries::new();

    for line in output.lines().filter(|line| !line.trim().is_empty()) {
        let (name, text) = line.split_once('\t').ok_or_else(|| {
            CollectorError::ParseError(format!("Expected '<name>\\t<text>' but got '{}'", line))
        })?;

        let name = name.trim();
        if name.is_empty() {
            return Err(CollectorError::ParseError(format!(
                "Expected a centre name in '{}'",
                line
            )));
        }

        let count = parse_free_dates(name, text)?;
        entries.insert(EntityId::from(name), Value::Count(count));
    }

    Ok(entries)
}

/// Extract the number of free appointments from a centre's column text
///
/// The column text repeats the centre name as its heading, followed by
/// `<N> freie Termine`.
pub fn parse_free_dates(name: &str, text: &str) -> Result<u64, CollectorError> {
    let unable = || CollectorError::ParseError(format!("Unable to parse free dates in '{}'", text));

    let remainder = text.replacen(name, "", 1);
    let remainder = remainder.trim_start();

    let digits_end = remainder
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(remainder.len());
    let (digits, rest) = remainder.split_at(digits_end);

    if digits.is_empty() || !rest.trim_start().starts_with("freie Termine") {
        return Err(unable());
    }

    digits.parse::<u64>().map_err(|e| {
        CollectorError::ParseError(format!(
            "Unable to parse '{}' into a number. Matched '{}': {}",
            text, digits, e
        ))
    })
}
