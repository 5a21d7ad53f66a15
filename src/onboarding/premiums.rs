//! Tolerant parsing of pasted premium text.
//!
//! One premium per line; `\n`, `\r\n`, a bare `\r` and the other Unicode
//! line breaks all end a line. Dollar signs and thousands separators are
//! stripped; blank lines are skipped and anything that still fails to parse
//! as a number is dropped without failing the block.

/// Outcome of parsing one year's text block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedBlock {
    /// Parsed amounts, in input line order.
    pub values: Vec<f64>,
    /// 1-based line numbers that were non-empty but unparsable.
    pub dropped_lines: Vec<usize>,
}

/// Parse a block of pasted premiums into amounts.
pub fn parse_year_block(raw_text: &str) -> Vec<f64> {
    parse_year_block_report(raw_text).values
}

/// Like [`parse_year_block`] but also reports which lines were dropped.
pub fn parse_year_block_report(raw_text: &str) -> ParsedBlock {
    let mut block = ParsedBlock::default();
    for (idx, line) in split_lines(raw_text).enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match parse_amount(trimmed) {
            Some(value) => block.values.push(value),
            None => block.dropped_lines.push(idx + 1),
        }
    }
    block
}

/// Line breaks other than `\n`; `\r\n` counts as one break.
const OTHER_BREAKS: [char; 9] = [
    '\r', '\u{0b}', '\u{0c}', '\u{1c}', '\u{1d}', '\u{1e}', '\u{85}', '\u{2028}', '\u{2029}',
];

fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n')
        .flat_map(|line| line.strip_suffix('\r').unwrap_or(line).split(OTHER_BREAKS))
}

/// Parse a single currency-like amount such as `$1,250.00`.
///
/// Returns `None` for anything that is not a finite number once `$` and
/// `,` are removed.
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| !matches!(c, '$' | ',')).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}
