//! Scenario outline and permutation expansion
//!
//! An outline carries an examples table whose first row names the parameters:
//!
//! ```text
//! Given the <start> screen is displayed
//! When I tap <button>
//! Examples:
//! | start | button |
//! | Home  | Log in |
//! | Feed  | Search |
//! ```
//!
//! In outline mode every data row yields one scenario, in row order. In
//! permutation mode each column lists candidate values for its parameter and
//! every combination yields one scenario; blank cells are skipped, so columns
//! may have different lengths. Combinations are produced with the first
//! column varying slowest.

use crate::error::SpecError;
use crate::parser::ScenarioKind;

/// Headings that introduce the examples table
const EXAMPLES_HEADINGS: [&str; 2] = ["examples:", "scenarios:"];

/// An examples table split from its template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamplesTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn is_table_row(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

fn split_row(line: &str) -> Vec<String> {
    let line = line.trim();
    let inner = line.strip_prefix('|').unwrap_or(line);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|cell| cell.trim().to_string()).collect()
}

/// Split scenario text into its template lines and its examples table.
pub fn split_examples(text: &str) -> Result<(String, ExamplesTable), SpecError> {
    let mut template = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    for line in text.lines() {
        if is_table_row(line) {
            rows.push(split_row(line));
        } else if EXAMPLES_HEADINGS
            .iter()
            .any(|h| line.trim().eq_ignore_ascii_case(h))
        {
            continue;
        } else {
            template.push(line);
        }
    }

    if rows.is_empty() {
        return Err(SpecError::malformed_examples("no examples table"));
    }
    let header = rows.remove(0);
    if let Some(i) = header.iter().position(String::is_empty) {
        return Err(SpecError::malformed_examples(format!(
            "examples header column {} has no name",
            i + 1
        )));
    }
    for (i, row) in rows.iter().enumerate() {
        if row.len() != header.len() {
            return Err(SpecError::malformed_examples(format!(
                "examples row {} has {} columns, header has {}",
                i + 1,
                row.len(),
                header.len()
            )));
        }
    }

    while template.last().map_or(false, |l| l.trim().is_empty()) {
        template.pop();
    }
    Ok((template.join("\n"), ExamplesTable { header, rows }))
}

/// Replace every `<name>` in the template in one pass, so values are never
/// substituted again.
fn fill(template: &str, names: &[String], values: &[&str]) -> String {
    let mut text = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('>').and_then(|close| {
            let name = &after[..close];
            let index = names.iter().position(|n| n == name)?;
            values.get(index).map(|value| (*value, close))
        });
        match value {
            Some((value, close)) => {
                text.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                text.push('<');
                rest = after;
            }
        }
    }
    text.push_str(rest);
    text
}

/// One scenario per data row.
pub fn expand_outline(text: &str) -> Result<Vec<String>, SpecError> {
    let (template, table) = split_examples(text)?;
    Ok(table
        .rows
        .iter()
        .map(|row| {
            let values: Vec<&str> = row.iter().map(String::as_str).collect();
            fill(&template, &table.header, &values)
        })
        .collect())
}

/// One scenario per combination of column values.
pub fn expand_permutations(text: &str) -> Result<Vec<String>, SpecError> {
    let (template, table) = split_examples(text)?;
    let columns: Vec<Vec<&str>> = (0..table.header.len())
        .map(|c| {
            table
                .rows
                .iter()
                .map(|row| row[c].as_str())
                .filter(|cell| !cell.is_empty())
                .collect()
        })
        .collect();
    if columns.iter().any(Vec::is_empty) {
        return Ok(Vec::new());
    }

    let total: usize = columns.iter().map(Vec::len).product();
    let mut scenarios = Vec::with_capacity(total);
    let mut odometer = vec![0usize; columns.len()];
    loop {
        let values: Vec<&str> = odometer.iter().zip(&columns).map(|(&i, col)| col[i]).collect();
        scenarios.push(fill(&template, &table.header, &values));

        // Advance the last column first.
        let mut position = columns.len();
        loop {
            if position == 0 {
                return Ok(scenarios);
            }
            position -= 1;
            odometer[position] += 1;
            if odometer[position] < columns[position].len() {
                break;
            }
            odometer[position] = 0;
        }
    }
}

/// Expand scenario text according to its kind.
pub fn expand(text: &str, kind: ScenarioKind) -> Result<Vec<String>, SpecError> {
    match kind {
        ScenarioKind::Plain => Ok(vec![text.to_string()]),
        ScenarioKind::Outline => expand_outline(text),
        ScenarioKind::Permutations => expand_permutations(text),
    }
}
