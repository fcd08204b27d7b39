//! Reader for the triples transition format.
//!
//! The first non-comment line is the header `n m e` (row count, column
//! count, entry count); each of the following `e` lines is one entry.
//! Deterministic models use `i j v` triples; nondeterministic models use
//! `i k j v` with `k` the 0-based local choice of state `i`. Lines starting
//! with `#` and blank lines are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Serialize;

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransitionEntry {
    pub source: usize,
    /// Local choice index, None for deterministic entries.
    pub choice: Option<usize>,
    pub target: usize,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionFile {
    pub state_count: usize,
    pub column_count: usize,
    pub entries: Vec<TransitionEntry>,
}

impl TransitionFile {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        Self::from_reader(BufReader::new(File::open(path.as_ref())?))
    }

    pub fn from_str(input: &str) -> Result<Self, ParseError> {
        Self::from_reader(input.as_bytes())
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ParseError> {
        let mut lines = content_lines(reader);

        let (line_number, header) = lines.next().transpose()?.ok_or(ParseError::InvalidHeader {
            line: 0,
            message: "empty input".to_string(),
        })?;
        let fields: Vec<&str> = header.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(ParseError::InvalidHeader {
                line: line_number,
                message: format!("expected 'n m e', got {header:?}"),
            });
        }
        let state_count = parse_field(fields[0], line_number, "row count")?;
        let column_count = parse_field(fields[1], line_number, "column count")?;
        let entry_count = parse_field(fields[2], line_number, "entry count")?;

        let mut entries = Vec::with_capacity(entry_count);
        let mut nondeterministic: Option<bool> = None;
        for item in lines {
            let (line_number, line) = item?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            let entry = match fields.len() {
                3 => TransitionEntry {
                    source: parse_field(fields[0], line_number, "source state")?,
                    choice: None,
                    target: parse_field(fields[1], line_number, "target state")?,
                    value: parse_value(fields[2], line_number)?,
                },
                4 => TransitionEntry {
                    source: parse_field(fields[0], line_number, "source state")?,
                    choice: Some(parse_field(fields[1], line_number, "choice")?),
                    target: parse_field(fields[2], line_number, "target state")?,
                    value: parse_value(fields[3], line_number)?,
                },
                _ => {
                    return Err(ParseError::InvalidEntry {
                        line: line_number,
                        message: format!("expected 3 or 4 fields, got {}", fields.len()),
                    });
                }
            };
            match (nondeterministic, entry.choice.is_some()) {
                (Some(true), false) | (Some(false), true) => {
                    return Err(ParseError::MixedArity { line: line_number });
                }
                _ => nondeterministic = Some(entry.choice.is_some()),
            }
            if entry.source >= state_count || entry.target >= column_count {
                return Err(ParseError::InvalidEntry {
                    line: line_number,
                    message: format!(
                        "state index out of range in '{line}' for {state_count} states"
                    ),
                });
            }
            entries.push(entry);
        }

        if entries.len() != entry_count {
            return Err(ParseError::EntryCountMismatch {
                expected: entry_count,
                actual: entries.len(),
            });
        }
        Ok(Self {
            state_count,
            column_count,
            entries,
        })
    }

    pub fn is_nondeterministic(&self) -> bool {
        self.entries.iter().any(|e| e.choice.is_some())
    }
}

/// Numbered, trimmed lines with comments and blanks removed.
fn content_lines<R: BufRead>(
    reader: R,
) -> impl Iterator<Item = Result<(usize, String), ParseError>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(index, line)| match line {
            Err(e) => Some(Err(ParseError::Io(e))),
            Ok(line) => {
                let trimmed = line.trim().trim_start_matches('\u{feff}').to_string();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    None
                } else {
                    Some(Ok((index + 1, trimmed)))
                }
            }
        })
}

fn parse_field(field: &str, line: usize, what: &str) -> Result<usize, ParseError> {
    field.parse().map_err(|_| ParseError::InvalidEntry {
        line,
        message: format!("invalid {what}: {field:?}"),
    })
}

fn parse_value(field: &str, line: usize) -> Result<f64, ParseError> {
    field.parse().map_err(|_| ParseError::InvalidEntry {
        line,
        message: format!("invalid value: {field:?}"),
    })
}
