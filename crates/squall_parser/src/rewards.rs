//! Reader for state reward files: one `state value` pair per line.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Serialize;

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateRewardFile {
    pub entries: Vec<(usize, f64)>,
}

impl StateRewardFile {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        Self::from_reader(BufReader::new(File::open(path.as_ref())?))
    }

    pub fn from_str(input: &str) -> Result<Self, ParseError> {
        Self::from_reader(input.as_bytes())
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ParseError> {
        let mut entries = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line_number = index + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            if fields.len() != 2 {
                return Err(ParseError::InvalidEntry {
                    line: line_number,
                    message: format!("expected 'state value', got {trimmed:?}"),
                });
            }
            let state = fields[0].parse().map_err(|_| ParseError::InvalidEntry {
                line: line_number,
                message: format!("invalid state index: {:?}", fields[0]),
            })?;
            let value = fields[1].parse().map_err(|_| ParseError::InvalidEntry {
                line: line_number,
                message: format!("invalid reward value: {:?}", fields[1]),
            })?;
            entries.push((state, value));
        }
        Ok(Self { entries })
    }

    /// Expand into a dense vector of the given length; unlisted states get
    /// zero reward.
    pub fn to_dense(&self, state_count: usize) -> Result<Vec<f64>, ParseError> {
        let mut dense = vec![0.0; state_count];
        for &(state, value) in &self.entries {
            if state >= state_count {
                return Err(ParseError::InvalidEntry {
                    line: 0,
                    message: format!("reward for state {state} out of {state_count} states"),
                });
            }
            dense[state] = value;
        }
        Ok(dense)
    }
}
