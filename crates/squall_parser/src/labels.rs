//! Reader for label files: one line per label, `name idx idx ...`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Serialize;

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelFile {
    /// Labels in file order with their state indices.
    pub labels: Vec<(String, Vec<usize>)>,
}

impl LabelFile {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ParseError> {
        Self::from_reader(BufReader::new(File::open(path.as_ref())?))
    }

    pub fn from_str(input: &str) -> Result<Self, ParseError> {
        Self::from_reader(input.as_bytes())
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ParseError> {
        let mut labels: Vec<(String, Vec<usize>)> = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line_number = index + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut fields = trimmed.split_whitespace();
            let name = fields.next().expect("non-empty line has a first field");
            if labels.iter().any(|(existing, _)| existing == name) {
                return Err(ParseError::DuplicateLabel {
                    name: name.to_string(),
                });
            }
            let mut states = Vec::new();
            for field in fields {
                states.push(field.parse().map_err(|_| ParseError::InvalidEntry {
                    line: line_number,
                    message: format!("invalid state index: {field:?}"),
                })?);
            }
            labels.push((name.to_string(), states));
        }
        Ok(Self { labels })
    }

    pub fn get(&self, name: &str) -> Option<&[usize]> {
        self.labels
            .iter()
            .find(|(label, _)| label == name)
            .map(|(_, states)| states.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_in_order() {
        let file = LabelFile::from_str("init 0\ndone 3 5 7\n").unwrap();
        assert_eq!(file.labels.len(), 2);
        assert_eq!(file.get("init"), Some(&[0usize][..]));
        assert_eq!(file.get("done"), Some(&[3usize, 5, 7][..]));
        assert_eq!(file.get("missing"), None);
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let result = LabelFile::from_str("a 0\na 1\n");
        assert!(matches!(result, Err(ParseError::DuplicateLabel { .. })));
    }

    #[test]
    fn bad_state_index_is_rejected() {
        let error = LabelFile::from_str("a x\n").unwrap_err();
        insta::assert_snapshot!(
            error.to_string(),
            @r#"invalid entry at line 1: invalid state index: "x""#
        );
    }

    #[test]
    fn labels_without_states_are_allowed() {
        let file = LabelFile::from_str("unreached\n").unwrap();
        assert_eq!(file.get("unreached"), Some(&[][..]));
    }
}
