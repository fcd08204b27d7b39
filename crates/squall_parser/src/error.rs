use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid header at line {line}: {message}")]
    InvalidHeader { line: usize, message: String },

    #[error("invalid entry at line {line}: {message}")]
    InvalidEntry { line: usize, message: String },

    #[error("expected {expected} entries but found {actual}")]
    EntryCountMismatch { expected: usize, actual: usize },

    #[error("line {line} mixes deterministic and nondeterministic entries")]
    MixedArity { line: usize },

    #[error("duplicate label: {name}")]
    DuplicateLabel { name: String },

    #[error("invalid property at offset {position}: {message}")]
    Property { position: usize, message: String },
}
