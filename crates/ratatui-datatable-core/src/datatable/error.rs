use thiserror::Error;

/// Problems with a column configuration.
///
/// These never abort the host: the table keeps the error and the view renders it in place of the
/// body.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("duplicate column field `{0}`")]
    DuplicateField(String),
    #[error("invalid field path `{path}`: {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: PathError,
    },
    #[error("invalid pattern for `{field}`: {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },
}

/// Failures while reading or writing a [`FieldPath`](super::path::FieldPath).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("field path is empty")]
    Empty,
    #[error("field path `{0}` contains an empty segment")]
    EmptySegment(String),
    #[error("segment `{segment}` of `{path}` is not an object")]
    NotAContainer { path: String, segment: String },
}

/// Failures on the cell commit path. All of them are recovered from by the table.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CommitError {
    #[error("commit worker reported: {0}")]
    Worker(String),
    #[error("commit worker disconnected before replying")]
    Disconnected,
    #[error(transparent)]
    Path(#[from] PathError),
}
