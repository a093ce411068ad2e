//! Errors generated by the compiler.
use crate::Id;
use std::path::PathBuf;
use thiserror::Error as ThisError;

/// Convenience wrapper to represent success or meaningful compiler error.
pub type DflowResult<T> = std::result::Result<T, Error>;

/// Compiler error. The payload lives behind a box so that results stay small
/// on the hot lowering path.
pub struct Error(Box<ErrorKind>);

/// The different ways in which lowering a process can fail.
#[derive(ThisError, Debug)]
pub enum ErrorKind {
    /// A dataflow element references a channel the process cannot resolve
    /// consistently.
    #[error("Inconsistent dataflow graph: {0}")]
    InconsistentGraph(String),

    /// A copy cursor for `channel` was advanced past the number of copies
    /// planned for it.
    #[error(
        "Copy cursor for `{channel}' exceeded {outputs} planned outputs. The use counter and the lowering pass disagree"
    )]
    PassDivergence { channel: Id, outputs: u32 },

    /// A structural element violates its shape requirements.
    #[error("Malformed element `{element}': {msg}")]
    MalformedElement { element: String, msg: String },

    /// No metrics exist for a structural instance.
    #[error("Missing metrics for `{0}': cost database incomplete")]
    MissingMetrics(String),

    /// The external estimator could not produce metrics for an instance.
    #[error("Failed to synthesize metrics for `{key}': {msg}")]
    Synthesis { key: String, msg: String },

    /// A metrics file line does not have the expected shape.
    #[error("{}:{line}: {msg}", path.display())]
    MetricsFile {
        path: PathBuf,
        line: usize,
        msg: String,
    },

    /// The name has already been bound.
    #[error("Name `{name}' already bound by {kind}")]
    AlreadyBound { name: Id, kind: String },

    /// The name has not been bound.
    #[error("Undefined {kind} `{name}'")]
    Undefined { name: Id, kind: String },

    /// The input source could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The input file is invalid (does not exist).
    #[error("Invalid file: {0}")]
    InvalidFile(String),

    /// Failed to write the output.
    #[error("Write error: {0}")]
    WriteError(String),

    /// A miscellaneous error. Should be replaced with a more precise error.
    #[error("{0}")]
    Misc(String),
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    pub fn inconsistent_graph<S: ToString>(msg: S) -> Self {
        ErrorKind::InconsistentGraph(msg.to_string()).into()
    }

    pub fn pass_divergence<I: Into<Id>>(channel: I, outputs: u32) -> Self {
        ErrorKind::PassDivergence {
            channel: channel.into(),
            outputs,
        }
        .into()
    }

    pub fn malformed_element<E: ToString, S: ToString>(
        element: E,
        msg: S,
    ) -> Self {
        ErrorKind::MalformedElement {
            element: element.to_string(),
            msg: msg.to_string(),
        }
        .into()
    }

    pub fn missing_metrics<S: ToString>(key: S) -> Self {
        ErrorKind::MissingMetrics(key.to_string()).into()
    }

    pub fn synthesis<K: ToString, S: ToString>(key: K, msg: S) -> Self {
        ErrorKind::Synthesis {
            key: key.to_string(),
            msg: msg.to_string(),
        }
        .into()
    }

    pub fn metrics_file<S: ToString>(
        path: impl Into<PathBuf>,
        line: usize,
        msg: S,
    ) -> Self {
        ErrorKind::MetricsFile {
            path: path.into(),
            line,
            msg: msg.to_string(),
        }
        .into()
    }

    pub fn already_bound<I: Into<Id>>(name: I, kind: String) -> Self {
        ErrorKind::AlreadyBound {
            name: name.into(),
            kind,
        }
        .into()
    }

    pub fn undefined<I: Into<Id>>(name: I, kind: String) -> Self {
        ErrorKind::Undefined {
            name: name.into(),
            kind,
        }
        .into()
    }

    pub fn parse_error<S: ToString>(msg: S) -> Self {
        ErrorKind::Parse(msg.to_string()).into()
    }

    pub fn invalid_file<S: ToString>(msg: S) -> Self {
        ErrorKind::InvalidFile(msg.to_string()).into()
    }

    pub fn write_error<S: ToString>(msg: S) -> Self {
        ErrorKind::WriteError(msg.to_string()).into()
    }

    pub fn misc<S: ToString>(msg: S) -> Self {
        ErrorKind::Misc(msg.to_string()).into()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(Box::new(kind))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&*self.0, f)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self, f)
    }
}

impl std::error::Error for Error {}

// Conversions from other error types to our error type so that
// we can use `?` in all the places.
impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Error::invalid_file(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::write_error(format!("IO Error: {e}"))
    }
}

impl From<std::fmt::Error> for Error {
    fn from(e: std::fmt::Error) -> Self {
        Error::write_error(format!("Formatting Error: {e}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::misc(format!("JSON Error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_element_names_the_element() {
        let err = Error::malformed_element("merge_a", "needs at least 2 inputs");
        assert!(matches!(err.kind(), ErrorKind::MalformedElement { .. }));
        assert_eq!(
            err.to_string(),
            "Malformed element `merge_a': needs at least 2 inputs"
        );
    }

    #[test]
    fn metrics_file_reports_location() {
        let err = Error::metrics_file("lib.metrics", 3, "expected 4 numbers");
        assert_eq!(err.to_string(), "lib.metrics:3: expected 4 numbers");
    }

    #[test]
    fn io_errors_convert() {
        fn fail() -> DflowResult<()> {
            Err(std::io::Error::other("disk full"))?;
            Ok(())
        }
        let err = fail().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::WriteError(_)));
    }
}
