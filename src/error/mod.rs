use core::fmt;
use std::path::PathBuf;

/// Errors raised while resolving parameters or running the decomposition.
#[derive(Debug)]
pub enum Error {
    /// Infeasible spectral parameters, detected before any I/O.
    Parameter {
        /// Name of the offending argument.
        arg: &'static str,
        /// Explaining why the argument is infeasible.
        reason: String,
    },
    /// A snapshot disagreed with the declared spatial shape.
    Shape {
        /// Name of the offending input.
        arg: &'static str,
        /// The shape every snapshot must have.
        expected: Vec<usize>,
        /// The shape that was actually returned.
        got: Vec<usize>,
    },
    /// Block-store or mode-store read/write failure.
    Io {
        /// File the operation touched.
        path: PathBuf,
        /// Underlying failure, stringified.
        message: String,
    },
    /// A mode was requested at an unsaved frequency or out-of-range index.
    Lookup {
        /// What was being indexed.
        what: &'static str,
        /// The requested index.
        index: usize,
        /// Number of valid entries.
        len: usize,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, err: impl fmt::Display) -> Self {
        Error::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parameter { arg, reason } => {
                write!(f, "Invalid parameter `{arg}`: {reason}")
            }
            Error::Shape { arg, expected, got } => {
                write!(f, "Shape mismatch on `{arg}`. Expected {expected:?}, got {got:?}.")
            }
            Error::Io { path, message } => {
                write!(f, "I/O failure on {}: {message}", path.display())
            }
            Error::Lookup { what, index, len } => {
                write!(f, "No {what} at index {index} (have {len}).")
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn display_names_the_argument() {
        let err = Error::Parameter {
            arg: "n_ovlp",
            reason: "overlap must be smaller than the segment length".into(),
        };
        let text = err.to_string();
        assert!(text.contains("n_ovlp"));
        assert!(text.contains("overlap"));
    }

    #[test]
    fn shape_error_reports_both_shapes() {
        let err = Error::Shape {
            arg: "snapshot",
            expected: vec![8, 4],
            got: vec![8, 3],
        };
        let text = err.to_string();
        assert!(text.contains("[8, 4]"));
        assert!(text.contains("[8, 3]"));
    }
}
