use thiserror::Error;

/// What went wrong while reading a regular expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("empty expression")]
    EmptyExpression,
    #[error("unbalanced parenthesis")]
    UnbalancedParenthesis,
    #[error("operator is missing an operand")]
    MissingOperand,
    #[error("escape character at end of expression")]
    DanglingEscape,
}

/// Errors produced by the construction pipeline and the table codec.
#[derive(Debug, Error)]
pub enum Error {
    /// The regular expression is malformed. `position` counts characters, not bytes.
    #[error("parse error at position {position}: {kind}")]
    Parse {
        position: usize,
        kind: ParseErrorKind,
    },

    /// The postfix stream did not reduce to exactly one fragment.
    #[error("postfix stream reduced to {fragments} fragments instead of one")]
    Construction { fragments: usize },

    #[error("automaton `{automaton}` has no initial state")]
    MissingInitialState { automaton: String },

    /// Some states cannot be reached from the initial state.
    #[error("automaton `{automaton}`: only {reachable} of {total} states are reachable")]
    UnreachableState {
        automaton: String,
        reachable: usize,
        total: usize,
    },

    #[error("state `{state}` refers to unknown or protected state `{target}`")]
    DanglingReference { state: String, target: String },

    #[error("automaton `{key}` not found: {reason}")]
    NotFound { key: String, reason: String },

    #[error("automaton `{automaton}` is invalid: {reason}")]
    InvalidAutomaton { automaton: String, reason: String },

    #[error("invalid value `{value}` for option `{option}`")]
    InvalidOption { option: &'static str, value: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn parse(position: usize, kind: ParseErrorKind) -> Error {
        Error::Parse { position, kind }
    }

    pub(crate) fn invalid(automaton: &str, reason: impl Into<String>) -> Error {
        Error::InvalidAutomaton {
            automaton: automaton.to_string(),
            reason: reason.into(),
        }
    }
}

#[test]
fn test_io_error_keeps_its_message() {
    let e = Error::from(std::io::Error::new(
        std::io::ErrorKind::PermissionDenied,
        "read-only directory",
    ));
    assert_eq!(e.to_string(), "I/O error: read-only directory");
}
