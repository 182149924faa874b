//! Predicate parser error types.

/// An error raised while parsing a predicate string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// A parenthesized group was not closed.
    #[error("missing closing parenthesis")]
    MissingCloseParen,

    /// A BETWEEN predicate is missing its AND separator.
    #[error("missing AND in BETWEEN predicate")]
    MissingBetweenAnd,

    /// An IN list was not opened with a parenthesis.
    #[error("missing opening parenthesis in IN predicate")]
    MissingInOpen,

    /// An IN list was not closed with a parenthesis.
    #[error("missing closing parenthesis in IN predicate")]
    MissingInClose,

    /// The input ended where a value was required.
    #[error("unexpected end of predicate: expected {expected}")]
    UnexpectedEnd {
        /// What the parser was looking for.
        expected: &'static str,
    },
}
