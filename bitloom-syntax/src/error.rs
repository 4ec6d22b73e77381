//! Error types for the bitloom front end.

use core::fmt;

/// A specialized [`Result`] type for lexing and parsing.
pub type Result<T> = core::result::Result<T, SyntaxError>;

/// An error encountered while tokenizing or parsing a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    /// A character the lexer does not recognize.
    UnexpectedChar {
        /// The offending character.
        ch: char,
        /// 1-based line of the character.
        line: u32,
        /// 1-based column of the character.
        col: u32,
    },
    /// The parser expected one construct and found another token.
    Expected {
        /// A description of what was expected.
        what: &'static str,
        /// A description of the token that was found instead.
        found: String,
        /// 1-based line of the token.
        line: u32,
        /// 1-based column of the token.
        col: u32,
    },
    /// A function call in primitive position, where only variables,
    /// literals and index/slice forms are allowed.
    CallInPrimitive {
        /// 1-based line of the call.
        line: u32,
        /// 1-based column of the call.
        col: u32,
    },
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedChar { ch, line, col } => {
                write!(f, "unexpected character `{ch}` at {line}:{col}")
            }
            Self::Expected {
                what,
                found,
                line,
                col,
            } => {
                write!(f, "expected {what}, found {found} at {line}:{col}")
            }
            Self::CallInPrimitive { line, col } => {
                write!(
                    f,
                    "a primitive expression cannot be a function call at {line}:{col}"
                )
            }
        }
    }
}

impl std::error::Error for SyntaxError {}

/// An error from the mask preprocessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaskError {
    /// A `Name.field` reference without a matching mask entry.
    UnknownField(String),
}

impl fmt::Display for MaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownField(name) => write!(f, "unknown mask field `{name}`"),
        }
    }
}

impl std::error::Error for MaskError {}
