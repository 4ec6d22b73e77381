//! Error types for the symbolic evaluator.

use core::fmt;

use bitloom_syntax::ast::BinOp;

/// A specialized [`Result`] type for evaluation.
pub type Result<T> = core::result::Result<T, EvalError>;

/// A fatal error raised while evaluating a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Reference to a variable that was never bound.
    UnknownVariable(String),
    /// Call of a function that was never declared.
    UnknownFunction(String),
    /// A parsed operator outside the implemented set.
    InvalidOperator(BinOp),
    /// An index outside the container, after wrapping from the end.
    IndexOutOfRange {
        /// The index as written.
        index: i64,
        /// The container's width.
        len: usize,
    },
    /// Slice bounds that are reversed or outside the container.
    InvalidSlice {
        /// The start bound as written (0 when omitted).
        start: i64,
        /// The end bound as written (the width when omitted).
        end: i64,
        /// The container's width.
        len: usize,
    },
    /// The container of an index or slice is not a variable reference.
    NonVariableContainer,
    /// The callee of a call is not a plain function name.
    NonVariableCallee,
    /// An assignment target that is not a variable, index or slice form.
    InvalidAssignTarget,
    /// A shift or rotate amount that is not a numeric literal.
    ShiftAmount,
    /// No function named `main` was declared.
    MissingMain,
    /// `main` does not declare its argument bit-width.
    MissingWidth,
    /// `main`'s argument bit-width is not positive.
    InvalidWidth(u32),
    /// Function calls nested deeper than the implementation limit.
    CallDepth,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownVariable(name) => write!(f, "unknown variable `{name}`"),
            Self::UnknownFunction(name) => write!(f, "unknown function `{name}`"),
            Self::InvalidOperator(op) => write!(f, "invalid binary operator `{op}`"),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} is out of range for width {len}")
            }
            Self::InvalidSlice { start, end, len } => {
                write!(f, "invalid slice {start}:{end} for width {len}")
            }
            Self::NonVariableContainer => {
                f.write_str("only variables can be indexed or sliced")
            }
            Self::NonVariableCallee => f.write_str("call target is not a function name"),
            Self::InvalidAssignTarget => f.write_str("unsupported assignment target"),
            Self::ShiftAmount => f.write_str("shift amount must be a numeric literal"),
            Self::MissingMain => f.write_str("no `main` function defined"),
            Self::MissingWidth => f.write_str("`main` must declare its argument bit-width"),
            Self::InvalidWidth(width) => {
                write!(f, "argument bit-width must be positive, got {width}")
            }
            Self::CallDepth => f.write_str("function calls nested too deeply"),
        }
    }
}

impl std::error::Error for EvalError {}
