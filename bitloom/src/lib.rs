/*!
A compiler for a small bit-oriented language.

Source programs describe functions whose arguments are sequences of
individual bits; bodies combine them with boolean, shift, rotate, slice,
index, concatenation and call operations. [`compile`] lowers a program to
a flat per-output-bit boolean circuit and emits a C function mapping a
packed, MSB-first input buffer to a packed output buffer.

```
let source = "function main:8 { main = ~main; return main; }";
let code = bitloom::compile(source, "invert").unwrap();
assert!(code.starts_with("char* invert(char* input)"));
```

Hosts that want to run a program directly can stop after analysis and use
the circuit's interpreter:

```
let source = "function main:8 { main = main & 0xF0; return main; }";
let circuit = bitloom::analyze_source(source).unwrap();
assert_eq!(circuit.evaluate(&[0xA5]), vec![0xA0]);
```
*/

#![forbid(unsafe_code)]
#![deny(missing_docs)]

use core::fmt;

pub use bitloom_interpret::{self, Circuit};
pub use bitloom_syntax;
pub use bitloom_write;

use bitloom_interpret::EvalError;
use bitloom_syntax::ast::Program;
use bitloom_syntax::{MaskError, SyntaxError, mask};
use log::debug;

/// Any error the compilation pipeline can raise.
///
/// There is no recovery: the first error terminates the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The mask preprocessor found a dangling field reference.
    Mask(MaskError),
    /// Tokenizing or parsing failed.
    Syntax(SyntaxError),
    /// Symbolic evaluation failed.
    Eval(EvalError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mask(err) => write!(f, "preprocess error: {err}"),
            Self::Syntax(err) => write!(f, "syntax error: {err}"),
            Self::Eval(err) => write!(f, "evaluation error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Mask(err) => Some(err),
            Self::Syntax(err) => Some(err),
            Self::Eval(err) => Some(err),
        }
    }
}

impl From<MaskError> for Error {
    fn from(err: MaskError) -> Self {
        Self::Mask(err)
    }
}

impl From<SyntaxError> for Error {
    fn from(err: SyntaxError) -> Self {
        Self::Syntax(err)
    }
}

impl From<EvalError> for Error {
    fn from(err: EvalError) -> Self {
        Self::Eval(err)
    }
}

/// Analyze a source program into its [`Circuit`] without emitting C.
pub fn analyze_source(source: &str) -> Result<Circuit, Error> {
    let expanded = mask::expand(source)?;
    let program = Program::parse(&expanded)?;
    let circuit = bitloom_interpret::analyze(&program)?;

    debug!(
        "analyzed: {} input bits, {} output bits",
        circuit.input_bits,
        circuit.outputs.len()
    );

    Ok(circuit)
}

/// Compile a source program into a C function named `name`.
pub fn compile(source: &str, name: &str) -> Result<String, Error> {
    let circuit = analyze_source(source)?;
    Ok(bitloom_write::emit(&circuit, name))
}
