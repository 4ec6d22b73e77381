/*!
The front end of the bitloom compiler.

This crate turns source text into the tagged AST the evaluator consumes:

1. [`mask::expand`] erases `mask` declarations and replaces every
   `Name.field` reference with its resolved numeric bit range.
2. [`lex::tokenize`] splits the expanded text into positioned tokens,
   decoding numeric literals into tagged [`Literal`](lex::Literal) values.
3. [`Program::parse`](ast::Program::parse) runs the recursive-descent
   parser over the token stream.

## Safety
This crate forbids unsafe code via a crate-level attribute.
*/

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod ast;
mod error;
pub mod lex;
pub mod mask;
mod parse;
mod reader;

pub use error::{MaskError, Result, SyntaxError};
