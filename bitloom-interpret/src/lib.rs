/*!
The symbolic evaluator of the bitloom compiler.

Starting at `main`, [`analyze`] walks the parsed program while maintaining
a pool of symbolic bits and an environment mapping each variable to an
ordered list of pool indices. Boolean operations fold to constants where
operand constant-ness allows and allocate recording bits otherwise;
shifts, rotates, slices and concatenation only rearrange index lists;
calls are inlined. The result is a [`Circuit`]: one boolean expression
tree per output bit, rooted only in constants and input bits, which the
back end serializes and [`Circuit::evaluate`] can run directly.

## Safety
This crate forbids unsafe code via a crate-level attribute.
*/

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod analyzer;
mod circuit;
mod error;
mod pool;

pub use analyzer::analyze;
pub use circuit::Circuit;
pub use error::{EvalError, Result};
pub use pool::{Bit, BitId, BitSeq, BoolOp, FALSE_BIT, Pool, TRUE_BIT};
