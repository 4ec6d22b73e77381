//! The symbolic evaluator.
//!
//! Evaluation walks the body of `main` statement by statement. A variable
//! is an ordered list of pool indices; every boolean operation either
//! folds to a constant or allocates a new symbolic bit recording its
//! operator and operands, while shifts, rotates, slices and concatenation
//! only rearrange index lists. Calls are inlined by evaluating the
//! callee's body with the argument's indices bound to its parameter.

use bitloom_syntax::ast::{BinOp, Expr, FuncDecl, Program, Stmt};
use log::{debug, trace};
use rustc_hash::FxHashMap;
use smallvec::smallvec;

use crate::circuit::Circuit;
use crate::error::{EvalError, Result};
use crate::pool::{Bit, BitId, BitSeq, BoolOp, FALSE_BIT, Pool, TRUE_BIT};

/// Function calls nested deeper than this abort the analysis.
const MAX_CALL_DEPTH: usize = 64;

/// Analyze a program: locate `main`, evaluate it symbolically and return
/// the resulting [`Circuit`].
pub fn analyze(program: &Program) -> Result<Circuit> {
    let mut functions: FxHashMap<&str, &FuncDecl> = FxHashMap::default();
    for func in &program.functions {
        functions.insert(func.name.as_str(), func);
    }

    let main = *functions.get("main").ok_or(EvalError::MissingMain)?;
    let width = main.arg_bits.ok_or(EvalError::MissingWidth)?;
    if width == 0 {
        return Err(EvalError::InvalidWidth(width));
    }
    let input_bits = width as usize;

    debug!("analyzing `main` over {input_bits} input bits");

    let mut analyzer = Analyzer {
        pool: Pool::new(input_bits),
        vars: FxHashMap::default(),
        functions,
        depth: 0,
    };

    let inputs = (2..input_bits + 2).collect();
    let outputs = analyzer.eval_function(main, inputs)?;

    debug!(
        "analysis complete: {} pool bits, {} output bits",
        analyzer.pool.len(),
        outputs.len()
    );

    Ok(Circuit {
        pool: analyzer.pool,
        outputs,
        input_bits,
    })
}

/// Per-compilation evaluation state: the bit pool, the (flat) variable
/// environment and the function table.
struct Analyzer<'a> {
    pool: Pool,
    vars: FxHashMap<String, BitSeq>,
    functions: FxHashMap<&'a str, &'a FuncDecl>,
    depth: usize,
}

impl<'a> Analyzer<'a> {
    /// Run a function body over `inputs`, bound to the function's own name.
    ///
    /// Statements execute in order; the first `return` yields its operand's
    /// indices. A body without `return` yields the empty sequence.
    fn eval_function(&mut self, func: &'a FuncDecl, inputs: BitSeq) -> Result<BitSeq> {
        trace!("entering `{}` with {} bits", func.name, inputs.len());
        self.vars.insert(func.name.clone(), inputs);

        for stmt in &func.body {
            match stmt {
                Stmt::Assign { target, value } => {
                    let values = self.eval_primitive(value)?;
                    self.assign(target, values)?;
                }
                Stmt::Return(value) => return self.eval_primitive(value),
            }
        }

        Ok(BitSeq::new())
    }

    /// Evaluate an expression into an ordered list of pool indices.
    fn eval_primitive(&mut self, expr: &Expr) -> Result<BitSeq> {
        let indices = match expr {
            Expr::Var(name) => self.lookup(name)?.clone(),
            Expr::Literal(literal) => literal
                .bits()
                .into_iter()
                .map(Pool::constant)
                .collect(),
            Expr::Index { container, index } => {
                let seq = self.lookup(variable_name(container)?)?;
                let idx = resolve_index(*index, seq.len())?;
                smallvec![seq[idx]]
            }
            Expr::Slice {
                container,
                start,
                end,
            } => {
                let seq = self.lookup(variable_name(container)?)?;
                let range = resolve_slice(*start, *end, seq.len())?;
                seq[range].iter().copied().collect()
            }
            Expr::Concat(operands) => {
                let mut indices = BitSeq::new();
                for operand in operands {
                    indices.extend(self.eval_primitive(operand)?);
                }
                indices
            }
            Expr::Not(sub) => {
                let sub = self.eval_primitive(sub)?;
                sub.iter().map(|&id| self.negate(id)).collect()
            }
            Expr::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs)?,
            // A call returns the callee's already-normalized result.
            Expr::Call { callee, arg } => return self.eval_call(callee, arg),
        };

        Ok(self.normalize(indices))
    }

    /// `~` over a sequence: constants flip without allocating.
    fn negate(&mut self, id: BitId) -> BitId {
        match id {
            FALSE_BIT => TRUE_BIT,
            TRUE_BIT => FALSE_BIT,
            _ => self.pool.push(Bit::Not(id)),
        }
    }

    fn eval_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> Result<BitSeq> {
        let left = self.eval_primitive(lhs)?;

        let bool_op = match op {
            BinOp::And => Some(BoolOp::And),
            BinOp::Or => Some(BoolOp::Or),
            BinOp::Xor => Some(BoolOp::Xor),
            _ => None,
        };

        if let Some(bool_op) = bool_op {
            let right = self.eval_primitive(rhs)?;
            let n = left.len().max(right.len());
            let mut out = BitSeq::with_capacity(n);
            for i in 0..n {
                let li = left.get(i).copied().unwrap_or(FALSE_BIT);
                let ri = right.get(i).copied().unwrap_or(FALSE_BIT);
                out.push(self.combine(bool_op, li, ri));
            }
            return Ok(out);
        }

        match op {
            BinOp::Shl | BinOp::Shr | BinOp::Rotl | BinOp::Rotr => {
                let amount = shift_amount(rhs)?;
                Ok(shift(op, left, amount))
            }
            _ => Err(EvalError::InvalidOperator(op)),
        }
    }

    /// One position of a boolean operation, with constant folding.
    ///
    /// Folding is decided purely from operand constant-ness; structurally
    /// equal symbolic operands are never detected, so `x ^ x` allocates.
    fn combine(&mut self, op: BoolOp, lhs: BitId, rhs: BitId) -> BitId {
        match op {
            BoolOp::And => match (lhs, rhs) {
                (FALSE_BIT, _) | (_, FALSE_BIT) => FALSE_BIT,
                (TRUE_BIT, TRUE_BIT) => TRUE_BIT,
                (TRUE_BIT, other) | (other, TRUE_BIT) => other,
                _ => self.pool.push(Bit::Binary { op, lhs, rhs }),
            },
            BoolOp::Or => match (lhs, rhs) {
                (TRUE_BIT, _) | (_, TRUE_BIT) => TRUE_BIT,
                (FALSE_BIT, FALSE_BIT) => FALSE_BIT,
                (FALSE_BIT, other) | (other, FALSE_BIT) => other,
                _ => self.pool.push(Bit::Binary { op, lhs, rhs }),
            },
            BoolOp::Xor => match (lhs, rhs) {
                (FALSE_BIT | TRUE_BIT, FALSE_BIT | TRUE_BIT) => Pool::constant(lhs != rhs),
                _ => self.pool.push(Bit::Binary { op, lhs, rhs }),
            },
        }
    }

    fn eval_call(&mut self, callee: &Expr, arg: &Expr) -> Result<BitSeq> {
        let name = match callee {
            Expr::Var(name) => name.as_str(),
            _ => return Err(EvalError::NonVariableCallee),
        };
        let func = *self
            .functions
            .get(name)
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
        let arg = self.eval_primitive(arg)?;

        if self.depth >= MAX_CALL_DEPTH {
            return Err(EvalError::CallDepth);
        }
        self.depth += 1;
        let result = self.eval_function(func, arg);
        self.depth -= 1;
        result
    }

    /// Store `values` into an assignment target.
    fn assign(&mut self, target: &Expr, values: BitSeq) -> Result<()> {
        match target {
            Expr::Var(name) => {
                self.vars.insert(name.clone(), values);
                Ok(())
            }
            Expr::Index { container, index } => {
                let name = variable_name(container)?;
                let len = self.lookup(name)?.len();
                let idx = resolve_index(*index, len)?;

                let id = match values.first() {
                    Some(&id) => id,
                    None => self.pool.push(Bit::Placeholder),
                };
                if let Some(seq) = self.vars.get_mut(name) {
                    seq[idx] = id;
                }
                Ok(())
            }
            Expr::Slice {
                container,
                start,
                end,
            } => {
                let name = variable_name(container)?;
                let len = self.lookup(name)?.len();
                let range = resolve_slice(*start, *end, len)?;

                // Positions past the end of the RHS receive fresh
                // placeholder bits; the variable's width never changes.
                let ids: BitSeq = range
                    .clone()
                    .enumerate()
                    .map(|(k, _)| match values.get(k) {
                        Some(&id) => id,
                        None => self.pool.push(Bit::Placeholder),
                    })
                    .collect();
                if let Some(seq) = self.vars.get_mut(name) {
                    for (k, pos) in range.enumerate() {
                        seq[pos] = ids[k];
                    }
                }
                Ok(())
            }
            _ => Err(EvalError::InvalidAssignTarget),
        }
    }

    fn lookup(&self, name: &str) -> Result<&BitSeq> {
        self.vars
            .get(name)
            .ok_or_else(|| EvalError::UnknownVariable(name.to_string()))
    }

    /// Replace constant and placeholder records with their canonical
    /// constant index. Input and derived bits pass through.
    fn normalize(&self, mut indices: BitSeq) -> BitSeq {
        for id in indices.iter_mut() {
            match self.pool.get(*id) {
                Bit::Const(value) => *id = Pool::constant(value),
                Bit::Placeholder => *id = FALSE_BIT,
                _ => {}
            }
        }
        indices
    }
}

fn variable_name(expr: &Expr) -> Result<&str> {
    match expr {
        Expr::Var(name) => Ok(name),
        _ => Err(EvalError::NonVariableContainer),
    }
}

/// Wrap a possibly-negative index and check it against the width.
fn resolve_index(index: i64, len: usize) -> Result<usize> {
    let idx = if index < 0 { index + len as i64 } else { index };
    if idx < 0 || idx >= len as i64 {
        return Err(EvalError::IndexOutOfRange { index, len });
    }
    Ok(idx as usize)
}

/// Resolve slice bounds to a half-open range over the width.
///
/// Omitted bounds default to the container's ends, negative bounds wrap
/// from the end, and the result must satisfy `0 <= start <= end <= len`.
fn resolve_slice(
    start: Option<i64>,
    end: Option<i64>,
    len: usize,
) -> Result<core::ops::Range<usize>> {
    let start_raw = start.unwrap_or(0);
    let end_raw = end.unwrap_or(len as i64);
    let wrap = |bound: i64| {
        if bound < 0 { bound + len as i64 } else { bound }
    };
    let s = wrap(start_raw);
    let e = wrap(end_raw);

    if s < 0 || e < s || e > len as i64 {
        return Err(EvalError::InvalidSlice {
            start: start_raw,
            end: end_raw,
            len,
        });
    }
    Ok(s as usize..e as usize)
}

/// The shift amount: the numeric payload of a literal right-hand side.
fn shift_amount(rhs: &Expr) -> Result<i64> {
    match rhs {
        Expr::Literal(literal) => literal.as_int().ok_or(EvalError::ShiftAmount),
        _ => Err(EvalError::ShiftAmount),
    }
}

/// Shifts and rotates rearrange the index list without allocating.
///
/// Logical shift amounts outside `(0, len)` zero the whole sequence; a
/// rotate reduces its amount modulo the width and amount 0 is a no-op.
fn shift(op: BinOp, seq: BitSeq, amount: i64) -> BitSeq {
    let len = seq.len();
    match op {
        BinOp::Shr => {
            let mut out: BitSeq = smallvec![FALSE_BIT; len];
            if amount > 0 && (amount as usize) < len {
                let n = amount as usize;
                for i in 0..len - n {
                    out[i + n] = seq[i];
                }
            }
            out
        }
        BinOp::Shl => {
            let mut out: BitSeq = smallvec![FALSE_BIT; len];
            if amount > 0 && (amount as usize) < len {
                let n = amount as usize;
                for i in n..len {
                    out[i - n] = seq[i];
                }
            }
            out
        }
        BinOp::Rotr | BinOp::Rotl => {
            if len == 0 {
                return seq;
            }
            let n = amount.rem_euclid(len as i64) as usize;
            if n == 0 {
                return seq;
            }
            let mut out = BitSeq::with_capacity(len);
            if op == BinOp::Rotr {
                out.extend(seq[len - n..].iter().copied());
                out.extend(seq[..len - n].iter().copied());
            } else {
                out.extend(seq[n..].iter().copied());
                out.extend(seq[..n].iter().copied());
            }
            out
        }
        _ => seq,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitloom_syntax::ast::Program;

    fn circuit(source: &str) -> Circuit {
        analyze(&Program::parse(source).unwrap()).unwrap()
    }

    fn error(source: &str) -> EvalError {
        analyze(&Program::parse(source).unwrap()).unwrap_err()
    }

    fn outputs(source: &str) -> Vec<BitId> {
        circuit(source).outputs.to_vec()
    }

    #[test]
    fn identity() {
        let c = circuit("function main:8 { main = main; return main; }");
        assert_eq!(c.outputs.to_vec(), (2..10).collect::<Vec<_>>());
        assert_eq!(c.input_bits, 8);
        // No symbolic bits were needed.
        assert_eq!(c.pool.len(), 10);
    }

    #[test]
    fn negation_allocates_per_bit() {
        let c = circuit("function main:4 { main = ~main; return main; }");
        assert_eq!(c.outputs.to_vec(), vec![6, 7, 8, 9]);
        assert_eq!(c.pool.get(6), Bit::Not(2));
        assert_eq!(c.pool.get(9), Bit::Not(5));
    }

    #[test]
    fn negation_of_constants_folds() {
        let c = circuit("function main:1 { a = ~0; a = ~a; return a; }");
        assert_eq!(c.outputs.to_vec(), vec![FALSE_BIT]);
        // Double negation on a constant allocates nothing.
        assert_eq!(c.pool.len(), 3);
    }

    #[test]
    fn and_with_literal_folds() {
        let c = circuit("function main:8 { main = main & 0xF0; return main; }");
        assert_eq!(c.outputs.to_vec(), vec![2, 3, 4, 5, 0, 0, 0, 0]);
        assert_eq!(c.pool.len(), 10);
    }

    #[test]
    fn constant_folding_is_complete() {
        for (source, expected) in [
            ("function main:1 { r = 0 & 1; return r; }", FALSE_BIT),
            ("function main:1 { r = 1 & 1; return r; }", TRUE_BIT),
            ("function main:1 { r = 1 | 0; return r; }", TRUE_BIT),
            ("function main:1 { r = 0 | 0; return r; }", FALSE_BIT),
            ("function main:1 { r = 1 ^ 1; return r; }", FALSE_BIT),
            ("function main:1 { r = 1 ^ 0; return r; }", TRUE_BIT),
        ] {
            let c = circuit(source);
            assert_eq!(c.outputs.to_vec(), vec![expected], "{source}");
            assert_eq!(c.pool.len(), 3, "{source}");
        }
    }

    #[test]
    fn identity_operands_fold() {
        // `1 & x` is `x`, `0 | x` is `x`.
        let c = circuit("function main:1 { r = main & 1; return r; }");
        assert_eq!(c.outputs.to_vec(), vec![2]);
        let c = circuit("function main:1 { r = main | 0; return r; }");
        assert_eq!(c.outputs.to_vec(), vec![2]);
        let c = circuit("function main:1 { r = main & 0; return r; }");
        assert_eq!(c.outputs.to_vec(), vec![FALSE_BIT]);
        let c = circuit("function main:1 { r = main | 1; return r; }");
        assert_eq!(c.outputs.to_vec(), vec![TRUE_BIT]);
    }

    #[test]
    fn xor_of_equal_symbolic_bits_allocates() {
        let c = circuit("function main:1 { r = main ^ main; return r; }");
        assert_eq!(
            c.pool.get(c.outputs[0]),
            Bit::Binary {
                op: BoolOp::Xor,
                lhs: 2,
                rhs: 2
            }
        );
    }

    #[test]
    fn shorter_operand_pads_with_false() {
        let c = circuit("function main:4 { r = main & 1; return r; }");
        assert_eq!(c.outputs.to_vec(), vec![2, 0, 0, 0]);
    }

    #[test]
    fn concat_and_slice_roundtrip() {
        let c = circuit("function main:4 { a = main[0:2] :: main[2:4]; return a; }");
        assert_eq!(c.outputs.to_vec(), vec![2, 3, 4, 5]);
    }

    #[test]
    fn slice_boundaries() {
        assert_eq!(
            outputs("function main:4 { r = main[:]; return r; }"),
            vec![2, 3, 4, 5]
        );
        assert_eq!(outputs("function main:4 { r = main[:0]; return r; }"), vec![]);
        assert_eq!(
            outputs("function main:4 { r = main[-1:]; return r; }"),
            vec![5]
        );
    }

    #[test]
    fn negative_index_wraps() {
        assert_eq!(outputs("function main:4 { r = main[-1]; return r; }"), vec![5]);
        assert_eq!(outputs("function main:4 { r = main[-4]; return r; }"), vec![2]);
    }

    #[test]
    fn index_out_of_range() {
        assert_eq!(
            error("function main:4 { r = main[4]; return r; }"),
            EvalError::IndexOutOfRange { index: 4, len: 4 }
        );
        assert_eq!(
            error("function main:4 { r = main[-5]; return r; }"),
            EvalError::IndexOutOfRange { index: -5, len: 4 }
        );
    }

    #[test]
    fn reversed_slice_is_rejected() {
        assert_eq!(
            error("function main:4 { r = main[2:1]; return r; }"),
            EvalError::InvalidSlice {
                start: 2,
                end: 1,
                len: 4
            }
        );
    }

    #[test]
    fn logical_shifts() {
        // `>>` moves bits toward higher positions, zero-filling the front.
        assert_eq!(
            outputs("function main:4 { r = main >> 1; return r; }"),
            vec![0, 2, 3, 4]
        );
        assert_eq!(
            outputs("function main:4 { r = main << 1; return r; }"),
            vec![3, 4, 5, 0]
        );
    }

    #[test]
    fn shift_by_width_zeroes() {
        assert_eq!(
            outputs("function main:4 { r = main >> 4; return r; }"),
            vec![0, 0, 0, 0]
        );
        assert_eq!(
            outputs("function main:4 { r = main << 7; return r; }"),
            vec![0, 0, 0, 0]
        );
        // Shift by zero also zeroes; only `0 < n < len` shifts.
        assert_eq!(
            outputs("function main:4 { r = main >> 0; return r; }"),
            vec![0, 0, 0, 0]
        );
    }

    #[test]
    fn rotations() {
        assert_eq!(
            outputs("function main:8 { r = main >>> 0x1; return r; }"),
            vec![9, 2, 3, 4, 5, 6, 7, 8]
        );
        assert_eq!(
            outputs("function main:4 { r = main <<< 1; return r; }"),
            vec![3, 4, 5, 2]
        );
    }

    #[test]
    fn rotate_by_width_is_identity() {
        assert_eq!(
            outputs("function main:4 { r = main >>> 4; return r; }"),
            vec![2, 3, 4, 5]
        );
        assert_eq!(
            outputs("function main:4 { r = main <<< 0; return r; }"),
            vec![2, 3, 4, 5]
        );
    }

    #[test]
    fn shift_amount_must_be_a_literal() {
        assert_eq!(
            error("function main:4 { r = main << main; return r; }"),
            EvalError::ShiftAmount
        );
    }

    #[test]
    fn calls_inline_the_callee() {
        let c = circuit(
            "function main:4 { r = inv(main); return r; }\n\
             function inv { inv = ~inv; return inv; }",
        );
        assert_eq!(c.outputs.to_vec(), vec![6, 7, 8, 9]);
        assert_eq!(c.pool.get(6), Bit::Not(2));
    }

    #[test]
    fn recursion_is_bounded() {
        assert_eq!(
            error(
                "function main:2 { r = f(main); return r; }\n\
                 function f { f = f(f); return f; }"
            ),
            EvalError::CallDepth
        );
    }

    #[test]
    fn index_assignment() {
        let c = circuit("function main:2 { a = main; a[0] = 1; return a; }");
        assert_eq!(c.outputs.to_vec(), vec![TRUE_BIT, 3]);
    }

    #[test]
    fn slice_assignment_keeps_width() {
        let c = circuit("function main:4 { a = main; a[0:2] = 0; return a; }");
        // One bit from the RHS, one fresh placeholder normalized to 0 on
        // the way out.
        assert_eq!(c.outputs.to_vec(), vec![0, 0, 4, 5]);
    }

    #[test]
    fn empty_rhs_writes_placeholders() {
        let c = circuit("function main:4 { a = main; a[0:2] = main[0:0]; return a; }");
        assert_eq!(c.outputs.to_vec(), vec![0, 0, 4, 5]);
        // The placeholders themselves are real pool records.
        assert_eq!(c.pool.get(6), Bit::Placeholder);
        assert_eq!(c.pool.get(7), Bit::Placeholder);
    }

    #[test]
    fn concat_with_empty_operand() {
        assert_eq!(
            outputs("function main:4 { a = main[0:0] :: main; return a; }"),
            vec![2, 3, 4, 5]
        );
    }

    #[test]
    fn hex_literal_width() {
        // Four bits per digit, MSB-first.
        assert_eq!(
            outputs("function main:1 { r = 0xA0; return r; }"),
            vec![1, 0, 1, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn unknown_names() {
        assert_eq!(
            error("function main:2 { r = x; return r; }"),
            EvalError::UnknownVariable("x".to_string())
        );
        assert_eq!(
            error("function main:2 { r = f(main); return r; }"),
            EvalError::UnknownFunction("f".to_string())
        );
    }

    #[test]
    fn unimplemented_operators_are_rejected() {
        assert_eq!(
            error("function main:2 { r = main == main; return r; }"),
            EvalError::InvalidOperator(BinOp::Eq)
        );
        assert_eq!(
            error("function main:2 { r = main && main; return r; }"),
            EvalError::InvalidOperator(BinOp::LogicalAnd)
        );
    }

    #[test]
    fn entry_requirements() {
        assert_eq!(error("function f { return f; }"), EvalError::MissingMain);
        assert_eq!(
            error("function main { return main; }"),
            EvalError::MissingWidth
        );
        assert_eq!(
            error("function main:0 { return main; }"),
            EvalError::InvalidWidth(0)
        );
    }

    #[test]
    fn body_without_return_yields_nothing() {
        let c = circuit("function main:2 { a = main; }");
        assert!(c.outputs.is_empty());
    }

    #[test]
    fn operands_precede_results() {
        let c = circuit(
            "function main:4 { a = main & main; b = ~a; c = a ^ b; return c; }",
        );
        for (id, bit) in c.pool.iter() {
            match bit {
                Bit::Not(x) => assert!(x < id),
                Bit::Binary { lhs, rhs, .. } => {
                    assert!(lhs < id);
                    assert!(rhs < id);
                }
                _ => {}
            }
        }
        for &id in &c.outputs {
            assert!(id < c.pool.len());
        }
    }

    #[test]
    fn reevaluation_is_equivalent() {
        // Evaluating the same expression twice need not share structure,
        // but both results must denote the same function of the inputs.
        let c = circuit(
            "function main:2 { a = main ^ main; b = main ^ main; a = a | b; return a; }",
        );
        for input in [[0x00u8], [0x40], [0x80], [0xC0]] {
            assert_eq!(c.evaluate(&input), vec![0x00]);
        }
    }
}
