/*!
The C back end of the bitloom compiler.

Serializes an analyzed [`Circuit`] into a self-contained C function that
unpacks a packed input buffer, evaluates every output bit and packs the
result MSB-first into a `static` output buffer:

```c
char* f(char* input) {
    static char output[1] = {0};
    for (int i = 0; i < 1; i++) output[i] = 0;
    int t6 = (~((input[0] >> 7) & 1) & 1);
    output[0] |= (t6 << 7);

    return output;
}
```

Every derived bit reachable from the outputs becomes one `int t<id>`
temporary, emitted in pool order; operands always precede their uses, so
circuits of any depth serialize correctly.

## Safety
This crate forbids unsafe code via a crate-level attribute.
*/

#![forbid(unsafe_code)]
#![deny(missing_docs)]

use std::fmt::Write;

use bitloom_interpret::{Bit, BitId, Circuit};
use log::debug;
use rustc_hash::FxHashSet;

/// Emit a C function named `name` computing `circuit`.
///
/// The function has the shape `char* name(char* input)`. Input bit `q` is
/// read as `(input[q / 8] >> (7 - q % 8)) & 1`; output bit `i` is packed
/// the same way. The returned pointer refers to a `static` buffer, so the
/// function is not reentrant.
pub fn emit(circuit: &Circuit, name: &str) -> String {
    let mut code = String::new();
    // Writing into a String cannot fail.
    let _ = emit_into(&mut code, circuit, name);
    code
}

fn emit_into(code: &mut String, circuit: &Circuit, name: &str) -> std::fmt::Result {
    let out_bytes = circuit.output_bytes();

    writeln!(code, "char* {name}(char* input) {{")?;
    writeln!(code, "    static char output[{out_bytes}] = {{0}};")?;
    writeln!(code, "    for (int i = 0; i < {out_bytes}; i++) output[i] = 0;")?;

    let derived = reachable_derived(circuit);
    debug!(
        "emitting `{name}`: {} temporaries, {} output bits",
        derived.len(),
        circuit.outputs.len()
    );

    for id in derived {
        match circuit.pool.get(id) {
            Bit::Not(x) => {
                writeln!(code, "    int t{id} = (~{} & 1);", operand(circuit, x))?;
            }
            Bit::Binary { op, lhs, rhs } => {
                writeln!(
                    code,
                    "    int t{id} = (({} {} {}) & 1);",
                    operand(circuit, lhs),
                    op.symbol(),
                    operand(circuit, rhs)
                )?;
            }
            _ => {}
        }
    }

    for (i, &id) in circuit.outputs.iter().enumerate() {
        let expr = match circuit.pool.get(id) {
            // The buffer was cleared; false bits need no statement.
            Bit::Const(false) | Bit::Placeholder => continue,
            Bit::Const(true) => "(1)".to_string(),
            _ => operand(circuit, id),
        };
        writeln!(code, "    output[{}] |= ({expr} << {});", i / 8, 7 - i % 8)?;
    }

    writeln!(code)?;
    writeln!(code, "    return output;")?;
    writeln!(code, "}}")?;

    Ok(())
}

/// The C expression for one operand bit.
fn operand(circuit: &Circuit, id: BitId) -> String {
    match circuit.pool.get(id) {
        Bit::Const(false) | Bit::Placeholder => "0".to_string(),
        Bit::Const(true) => "1".to_string(),
        Bit::Input(pos) => format!("((input[{}] >> {}) & 1)", pos / 8, 7 - pos % 8),
        Bit::Not(_) | Bit::Binary { .. } => format!("t{id}"),
    }
}

/// The derived bits reachable from the outputs, in pool (topological)
/// order. Bits nothing depends on are never emitted.
fn reachable_derived(circuit: &Circuit) -> Vec<BitId> {
    let mut seen = FxHashSet::default();
    let mut stack: Vec<BitId> = circuit.outputs.iter().copied().collect();

    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        match circuit.pool.get(id) {
            Bit::Not(x) => stack.push(x),
            Bit::Binary { lhs, rhs, .. } => {
                stack.push(lhs);
                stack.push(rhs);
            }
            _ => {}
        }
    }

    let mut derived: Vec<BitId> = seen
        .into_iter()
        .filter(|&id| matches!(circuit.pool.get(id), Bit::Not(_) | Bit::Binary { .. }))
        .collect();
    derived.sort_unstable();
    derived
}
