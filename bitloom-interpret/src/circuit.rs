//! The analyzed form of a program.

use crate::pool::{Bit, BitSeq, Pool};

/// A flat per-output-bit boolean circuit, the result of analysis.
#[derive(Debug, Clone)]
pub struct Circuit {
    /// The bit pool; operands of a derived bit always precede it.
    pub pool: Pool,
    /// The output bits in order, as pool indices.
    pub outputs: BitSeq,
    /// The number of input bits `main` declares.
    pub input_bits: usize,
}

impl Circuit {
    /// The number of bytes the packed input buffer occupies.
    pub fn input_bytes(&self) -> usize {
        self.input_bits.div_ceil(8)
    }

    /// The number of bytes the packed output buffer occupies.
    pub fn output_bytes(&self) -> usize {
        self.outputs.len().div_ceil(8)
    }

    /// Evaluate the circuit over a packed input buffer.
    ///
    /// Input bit `i` is read MSB-first as `(input[i / 8] >> (7 - i % 8)) & 1`;
    /// bytes beyond the end of `input` read as zero. The output sequence is
    /// packed the same way into [`output_bytes`](Self::output_bytes) bytes.
    /// This mirrors the contract of the emitted C function exactly.
    pub fn evaluate(&self, input: &[u8]) -> Vec<u8> {
        let mut values: Vec<bool> = Vec::with_capacity(self.pool.len());
        for (_, bit) in self.pool.iter() {
            let value = match bit {
                Bit::Const(value) => value,
                Bit::Input(pos) => {
                    let byte = input.get(pos / 8).copied().unwrap_or(0);
                    ((byte >> (7 - pos % 8)) & 1) == 1
                }
                Bit::Not(x) => !values[x],
                Bit::Binary { op, lhs, rhs } => op.apply(values[lhs], values[rhs]),
                Bit::Placeholder => false,
            };
            values.push(value);
        }

        let mut output = vec![0u8; self.output_bytes()];
        for (i, &id) in self.outputs.iter().enumerate() {
            if values[id] {
                output[i / 8] |= 1 << (7 - i % 8);
            }
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{BoolOp, FALSE_BIT, TRUE_BIT};
    use smallvec::smallvec;

    fn two_bit_circuit(outputs: BitSeq) -> Circuit {
        Circuit {
            pool: Pool::new(2),
            outputs,
            input_bits: 2,
        }
    }

    #[test]
    fn byte_sizes() {
        let c = Circuit {
            pool: Pool::new(9),
            outputs: (2..11).collect(),
            input_bits: 9,
        };
        assert_eq!(c.input_bytes(), 2);
        assert_eq!(c.output_bytes(), 2);
    }

    #[test]
    fn input_bits_are_msb_first() {
        let c = two_bit_circuit(smallvec![2, 3]);
        assert_eq!(c.evaluate(&[0b1000_0000]), vec![0b1000_0000]);
        assert_eq!(c.evaluate(&[0b0100_0000]), vec![0b0100_0000]);
    }

    #[test]
    fn constants_and_placeholders() {
        let mut pool = Pool::new(2);
        let placeholder = pool.push(Bit::Placeholder);
        let c = Circuit {
            pool,
            outputs: smallvec![TRUE_BIT, FALSE_BIT, placeholder],
            input_bits: 2,
        };
        assert_eq!(c.evaluate(&[0xFF]), vec![0b1000_0000]);
    }

    #[test]
    fn derived_bits() {
        let mut pool = Pool::new(2);
        let not = pool.push(Bit::Not(2));
        let and = pool.push(Bit::Binary {
            op: BoolOp::And,
            lhs: not,
            rhs: 3,
        });
        let c = Circuit {
            pool,
            outputs: smallvec![and],
            input_bits: 2,
        };
        // ~i0 & i1
        assert_eq!(c.evaluate(&[0b0100_0000]), vec![0b1000_0000]);
        assert_eq!(c.evaluate(&[0b1100_0000]), vec![0b0000_0000]);
    }

    #[test]
    fn missing_input_bytes_read_as_zero() {
        let c = two_bit_circuit(smallvec![2, 3]);
        assert_eq!(c.evaluate(&[]), vec![0]);
    }

    #[test]
    fn empty_outputs() {
        let c = two_bit_circuit(BitSeq::new());
        assert!(c.evaluate(&[0xFF]).is_empty());
    }
}
