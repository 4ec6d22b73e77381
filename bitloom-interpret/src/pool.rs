//! The symbolic bit pool.

use core::fmt;

use smallvec::SmallVec;

/// Index of a bit in the [`Pool`].
pub type BitId = usize;

/// The canonical constant-false bit.
pub const FALSE_BIT: BitId = 0;
/// The canonical constant-true bit.
pub const TRUE_BIT: BitId = 1;

/// An ordered sequence of pool indices; the value of a DSL variable.
pub type BitSeq = SmallVec<[BitId; 16]>;

/// A boolean operator a derived bit can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    /// Bitwise conjunction.
    And,
    /// Bitwise disjunction.
    Or,
    /// Bitwise exclusive or.
    Xor,
}

impl BoolOp {
    /// The operator's C spelling.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
        }
    }

    /// Apply the operator to concrete values.
    pub fn apply(self, lhs: bool, rhs: bool) -> bool {
        match self {
            Self::And => lhs && rhs,
            Self::Or => lhs || rhs,
            Self::Xor => lhs != rhs,
        }
    }
}

/// A record in the bit pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bit {
    /// A constant. `false` and `true` live at the reserved indices
    /// [`FALSE_BIT`] and [`TRUE_BIT`].
    Const(bool),
    /// An input bit of `main`, carrying its 0-based position.
    Input(usize),
    /// The negation of an earlier bit.
    Not(BitId),
    /// A binary combination of two earlier bits.
    Binary {
        /// The operator.
        op: BoolOp,
        /// Left operand; strictly smaller than this bit's own index.
        lhs: BitId,
        /// Right operand; strictly smaller than this bit's own index.
        rhs: BitId,
    },
    /// A bit written by an index or slice assignment whose right-hand side
    /// had no corresponding element; reads as constant false.
    Placeholder,
}

/// The append-only pool of symbolic bits.
///
/// Indices are stable for the lifetime of a compilation. Operands of a
/// derived bit always precede it, so iterating in index order visits the
/// pool in topological order.
#[derive(Debug, Clone)]
pub struct Pool {
    bits: Vec<Bit>,
}

impl Pool {
    /// Create a pool holding the two constants followed by `input_bits`
    /// input bits.
    pub fn new(input_bits: usize) -> Self {
        let mut bits = Vec::with_capacity(input_bits + 2);
        bits.push(Bit::Const(false));
        bits.push(Bit::Const(true));
        bits.extend((0..input_bits).map(Bit::Input));
        Self { bits }
    }

    /// Append a bit and return its index.
    pub fn push(&mut self, bit: Bit) -> BitId {
        let id = self.bits.len();
        self.bits.push(bit);
        id
    }

    /// The bit at `id`.
    ///
    /// The analyzer never produces out-of-pool ids; such an id reads as the
    /// constant-false record rather than panicking.
    pub fn get(&self, id: BitId) -> Bit {
        self.bits.get(id).copied().unwrap_or(Bit::Const(false))
    }

    /// The canonical index of a constant.
    pub fn constant(value: bool) -> BitId {
        if value { TRUE_BIT } else { FALSE_BIT }
    }

    /// The number of bits allocated so far.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Whether the pool is empty. It never is after [`Pool::new`].
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Iterate over `(id, bit)` pairs in topological order.
    pub fn iter(&self) -> impl Iterator<Item = (BitId, Bit)> + '_ {
        self.bits.iter().copied().enumerate()
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, bit) in self.iter() {
            match bit {
                Bit::Const(value) => writeln!(f, "{id}: {}", u8::from(value))?,
                Bit::Input(pos) => writeln!(f, "{id}: input {pos}")?,
                Bit::Not(x) => writeln!(f, "{id}: ~{x}")?,
                Bit::Binary { op, lhs, rhs } => {
                    writeln!(f, "{id}: {lhs} {} {rhs}", op.symbol())?;
                }
                Bit::Placeholder => writeln!(f, "{id}: _")?,
            }
        }
        Ok(())
    }
}
