//! IR data structures: units, blocks, operations, and runtime values.

use serde::{Deserialize, Serialize};
use veld_common::Ident;
use veld_source::Loc;

/// A virtual register within an IR unit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Reg(pub u32);

/// Identifier of a basic block within an IR unit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct BlockId(pub u32);

/// Identifier of an IR unit within an [`IrPool`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct IrUnitId(pub u32);

/// A scalar runtime value.
///
/// Integers also carry enumeration ordinals and physical values in primary
/// units; operand widths come from the type layout and are carried
/// out-of-band.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub enum Value {
    /// An integer, ordinal, or physical value.
    Int(i64),
    /// A floating-point value.
    Real(f64),
}

impl Value {
    /// Returns the integer payload, if this is an integer.
    pub fn as_int(self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(v),
            Value::Real(_) => None,
        }
    }

    /// Returns `true` for a non-zero integer.
    pub fn is_true(self) -> bool {
        matches!(self, Value::Int(v) if v != 0)
    }
}

/// A source operand: a register or an immediate.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub enum Operand {
    /// Read a register.
    Reg(Reg),
    /// An integer immediate.
    Imm(i64),
    /// A real immediate.
    RealImm(f64),
}

/// Operation codes.
///
/// Structural payload (branch targets, slot and signal indices) lives in
/// the opcode; value inputs come through the two operand slots.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum Opcode {
    /// `dst = a`.
    Move,
    /// `dst = a + b`.
    Add,
    /// `dst = a - b`.
    Sub,
    /// `dst = a * b`.
    Mul,
    /// `dst = a / b`; traps on division by zero.
    Div,
    /// `dst = a mod b` (sign of `b`); traps on zero.
    Mod,
    /// `dst = a rem b` (sign of `a`); traps on zero.
    Rem,
    /// `dst = -a`.
    Neg,
    /// `dst = |a|`.
    Abs,
    /// `dst = a & b` (logical for 0/1 operands).
    And,
    /// `dst = a | b`.
    Or,
    /// `dst = a ^ b`.
    Xor,
    /// `dst = !a` for booleans.
    Not,
    /// `dst = a == b`.
    CmpEq,
    /// `dst = a != b`.
    CmpNe,
    /// `dst = a < b`.
    CmpLt,
    /// `dst = a <= b`.
    CmpLe,
    /// `dst = a > b`.
    CmpGt,
    /// `dst = a >= b`.
    CmpGe,
    /// `dst = locals[slot]`.
    Load {
        /// Local slot index.
        slot: u32,
    },
    /// `locals[slot] = a`.
    Store {
        /// Local slot index.
        slot: u32,
    },
    /// `dst = current value of the mapped signal`.
    SignalRead {
        /// Process-local signal table index.
        signal: u32,
    },
    /// Schedule a drive of the mapped signal: value `a` after `b`
    /// femtoseconds.
    SignalDrive {
        /// Process-local signal table index.
        signal: u32,
    },
    /// Suspend until an event on the sensitivity set or the timeout in `a`
    /// femtoseconds elapses.
    Wait {
        /// Process-local indices of signals to wake on.
        sensitivity: Vec<u32>,
        /// Whether operand `a` carries a timeout.
        has_timeout: bool,
    },
    /// Unconditional jump.
    Jump {
        /// Target block.
        target: BlockId,
    },
    /// Conditional branch on `a`.
    Branch {
        /// Target when `a` is true.
        if_true: BlockId,
        /// Target when `a` is false.
        if_false: BlockId,
    },
    /// Return from the unit, optionally with `a`.
    Return,
    /// Assert that `a` is true; `b` carries the severity ordinal.
    Assert {
        /// Report message.
        message: Option<String>,
    },
    /// Unconditional fatal trap.
    Trap {
        /// Diagnostic message.
        message: String,
    },
}

/// One three-address operation.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Op {
    /// The operation.
    pub opcode: Opcode,
    /// Destination register, when the opcode produces a value.
    pub dst: Option<Reg>,
    /// First source operand.
    pub a: Option<Operand>,
    /// Second source operand.
    pub b: Option<Operand>,
    /// Source location for diagnostics.
    pub loc: Loc,
}

/// A basic block: a straight-line run of operations.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Block {
    /// The operations in execution order.
    pub ops: Vec<Op>,
}

/// What an IR unit represents.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum UnitKind {
    /// A callable function; arguments arrive in the first local slots.
    Function,
    /// A process body; runs forever, suspending at waits.
    Process,
}

/// A compiled function or process.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct IrUnit {
    /// The unit's name.
    pub name: Ident,
    /// Function or process.
    pub kind: UnitKind,
    /// Number of virtual registers used.
    pub nregs: u32,
    /// Number of local slots, including any arguments.
    pub nlocals: u32,
    /// Basic blocks; entry is block 0.
    pub blocks: Vec<Block>,
}

impl IrUnit {
    /// Creates an empty unit with a single entry block.
    pub fn new(name: Ident, kind: UnitKind) -> Self {
        Self {
            name,
            kind,
            nregs: 0,
            nlocals: 0,
            blocks: vec![Block::default()],
        }
    }

    /// Returns the block for `id`.
    ///
    /// # Panics
    ///
    /// Panics if the id is out of range.
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }
}

/// In-memory registry of compiled units.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IrPool {
    units: Vec<IrUnit>,
}

impl IrPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a unit, returning its id.
    pub fn define(&mut self, unit: IrUnit) -> IrUnitId {
        let id = IrUnitId(self.units.len() as u32);
        self.units.push(unit);
        id
    }

    /// Returns the unit for `id`.
    ///
    /// # Panics
    ///
    /// Panics if the id is out of range.
    pub fn get(&self, id: IrUnitId) -> &IrUnit {
        &self.units[id.0 as usize]
    }

    /// Returns the unit for `id` mutably.
    pub fn get_mut(&mut self, id: IrUnitId) -> &mut IrUnit {
        &mut self.units[id.0 as usize]
    }

    /// Returns the number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if the pool holds no units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
