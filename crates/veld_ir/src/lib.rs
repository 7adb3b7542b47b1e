//! The compiled intermediate representation and its execution backends.
//!
//! Subprogram and process bodies lower to a register-based three-address IR
//! grouped in basic blocks. Execution is coroutine-shaped: a run proceeds to
//! the next `wait` operation and yields the resumption condition, so the
//! simulation kernel can schedule processes without language-level
//! coroutines. The [`Interpreter`] defines reference semantics; alternative
//! backends must match it observably.

#![warn(missing_docs)]

pub mod builder;
pub mod interp;
pub mod opt;
pub mod unit;

pub use builder::IrBuilder;
pub use interp::{Backend, Frame, Interpreter, IrError, NoSignals, SignalAccess, StepOutcome};
pub use opt::simplify;
pub use unit::{Block, BlockId, IrPool, IrUnit, IrUnitId, Op, Opcode, Operand, Reg, UnitKind, Value};
