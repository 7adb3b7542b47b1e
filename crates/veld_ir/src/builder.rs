//! Sequential construction of IR units.

use crate::unit::{Block, BlockId, IrUnit, Op, Opcode, Operand, Reg, UnitKind};
use veld_common::Ident;
use veld_source::Loc;

/// Builds an [`IrUnit`] one operation at a time.
///
/// Keeps a cursor on the block being filled and hands out fresh registers
/// and local slots.
pub struct IrBuilder {
    unit: IrUnit,
    cursor: BlockId,
    loc: Loc,
}

impl IrBuilder {
    /// Starts a new unit with an empty entry block.
    pub fn new(name: Ident, kind: UnitKind) -> Self {
        Self {
            unit: IrUnit::new(name, kind),
            cursor: BlockId(0),
            loc: Loc::DUMMY,
        }
    }

    /// Sets the source location stamped onto subsequently emitted ops.
    pub fn set_loc(&mut self, loc: Loc) {
        self.loc = loc;
    }

    /// Allocates a fresh register.
    pub fn new_reg(&mut self) -> Reg {
        let reg = Reg(self.unit.nregs);
        self.unit.nregs += 1;
        reg
    }

    /// Allocates a fresh local slot.
    pub fn new_local(&mut self) -> u32 {
        let slot = self.unit.nlocals;
        self.unit.nlocals += 1;
        slot
    }

    /// Appends an empty block and returns its id.
    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.unit.blocks.len() as u32);
        self.unit.blocks.push(Block::default());
        id
    }

    /// Moves the cursor to `block`.
    pub fn select_block(&mut self, block: BlockId) {
        self.cursor = block;
    }

    /// Returns the block the cursor is on.
    pub fn current_block(&self) -> BlockId {
        self.cursor
    }

    /// Emits an operation at the cursor.
    pub fn emit(&mut self, opcode: Opcode, dst: Option<Reg>, a: Option<Operand>, b: Option<Operand>) {
        let op = Op {
            opcode,
            dst,
            a,
            b,
            loc: self.loc,
        };
        self.unit.blocks[self.cursor.0 as usize].ops.push(op);
    }

    /// Emits a value-producing operation into a fresh register.
    pub fn emit_value(&mut self, opcode: Opcode, a: Option<Operand>, b: Option<Operand>) -> Reg {
        let dst = self.new_reg();
        self.emit(opcode, Some(dst), a, b);
        dst
    }

    /// Finishes the unit.
    pub fn finish(self) -> IrUnit {
        self.unit
    }
}
