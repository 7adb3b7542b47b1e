//! Lowering process bodies to IR.

use std::collections::HashMap;

use veld_common::{Ident, Interner};
use veld_ir::{IrBuilder, IrUnit, Opcode, Operand, UnitKind, Value};
use veld_tree::{BinaryOp, TreeData, TreeRef, TreeStore, UnaryOp};

use crate::error::ElabError;

/// What a name in scope resolves to during lowering.
#[derive(Clone, Copy, Debug)]
pub enum EnvBinding {
    /// A signal, by flat index.
    Signal(usize),
    /// A constant or generic, folded to a value.
    Const(Value),
}

/// A lowered process body with its signal table.
#[derive(Debug)]
pub struct LoweredProcess {
    /// The compiled unit.
    pub unit: IrUnit,
    /// Process-local signal table: local index to flat signal index.
    pub signal_table: Vec<usize>,
    /// Flat indices of signals this process drives.
    pub drives: Vec<usize>,
}

struct Lowerer<'a> {
    trees: &'a TreeStore,
    interner: &'a Interner,
    env: &'a HashMap<Ident, EnvBinding>,
    builder: IrBuilder,
    signal_table: Vec<usize>,
    signal_local: HashMap<usize, u32>,
    vars: HashMap<Ident, u32>,
}

/// Lowers a process body to an IR unit.
///
/// A process with a sensitivity list gets the implicit trailing `wait on`
/// that VHDL prescribes; a process without one loops back to its first
/// statement and must contain its own waits.
pub fn lower_process(
    trees: &TreeStore,
    interner: &Interner,
    env: &HashMap<Ident, EnvBinding>,
    name: Ident,
    sensitivity: &[Ident],
    decls: &[TreeRef],
    body: &[TreeRef],
) -> Result<LoweredProcess, ElabError> {
    let mut lowerer = Lowerer {
        trees,
        interner,
        env,
        builder: IrBuilder::new(name, UnitKind::Process),
        signal_table: Vec::new(),
        signal_local: HashMap::new(),
        vars: HashMap::new(),
    };

    // Variable declarations initialize once, before the body loop.
    for decl in decls {
        lowerer.lower_decl(*decl)?;
    }

    let body_start = lowerer.builder.new_block();
    lowerer
        .builder
        .emit(Opcode::Jump { target: body_start }, None, None, None);
    lowerer.builder.select_block(body_start);

    for stmt in body {
        lowerer.lower_stmt(*stmt)?;
    }

    if !sensitivity.is_empty() {
        let locals = sensitivity
            .iter()
            .map(|ident| lowerer.signal_local_of_name(*ident))
            .collect::<Result<Vec<_>, _>>()?;
        lowerer.builder.emit(
            Opcode::Wait {
                sensitivity: locals,
                has_timeout: false,
            },
            None,
            None,
            None,
        );
    }
    lowerer
        .builder
        .emit(Opcode::Jump { target: body_start }, None, None, None);

    let unit = lowerer.builder.finish();
    let drives = collect_drives(&unit, &lowerer.signal_table);
    Ok(LoweredProcess {
        unit,
        signal_table: lowerer.signal_table,
        drives,
    })
}

fn collect_drives(unit: &IrUnit, signal_table: &[usize]) -> Vec<usize> {
    let mut drives = Vec::new();
    for block in &unit.blocks {
        for op in &block.ops {
            if let Opcode::SignalDrive { signal } = &op.opcode {
                let flat = signal_table[*signal as usize];
                if !drives.contains(&flat) {
                    drives.push(flat);
                }
            }
        }
    }
    drives
}

impl<'a> Lowerer<'a> {
    fn signal_local(&mut self, flat: usize) -> u32 {
        if let Some(local) = self.signal_local.get(&flat) {
            return *local;
        }
        let local = self.signal_table.len() as u32;
        self.signal_table.push(flat);
        self.signal_local.insert(flat, local);
        local
    }

    fn signal_local_of_name(&mut self, ident: Ident) -> Result<u32, ElabError> {
        match self.env.get(&ident) {
            Some(EnvBinding::Signal(flat)) => Ok(self.signal_local(*flat)),
            _ => Err(ElabError::UnresolvedName {
                name: self.interner.resolve(ident).to_string(),
                loc: veld_source::Loc::DUMMY,
            }),
        }
    }

    fn lower_decl(&mut self, decl: TreeRef) -> Result<(), ElabError> {
        let node = self.trees.get(decl);
        match &node.data {
            TreeData::VarDecl { ident, init, .. } => {
                let slot = self.builder.new_local();
                self.vars.insert(*ident, slot);
                if let Some(init) = init {
                    let value = self.lower_expr(*init)?;
                    self.builder
                        .emit(Opcode::Store { slot }, None, Some(value), None);
                }
                Ok(())
            }
            TreeData::ConstDecl { .. } => {
                // Constants were folded into the environment by elaboration.
                Ok(())
            }
            _ => Err(ElabError::Unsupported {
                detail: "declaration kind in process".to_string(),
                loc: node.loc,
            }),
        }
    }

    fn lower_stmt(&mut self, stmt: TreeRef) -> Result<(), ElabError> {
        let node = self.trees.get(stmt);
        let loc = node.loc;
        self.builder.set_loc(loc);

        match &node.data.clone() {
            TreeData::SignalAssign {
                target,
                value,
                delay,
            } => {
                let target_node = self.trees.get(*target);
                let TreeData::Ref { ident } = &target_node.data else {
                    return Err(ElabError::Unsupported {
                        detail: "signal assignment target must be a name".to_string(),
                        loc: target_node.loc,
                    });
                };
                let local = self.signal_local_of_name(*ident)?;
                let value = self.lower_expr(*value)?;
                let delay = match delay {
                    Some(d) => Some(self.lower_expr(*d)?),
                    None => None,
                };
                self.builder.set_loc(loc);
                self.builder.emit(
                    Opcode::SignalDrive { signal: local },
                    None,
                    Some(value),
                    delay,
                );
                Ok(())
            }
            TreeData::VarAssign { target, value } => {
                let target_node = self.trees.get(*target);
                let TreeData::Ref { ident } = &target_node.data else {
                    return Err(ElabError::Unsupported {
                        detail: "variable assignment target must be a name".to_string(),
                        loc: target_node.loc,
                    });
                };
                let Some(slot) = self.vars.get(ident).copied() else {
                    return Err(ElabError::UnresolvedName {
                        name: self.interner.resolve(*ident).to_string(),
                        loc: target_node.loc,
                    });
                };
                let value = self.lower_expr(*value)?;
                self.builder.set_loc(loc);
                self.builder
                    .emit(Opcode::Store { slot }, None, Some(value), None);
                Ok(())
            }
            TreeData::If {
                cond,
                then_stmts,
                else_stmts,
            } => {
                let cond = self.lower_expr(*cond)?;
                let then_block = self.builder.new_block();
                let else_block = self.builder.new_block();
                let merge = self.builder.new_block();
                self.builder.set_loc(loc);
                self.builder.emit(
                    Opcode::Branch {
                        if_true: then_block,
                        if_false: else_block,
                    },
                    None,
                    Some(cond),
                    None,
                );

                self.builder.select_block(then_block);
                for s in then_stmts {
                    self.lower_stmt(*s)?;
                }
                self.builder
                    .emit(Opcode::Jump { target: merge }, None, None, None);

                self.builder.select_block(else_block);
                for s in else_stmts {
                    self.lower_stmt(*s)?;
                }
                self.builder
                    .emit(Opcode::Jump { target: merge }, None, None, None);

                self.builder.select_block(merge);
                Ok(())
            }
            TreeData::While { cond, body } => {
                let head = self.builder.new_block();
                let body_block = self.builder.new_block();
                let exit = self.builder.new_block();
                self.builder
                    .emit(Opcode::Jump { target: head }, None, None, None);

                self.builder.select_block(head);
                match cond {
                    Some(cond) => {
                        let cond = self.lower_expr(*cond)?;
                        self.builder.emit(
                            Opcode::Branch {
                                if_true: body_block,
                                if_false: exit,
                            },
                            None,
                            Some(cond),
                            None,
                        );
                    }
                    None => {
                        self.builder
                            .emit(Opcode::Jump { target: body_block }, None, None, None);
                    }
                }

                self.builder.select_block(body_block);
                for s in body {
                    self.lower_stmt(*s)?;
                }
                self.builder
                    .emit(Opcode::Jump { target: head }, None, None, None);

                self.builder.select_block(exit);
                Ok(())
            }
            TreeData::Wait { on, until, timeout } => {
                if until.is_some() {
                    return Err(ElabError::Unsupported {
                        detail: "wait until condition".to_string(),
                        loc,
                    });
                }
                let sensitivity = on
                    .iter()
                    .map(|ident| self.signal_local_of_name(*ident))
                    .collect::<Result<Vec<_>, _>>()?;
                let timeout_operand = match timeout {
                    Some(t) => Some(self.lower_expr(*t)?),
                    None => None,
                };
                self.builder.set_loc(loc);
                self.builder.emit(
                    Opcode::Wait {
                        sensitivity,
                        has_timeout: timeout_operand.is_some(),
                    },
                    None,
                    timeout_operand,
                    None,
                );
                Ok(())
            }
            TreeData::Assert {
                cond,
                message,
                severity,
            } => {
                let cond = self.lower_expr(*cond)?;
                let message = match message {
                    Some(m) => match &self.trees.get(*m).data {
                        TreeData::StringLit { text } => Some(text.clone()),
                        _ => {
                            return Err(ElabError::Unsupported {
                                detail: "assertion message must be a string literal".to_string(),
                                loc,
                            })
                        }
                    },
                    None => None,
                };
                let severity = match severity {
                    Some(s) => Some(self.lower_expr(*s)?),
                    None => None,
                };
                self.builder.set_loc(loc);
                self.builder
                    .emit(Opcode::Assert { message }, None, Some(cond), severity);
                Ok(())
            }
            _ => Err(ElabError::Unsupported {
                detail: "statement kind not valid in a process body".to_string(),
                loc,
            }),
        }
    }

    fn lower_expr(&mut self, expr: TreeRef) -> Result<Operand, ElabError> {
        let node = self.trees.get(expr);
        let loc = node.loc;

        match &node.data.clone() {
            TreeData::IntLit { value } => Ok(Operand::Imm(*value)),
            TreeData::RealLit { value } => Ok(Operand::RealImm(*value)),
            TreeData::EnumLit { ordinal, .. } => Ok(Operand::Imm(*ordinal as i64)),
            TreeData::PhysLit { value, .. } => Ok(Operand::Imm(*value)),
            TreeData::Ref { ident } => match self.env.get(ident) {
                Some(EnvBinding::Const(Value::Int(v))) => Ok(Operand::Imm(*v)),
                Some(EnvBinding::Const(Value::Real(v))) => Ok(Operand::RealImm(*v)),
                Some(EnvBinding::Signal(flat)) => {
                    let local = self.signal_local(*flat);
                    self.builder.set_loc(loc);
                    let reg = self
                        .builder
                        .emit_value(Opcode::SignalRead { signal: local }, None, None);
                    Ok(Operand::Reg(reg))
                }
                None => match self.vars.get(ident) {
                    Some(slot) => {
                        self.builder.set_loc(loc);
                        let reg = self
                            .builder
                            .emit_value(Opcode::Load { slot: *slot }, None, None);
                        Ok(Operand::Reg(reg))
                    }
                    None => Err(ElabError::UnresolvedName {
                        name: self.interner.resolve(*ident).to_string(),
                        loc,
                    }),
                },
            },
            TreeData::Unary { op, operand } => {
                let a = self.lower_expr(*operand)?;
                let opcode = match op {
                    UnaryOp::Neg => Opcode::Neg,
                    UnaryOp::Not => Opcode::Not,
                    UnaryOp::Abs => Opcode::Abs,
                };
                self.builder.set_loc(loc);
                Ok(Operand::Reg(self.builder.emit_value(opcode, Some(a), None)))
            }
            TreeData::Binary { op, left, right } => {
                let a = self.lower_expr(*left)?;
                let b = self.lower_expr(*right)?;
                self.builder.set_loc(loc);
                let (opcode, negate) = match op {
                    BinaryOp::Add => (Opcode::Add, false),
                    BinaryOp::Sub => (Opcode::Sub, false),
                    BinaryOp::Mul => (Opcode::Mul, false),
                    BinaryOp::Div => (Opcode::Div, false),
                    BinaryOp::Mod => (Opcode::Mod, false),
                    BinaryOp::Rem => (Opcode::Rem, false),
                    BinaryOp::And => (Opcode::And, false),
                    BinaryOp::Or => (Opcode::Or, false),
                    BinaryOp::Xor => (Opcode::Xor, false),
                    BinaryOp::Nand => (Opcode::And, true),
                    BinaryOp::Nor => (Opcode::Or, true),
                    BinaryOp::Eq => (Opcode::CmpEq, false),
                    BinaryOp::Neq => (Opcode::CmpNe, false),
                    BinaryOp::Lt => (Opcode::CmpLt, false),
                    BinaryOp::Le => (Opcode::CmpLe, false),
                    BinaryOp::Gt => (Opcode::CmpGt, false),
                    BinaryOp::Ge => (Opcode::CmpGe, false),
                };
                let reg = self.builder.emit_value(opcode, Some(a), Some(b));
                if negate {
                    let negated = self
                        .builder
                        .emit_value(Opcode::Not, Some(Operand::Reg(reg)), None);
                    Ok(Operand::Reg(negated))
                } else {
                    Ok(Operand::Reg(reg))
                }
            }
            _ => Err(ElabError::Unsupported {
                detail: "expression kind in process body".to_string(),
                loc,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veld_ir::{Backend, Frame, Interpreter, SignalAccess, StepOutcome};

    struct TestSignals {
        values: Vec<Value>,
        driven: Vec<(u32, Value, u64)>,
    }

    impl SignalAccess for TestSignals {
        fn read(&self, signal: u32) -> Value {
            self.values[signal as usize]
        }

        fn drive(&mut self, signal: u32, value: Value, after_fs: u64) {
            self.driven.push((signal, value, after_fs));
        }
    }

    fn setup() -> (TreeStore, Interner, HashMap<Ident, EnvBinding>) {
        (TreeStore::new(), Interner::new(), HashMap::new())
    }

    #[test]
    fn counter_process_shape() {
        // process begin count <= count + 1; wait for 10 ns; end process
        let (mut trees, interner, mut env) = setup();
        let count = interner.intern("count");
        env.insert(count, EnvBinding::Signal(3));

        let target = trees.synth(TreeData::Ref { ident: count });
        let read = trees.synth(TreeData::Ref { ident: count });
        let one = trees.synth(TreeData::IntLit { value: 1 });
        let sum = trees.synth(TreeData::Binary {
            op: BinaryOp::Add,
            left: read,
            right: one,
        });
        let assign = trees.synth(TreeData::SignalAssign {
            target,
            value: sum,
            delay: None,
        });
        let ten_ns = trees.synth(TreeData::IntLit {
            value: 10_000_000,
        });
        let wait = trees.synth(TreeData::Wait {
            on: vec![],
            until: None,
            timeout: Some(ten_ns),
        });

        let lowered = lower_process(
            &trees,
            &interner,
            &env,
            interner.intern("p1"),
            &[],
            &[],
            &[assign, wait],
        )
        .unwrap();

        assert_eq!(lowered.signal_table, vec![3]);
        assert_eq!(lowered.drives, vec![3]);

        // Execute one activation: expect a drive then a wait with timeout.
        let mut frame = Frame::new(&lowered.unit);
        let mut signals = TestSignals {
            values: vec![Value::Int(0)],
            driven: Vec::new(),
        };
        let outcome = Interpreter::new()
            .execute(&lowered.unit, &mut frame, &mut signals)
            .unwrap();
        assert_eq!(
            outcome,
            StepOutcome::Wait {
                sensitivity: vec![],
                timeout: Some(10_000_000)
            }
        );
        assert_eq!(signals.driven, vec![(0, Value::Int(1), 0)]);
    }

    #[test]
    fn sensitivity_list_appends_wait() {
        let (mut trees, interner, mut env) = setup();
        let s = interner.intern("s");
        let q = interner.intern("q");
        env.insert(s, EnvBinding::Signal(0));
        env.insert(q, EnvBinding::Signal(1));

        let target = trees.synth(TreeData::Ref { ident: q });
        let value = trees.synth(TreeData::Ref { ident: s });
        let assign = trees.synth(TreeData::SignalAssign {
            target,
            value,
            delay: None,
        });

        let lowered = lower_process(
            &trees,
            &interner,
            &env,
            interner.intern("follow"),
            &[s],
            &[],
            &[assign],
        )
        .unwrap();

        // Runs the body then suspends on the implicit wait.
        let mut frame = Frame::new(&lowered.unit);
        let mut signals = TestSignals {
            values: vec![Value::Int(5), Value::Int(0)],
            driven: Vec::new(),
        };
        let outcome = Interpreter::new()
            .execute(&lowered.unit, &mut frame, &mut signals)
            .unwrap();
        let StepOutcome::Wait { sensitivity, timeout } = outcome else {
            panic!("expected wait");
        };
        assert_eq!(timeout, None);
        // The sensitivity entry maps back to flat signal 0.
        assert_eq!(
            sensitivity
                .iter()
                .map(|l| lowered.signal_table[*l as usize])
                .collect::<Vec<_>>(),
            vec![0]
        );
        assert_eq!(signals.driven.len(), 1);
    }

    #[test]
    fn variables_load_and_store() {
        let (mut trees, interner, mut env) = setup();
        let out = interner.intern("out");
        env.insert(out, EnvBinding::Signal(0));
        let v = interner.intern("v");

        let int_ty = veld_object::Handle::new(veld_object::ArenaId::from_raw(0), 0);
        let init = trees.synth(TreeData::IntLit { value: 5 });
        let decl = trees.synth(TreeData::VarDecl {
            ident: v,
            ty: int_ty,
            init: Some(init),
        });

        let read_v = trees.synth(TreeData::Ref { ident: v });
        let two = trees.synth(TreeData::IntLit { value: 2 });
        let doubled = trees.synth(TreeData::Binary {
            op: BinaryOp::Mul,
            left: read_v,
            right: two,
        });
        let target = trees.synth(TreeData::Ref { ident: out });
        let assign = trees.synth(TreeData::SignalAssign {
            target,
            value: doubled,
            delay: None,
        });
        let one_fs = trees_lit(&mut trees, 1);
        let wait = trees.synth(TreeData::Wait {
            on: vec![],
            until: None,
            timeout: Some(one_fs),
        });

        let lowered = lower_process(
            &trees,
            &interner,
            &env,
            interner.intern("p"),
            &[],
            &[decl],
            &[assign, wait],
        )
        .unwrap();

        let mut frame = Frame::new(&lowered.unit);
        let mut signals = TestSignals {
            values: vec![Value::Int(0)],
            driven: Vec::new(),
        };
        Interpreter::new()
            .execute(&lowered.unit, &mut frame, &mut signals)
            .unwrap();
        assert_eq!(signals.driven, vec![(0, Value::Int(10), 0)]);
    }

    fn trees_lit(trees: &mut TreeStore, value: i64) -> TreeRef {
        trees.synth(TreeData::IntLit { value })
    }

    #[test]
    fn unknown_signal_in_sensitivity_errors() {
        let (trees, interner, env) = setup();
        let result = lower_process(
            &trees,
            &interner,
            &env,
            interner.intern("p"),
            &[interner.intern("ghost")],
            &[],
            &[],
        );
        assert!(matches!(result, Err(ElabError::UnresolvedName { .. })));
    }

    #[test]
    fn wait_until_is_unsupported() {
        let (mut trees, interner, env) = setup();
        let t = trees.synth(TreeData::IntLit { value: 1 });
        let wait = trees.synth(TreeData::Wait {
            on: vec![],
            until: Some(t),
            timeout: None,
        });
        let result = lower_process(
            &trees,
            &interner,
            &env,
            interner.intern("p"),
            &[],
            &[],
            &[wait],
        );
        assert!(matches!(result, Err(ElabError::Unsupported { .. })));
    }
}
