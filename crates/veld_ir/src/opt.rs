//! Constant folding and peephole simplification.
//!
//! Simplifications never add or remove a trap: division-family operations
//! with a constant zero divisor are left for the interpreter to trap on,
//! and assertions are only dropped when their condition folds to true (a
//! form that can never trap).

use crate::unit::{IrUnit, Op, Opcode, Operand, Value};
use std::collections::HashMap;

/// Simplifies a unit in place.
pub fn simplify(unit: &mut IrUnit) {
    for block in &mut unit.blocks {
        simplify_block(&mut block.ops);
        block.ops.retain(|op| !is_dead(op));
    }
}

/// Marker for operations scheduled for removal.
fn is_dead(op: &Op) -> bool {
    matches!(&op.opcode, Opcode::Assert { .. })
        && matches!(op.a, Some(Operand::Imm(v)) if v != 0)
}

fn simplify_block(ops: &mut [Op]) {
    let mut known: HashMap<u32, Operand> = HashMap::new();

    for op in ops.iter_mut() {
        substitute(&mut op.a, &known);
        substitute(&mut op.b, &known);

        match &op.opcode {
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::CmpEq
            | Opcode::CmpNe
            | Opcode::CmpLt
            | Opcode::CmpLe
            | Opcode::CmpGt
            | Opcode::CmpGe => try_fold_binary(op, &mut known),
            Opcode::Div | Opcode::Mod | Opcode::Rem => {
                // A constant zero divisor must keep trapping at runtime.
                if matches!(op.b, Some(Operand::Imm(0))) {
                    invalidate(op, &mut known);
                } else {
                    try_fold_binary(op, &mut known);
                }
            }
            Opcode::Neg | Opcode::Abs | Opcode::Not => try_fold_unary(op, &mut known),
            Opcode::Move => match (op.dst, constant(&op.a)) {
                (Some(dst), Some(_)) => {
                    known.insert(dst.0, op.a.unwrap());
                }
                _ => invalidate(op, &mut known),
            },
            Opcode::Branch { if_true, if_false } => {
                if let Some(value) = constant(&op.a) {
                    let target = if value.is_true() { *if_true } else { *if_false };
                    op.opcode = Opcode::Jump { target };
                    op.a = None;
                }
            }
            _ => invalidate(op, &mut known),
        }
    }
}

fn substitute(operand: &mut Option<Operand>, known: &HashMap<u32, Operand>) {
    if let Some(Operand::Reg(r)) = operand {
        if let Some(replacement) = known.get(&r.0) {
            *operand = Some(*replacement);
        }
    }
}

fn constant(operand: &Option<Operand>) -> Option<Value> {
    match operand {
        Some(Operand::Imm(v)) => Some(Value::Int(*v)),
        Some(Operand::RealImm(v)) => Some(Value::Real(*v)),
        _ => None,
    }
}

fn operand_of(value: Value) -> Operand {
    match value {
        Value::Int(v) => Operand::Imm(v),
        Value::Real(v) => Operand::RealImm(v),
    }
}

fn invalidate(op: &Op, known: &mut HashMap<u32, Operand>) {
    if let Some(dst) = op.dst {
        known.remove(&dst.0);
    }
}

fn try_fold_binary(op: &mut Op, known: &mut HashMap<u32, Operand>) {
    let (Some(a), Some(b)) = (constant(&op.a), constant(&op.b)) else {
        invalidate(op, known);
        return;
    };
    let Some(folded) = eval_binary(&op.opcode, a, b) else {
        invalidate(op, known);
        return;
    };
    let replacement = operand_of(folded);
    op.opcode = Opcode::Move;
    op.a = Some(replacement);
    op.b = None;
    if let Some(dst) = op.dst {
        known.insert(dst.0, replacement);
    }
}

fn try_fold_unary(op: &mut Op, known: &mut HashMap<u32, Operand>) {
    let Some(a) = constant(&op.a) else {
        invalidate(op, known);
        return;
    };
    let folded = match (&op.opcode, a) {
        (Opcode::Neg, Value::Int(x)) => Some(Value::Int(x.wrapping_neg())),
        (Opcode::Neg, Value::Real(x)) => Some(Value::Real(-x)),
        (Opcode::Abs, Value::Int(x)) => Some(Value::Int(x.wrapping_abs())),
        (Opcode::Abs, Value::Real(x)) => Some(Value::Real(x.abs())),
        (Opcode::Not, Value::Int(x)) => Some(Value::Int((x == 0) as i64)),
        _ => None,
    };
    let Some(folded) = folded else {
        invalidate(op, known);
        return;
    };
    let replacement = operand_of(folded);
    op.opcode = Opcode::Move;
    op.a = Some(replacement);
    if let Some(dst) = op.dst {
        known.insert(dst.0, replacement);
    }
}

fn eval_binary(opcode: &Opcode, a: Value, b: Value) -> Option<Value> {
    use Value::*;

    let int_pair = match (a, b) {
        (Int(x), Int(y)) => Some((x, y)),
        _ => None,
    };
    let real_pair = match (a, b) {
        (Real(x), Real(y)) => Some((x, y)),
        (Int(x), Real(y)) => Some((x as f64, y)),
        (Real(x), Int(y)) => Some((x, y as f64)),
        _ => None,
    };

    match opcode {
        Opcode::Add => Some(match int_pair {
            Some((x, y)) => Int(x.wrapping_add(y)),
            None => Real(real_pair?.0 + real_pair?.1),
        }),
        Opcode::Sub => Some(match int_pair {
            Some((x, y)) => Int(x.wrapping_sub(y)),
            None => Real(real_pair?.0 - real_pair?.1),
        }),
        Opcode::Mul => Some(match int_pair {
            Some((x, y)) => Int(x.wrapping_mul(y)),
            None => Real(real_pair?.0 * real_pair?.1),
        }),
        Opcode::Div => match int_pair {
            Some((_, 0)) => None,
            Some((x, y)) => Some(Int(x.wrapping_div(y))),
            None => Some(Real(real_pair?.0 / real_pair?.1)),
        },
        Opcode::Mod => match int_pair {
            Some((_, 0)) => None,
            Some((x, y)) => {
                let m = x.wrapping_rem(y);
                let m = if m != 0 && (m < 0) != (y < 0) { m + y } else { m };
                Some(Int(m))
            }
            None => None,
        },
        Opcode::Rem => match int_pair {
            Some((_, 0)) => None,
            Some((x, y)) => Some(Int(x.wrapping_rem(y))),
            None => None,
        },
        Opcode::And => int_pair.map(|(x, y)| Int(x & y)),
        Opcode::Or => int_pair.map(|(x, y)| Int(x | y)),
        Opcode::Xor => int_pair.map(|(x, y)| Int(x ^ y)),
        Opcode::CmpEq => cmp(int_pair, real_pair, |x, y| x == y, |x, y| x == y),
        Opcode::CmpNe => cmp(int_pair, real_pair, |x, y| x != y, |x, y| x != y),
        Opcode::CmpLt => cmp(int_pair, real_pair, |x, y| x < y, |x, y| x < y),
        Opcode::CmpLe => cmp(int_pair, real_pair, |x, y| x <= y, |x, y| x <= y),
        Opcode::CmpGt => cmp(int_pair, real_pair, |x, y| x > y, |x, y| x > y),
        Opcode::CmpGe => cmp(int_pair, real_pair, |x, y| x >= y, |x, y| x >= y),
        _ => None,
    }
}

fn cmp(
    int_pair: Option<(i64, i64)>,
    real_pair: Option<(f64, f64)>,
    int: impl Fn(i64, i64) -> bool,
    real: impl Fn(f64, f64) -> bool,
) -> Option<Value> {
    if let Some((x, y)) = int_pair {
        Some(Value::Int(int(x, y) as i64))
    } else {
        real_pair.map(|(x, y)| Value::Int(real(x, y) as i64))
    }
}
