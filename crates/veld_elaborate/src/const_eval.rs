//! Compile-time evaluation of locally static expressions.

use std::collections::HashMap;

use veld_common::{Ident, Interner};
use veld_ir::Value;
use veld_tree::{BinaryOp, TreeData, TreeRef, TreeStore, UnaryOp};

use crate::error::ElabError;

/// Evaluates a locally static expression.
///
/// `env` supplies the values of generics and constants in scope. Anything
/// that reads a signal or variable is not static and reports
/// [`ElabError::Unsupported`].
pub fn const_eval(
    trees: &TreeStore,
    interner: &Interner,
    env: &HashMap<Ident, Value>,
    expr: TreeRef,
) -> Result<Value, ElabError> {
    let node = trees.get(expr);
    match &node.data {
        TreeData::IntLit { value } => Ok(Value::Int(*value)),
        TreeData::RealLit { value } => Ok(Value::Real(*value)),
        TreeData::EnumLit { ordinal, .. } => Ok(Value::Int(*ordinal as i64)),
        TreeData::PhysLit { value, .. } => Ok(Value::Int(*value)),
        TreeData::Ref { ident } => env.get(ident).copied().ok_or_else(|| {
            ElabError::UnresolvedName {
                name: interner.resolve(*ident).to_string(),
                loc: node.loc,
            }
        }),
        TreeData::Unary { op, operand } => {
            let v = const_eval(trees, interner, env, *operand)?;
            match (op, v) {
                (UnaryOp::Neg, Value::Int(x)) => Ok(Value::Int(-x)),
                (UnaryOp::Neg, Value::Real(x)) => Ok(Value::Real(-x)),
                (UnaryOp::Abs, Value::Int(x)) => Ok(Value::Int(x.abs())),
                (UnaryOp::Abs, Value::Real(x)) => Ok(Value::Real(x.abs())),
                (UnaryOp::Not, Value::Int(x)) => Ok(Value::Int((x == 0) as i64)),
                (UnaryOp::Not, Value::Real(_)) => Err(ElabError::Unsupported {
                    detail: "logical not of a real value".to_string(),
                    loc: node.loc,
                }),
            }
        }
        TreeData::Binary { op, left, right } => {
            let a = const_eval(trees, interner, env, *left)?;
            let b = const_eval(trees, interner, env, *right)?;
            eval_binary(*op, a, b, node.loc)
        }
        _ => Err(ElabError::Unsupported {
            detail: "expression is not locally static".to_string(),
            loc: node.loc,
        }),
    }
}

fn eval_binary(op: BinaryOp, a: Value, b: Value, loc: veld_source::Loc) -> Result<Value, ElabError> {
    use Value::*;

    let ints = match (a, b) {
        (Int(x), Int(y)) => Some((x, y)),
        _ => None,
    };
    let reals = match (a, b) {
        (Real(x), Real(y)) => Some((x, y)),
        (Int(x), Real(y)) => Some((x as f64, y)),
        (Real(x), Int(y)) => Some((x, y as f64)),
        _ => None,
    };

    let unsupported = || ElabError::Unsupported {
        detail: "operator not valid for static operands".to_string(),
        loc,
    };

    match op {
        BinaryOp::Add => Ok(match ints {
            Some((x, y)) => Int(x.wrapping_add(y)),
            None => Real(reals.ok_or_else(unsupported)?.0 + reals.unwrap().1),
        }),
        BinaryOp::Sub => Ok(match ints {
            Some((x, y)) => Int(x.wrapping_sub(y)),
            None => Real(reals.ok_or_else(unsupported)?.0 - reals.unwrap().1),
        }),
        BinaryOp::Mul => Ok(match ints {
            Some((x, y)) => Int(x.wrapping_mul(y)),
            None => Real(reals.ok_or_else(unsupported)?.0 * reals.unwrap().1),
        }),
        BinaryOp::Div => match ints {
            Some((_, 0)) => Err(ElabError::Unsupported {
                detail: "static division by zero".to_string(),
                loc,
            }),
            Some((x, y)) => Ok(Int(x / y)),
            None => {
                let (x, y) = reals.ok_or_else(unsupported)?;
                Ok(Real(x / y))
            }
        },
        BinaryOp::Mod => match ints {
            Some((_, 0)) => Err(ElabError::Unsupported {
                detail: "static modulus by zero".to_string(),
                loc,
            }),
            Some((x, y)) => {
                let m = x % y;
                Ok(Int(if m != 0 && (m < 0) != (y < 0) { m + y } else { m }))
            }
            None => Err(unsupported()),
        },
        BinaryOp::Rem => match ints {
            Some((_, 0)) => Err(ElabError::Unsupported {
                detail: "static remainder by zero".to_string(),
                loc,
            }),
            Some((x, y)) => Ok(Int(x % y)),
            None => Err(unsupported()),
        },
        BinaryOp::And => ints.map(|(x, y)| Int(x & y)).ok_or_else(unsupported),
        BinaryOp::Or => ints.map(|(x, y)| Int(x | y)).ok_or_else(unsupported),
        BinaryOp::Xor => ints.map(|(x, y)| Int(x ^ y)).ok_or_else(unsupported),
        BinaryOp::Nand => ints
            .map(|(x, y)| Int(((x & y) == 0) as i64))
            .ok_or_else(unsupported),
        BinaryOp::Nor => ints
            .map(|(x, y)| Int(((x | y) == 0) as i64))
            .ok_or_else(unsupported),
        BinaryOp::Eq => cmp(ints, reals, |x, y| x == y, |x, y| x == y, unsupported),
        BinaryOp::Neq => cmp(ints, reals, |x, y| x != y, |x, y| x != y, unsupported),
        BinaryOp::Lt => cmp(ints, reals, |x, y| x < y, |x, y| x < y, unsupported),
        BinaryOp::Le => cmp(ints, reals, |x, y| x <= y, |x, y| x <= y, unsupported),
        BinaryOp::Gt => cmp(ints, reals, |x, y| x > y, |x, y| x > y, unsupported),
        BinaryOp::Ge => cmp(ints, reals, |x, y| x >= y, |x, y| x >= y, unsupported),
    }
}

fn cmp(
    ints: Option<(i64, i64)>,
    reals: Option<(f64, f64)>,
    int: impl Fn(i64, i64) -> bool,
    real: impl Fn(f64, f64) -> bool,
    unsupported: impl Fn() -> ElabError,
) -> Result<Value, ElabError> {
    if let Some((x, y)) = ints {
        Ok(Value::Int(int(x, y) as i64))
    } else if let Some((x, y)) = reals {
        Ok(Value::Int(real(x, y) as i64))
    } else {
        Err(unsupported())
    }
}
