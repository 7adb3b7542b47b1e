//! The IR interpreter: the reference execution backend.

use crate::unit::{BlockId, IrUnit, Op, Opcode, Operand, Value};
use veld_source::Loc;

/// Default operation budget per resume, guarding against runaway loops
/// between suspension points.
const DEFAULT_FUEL: u64 = 10_000_000;

/// Severity ordinal at which a failed assertion becomes fatal.
const SEVERITY_ERROR: i64 = 2;

/// Errors indicating malformed IR, not user-visible failures.
#[derive(Debug, thiserror::Error)]
pub enum IrError {
    /// An operand slot required by the opcode was empty.
    #[error("missing operand for {opcode}")]
    MissingOperand {
        /// Name of the offending opcode.
        opcode: &'static str,
    },

    /// A jump or branch targeted a nonexistent block.
    #[error("jump to unknown block {0}")]
    UnknownBlock(u32),

    /// A real value arrived where an integer was required.
    #[error("type mismatch: expected integer")]
    ExpectedInteger,

    /// The operation budget was exhausted without reaching a suspension
    /// point.
    #[error("operation budget exhausted; runaway loop between waits")]
    FuelExhausted,
}

/// Why execution stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The unit returned, possibly with a value.
    Done(Option<Value>),
    /// The unit suspended at a `wait`.
    Wait {
        /// Process-local indices of signals to wake on.
        sensitivity: Vec<u32>,
        /// Timeout in femtoseconds, if any.
        timeout: Option<u64>,
    },
    /// A fatal trap: failed assertion, division by zero, or explicit trap.
    Trap {
        /// Diagnostic message.
        message: String,
        /// Source location of the trapping operation.
        loc: Loc,
    },
}

/// Register and local state of one activation, surviving across waits.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Register file.
    pub regs: Vec<Value>,
    /// Local slots; arguments arrive in the first slots.
    pub locals: Vec<Value>,
    /// Non-fatal assertion reports collected during execution.
    pub output: Vec<String>,
    resume: Option<(BlockId, usize)>,
}

impl Frame {
    /// Creates a frame for `unit` with zeroed registers and locals.
    pub fn new(unit: &IrUnit) -> Self {
        Self {
            regs: vec![Value::Int(0); unit.nregs as usize],
            locals: vec![Value::Int(0); unit.nlocals as usize],
            output: Vec::new(),
            resume: None,
        }
    }

    /// Creates a frame with arguments in the leading local slots.
    pub fn with_args(unit: &IrUnit, args: &[Value]) -> Self {
        let mut frame = Self::new(unit);
        for (slot, arg) in args.iter().enumerate() {
            frame.locals[slot] = *arg;
        }
        frame
    }

    /// Returns `true` if the frame is suspended at a wait.
    pub fn is_suspended(&self) -> bool {
        self.resume.is_some()
    }
}

/// Access to the signals a unit may read and drive.
///
/// Indices are process-local; the kernel maps them to its flat signal
/// space per process.
pub trait SignalAccess {
    /// Reads the current value of a signal.
    fn read(&self, signal: u32) -> Value;

    /// Schedules a drive of `value` onto a signal after `after_fs`
    /// femtoseconds (zero means the next delta cycle).
    fn drive(&mut self, signal: u32, value: Value, after_fs: u64);
}

/// Signal access for pure functions.
///
/// # Panics
///
/// Panics on any access; function bodies never touch signals.
pub struct NoSignals;

impl SignalAccess for NoSignals {
    fn read(&self, signal: u32) -> Value {
        panic!("signal {signal} read in a pure function")
    }

    fn drive(&mut self, signal: u32, _value: Value, _after_fs: u64) {
        panic!("signal {signal} driven in a pure function")
    }
}

/// An execution backend for IR units.
///
/// The [`Interpreter`] is always present and defines reference semantics;
/// any other backend must produce observably identical results for all IR
/// programs.
pub trait Backend {
    /// Runs `unit` in `frame` until it returns, suspends, or traps.
    fn execute(
        &self,
        unit: &IrUnit,
        frame: &mut Frame,
        signals: &mut dyn SignalAccess,
    ) -> Result<StepOutcome, IrError>;
}

/// The reference interpreter.
pub struct Interpreter {
    fuel: u64,
}

impl Interpreter {
    /// Creates an interpreter with the default operation budget.
    pub fn new() -> Self {
        Self { fuel: DEFAULT_FUEL }
    }

    /// Creates an interpreter with a custom operation budget per resume.
    pub fn with_fuel(fuel: u64) -> Self {
        Self { fuel }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for Interpreter {
    fn execute(
        &self,
        unit: &IrUnit,
        frame: &mut Frame,
        signals: &mut dyn SignalAccess,
    ) -> Result<StepOutcome, IrError> {
        let (mut block, mut pos) = frame.resume.take().unwrap_or((BlockId(0), 0));
        let mut fuel = self.fuel;

        loop {
            let ops = &unit
                .blocks
                .get(block.0 as usize)
                .ok_or(IrError::UnknownBlock(block.0))?
                .ops;

            let Some(op) = ops.get(pos) else {
                // Falling off a block ends the activation.
                return Ok(StepOutcome::Done(None));
            };
            pos += 1;

            if fuel == 0 {
                return Err(IrError::FuelExhausted);
            }
            fuel -= 1;

            match exec_op(op, frame, signals)? {
                Control::Next => {}
                Control::Goto(target) => {
                    if target.0 as usize >= unit.blocks.len() {
                        return Err(IrError::UnknownBlock(target.0));
                    }
                    block = target;
                    pos = 0;
                }
                Control::Stop(outcome) => {
                    if matches!(outcome, StepOutcome::Wait { .. }) {
                        frame.resume = Some((block, pos));
                    }
                    return Ok(outcome);
                }
            }
        }
    }
}

enum Control {
    Next,
    Goto(BlockId),
    Stop(StepOutcome),
}

fn operand(frame: &Frame, op: &Option<Operand>, opcode: &'static str) -> Result<Value, IrError> {
    match op {
        Some(Operand::Reg(r)) => Ok(frame.regs[r.0 as usize]),
        Some(Operand::Imm(v)) => Ok(Value::Int(*v)),
        Some(Operand::RealImm(v)) => Ok(Value::Real(*v)),
        None => Err(IrError::MissingOperand { opcode }),
    }
}

fn set_dst(frame: &mut Frame, op: &Op, value: Value) {
    if let Some(dst) = op.dst {
        frame.regs[dst.0 as usize] = value;
    }
}

fn numeric(a: Value, b: Value, int: impl Fn(i64, i64) -> i64, real: impl Fn(f64, f64) -> f64) -> Value {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Value::Int(int(x, y)),
        (Value::Real(x), Value::Real(y)) => Value::Real(real(x, y)),
        (Value::Int(x), Value::Real(y)) => Value::Real(real(x as f64, y)),
        (Value::Real(x), Value::Int(y)) => Value::Real(real(x, y as f64)),
    }
}

fn compare(a: Value, b: Value, int: impl Fn(i64, i64) -> bool, real: impl Fn(f64, f64) -> bool) -> Value {
    let result = match (a, b) {
        (Value::Int(x), Value::Int(y)) => int(x, y),
        (Value::Real(x), Value::Real(y)) => real(x, y),
        (Value::Int(x), Value::Real(y)) => real(x as f64, y),
        (Value::Real(x), Value::Int(y)) => real(x, y as f64),
    };
    Value::Int(result as i64)
}

fn exec_op(
    op: &Op,
    frame: &mut Frame,
    signals: &mut dyn SignalAccess,
) -> Result<Control, IrError> {
    let trap = |message: String| {
        Ok(Control::Stop(StepOutcome::Trap {
            message,
            loc: op.loc,
        }))
    };

    match &op.opcode {
        Opcode::Move => {
            let a = operand(frame, &op.a, "move")?;
            set_dst(frame, op, a);
        }
        Opcode::Add => {
            let a = operand(frame, &op.a, "add")?;
            let b = operand(frame, &op.b, "add")?;
            set_dst(frame, op, numeric(a, b, i64::wrapping_add, |x, y| x + y));
        }
        Opcode::Sub => {
            let a = operand(frame, &op.a, "sub")?;
            let b = operand(frame, &op.b, "sub")?;
            set_dst(frame, op, numeric(a, b, i64::wrapping_sub, |x, y| x - y));
        }
        Opcode::Mul => {
            let a = operand(frame, &op.a, "mul")?;
            let b = operand(frame, &op.b, "mul")?;
            set_dst(frame, op, numeric(a, b, i64::wrapping_mul, |x, y| x * y));
        }
        Opcode::Div => {
            let a = operand(frame, &op.a, "div")?;
            let b = operand(frame, &op.b, "div")?;
            if matches!(b, Value::Int(0)) {
                return trap("division by zero".to_string());
            }
            set_dst(frame, op, numeric(a, b, i64::wrapping_div, |x, y| x / y));
        }
        Opcode::Mod => {
            let a = operand(frame, &op.a, "mod")?;
            let b = operand(frame, &op.b, "mod")?;
            match (a, b) {
                (_, Value::Int(0)) => return trap("modulus by zero".to_string()),
                (Value::Int(x), Value::Int(y)) => {
                    // Result takes the sign of the divisor.
                    let m = x.wrapping_rem(y);
                    let m = if m != 0 && (m < 0) != (y < 0) { m + y } else { m };
                    set_dst(frame, op, Value::Int(m));
                }
                _ => return Err(IrError::ExpectedInteger),
            }
        }
        Opcode::Rem => {
            let a = operand(frame, &op.a, "rem")?;
            let b = operand(frame, &op.b, "rem")?;
            match (a, b) {
                (_, Value::Int(0)) => return trap("remainder by zero".to_string()),
                (Value::Int(x), Value::Int(y)) => set_dst(frame, op, Value::Int(x.wrapping_rem(y))),
                _ => return Err(IrError::ExpectedInteger),
            }
        }
        Opcode::Neg => {
            let a = operand(frame, &op.a, "neg")?;
            let value = match a {
                Value::Int(x) => Value::Int(x.wrapping_neg()),
                Value::Real(x) => Value::Real(-x),
            };
            set_dst(frame, op, value);
        }
        Opcode::Abs => {
            let a = operand(frame, &op.a, "abs")?;
            let value = match a {
                Value::Int(x) => Value::Int(x.wrapping_abs()),
                Value::Real(x) => Value::Real(x.abs()),
            };
            set_dst(frame, op, value);
        }
        Opcode::And => {
            let a = int_operand(frame, &op.a, "and")?;
            let b = int_operand(frame, &op.b, "and")?;
            set_dst(frame, op, Value::Int(a & b));
        }
        Opcode::Or => {
            let a = int_operand(frame, &op.a, "or")?;
            let b = int_operand(frame, &op.b, "or")?;
            set_dst(frame, op, Value::Int(a | b));
        }
        Opcode::Xor => {
            let a = int_operand(frame, &op.a, "xor")?;
            let b = int_operand(frame, &op.b, "xor")?;
            set_dst(frame, op, Value::Int(a ^ b));
        }
        Opcode::Not => {
            let a = int_operand(frame, &op.a, "not")?;
            set_dst(frame, op, Value::Int((a == 0) as i64));
        }
        Opcode::CmpEq => {
            let a = operand(frame, &op.a, "cmp")?;
            let b = operand(frame, &op.b, "cmp")?;
            set_dst(frame, op, compare(a, b, |x, y| x == y, |x, y| x == y));
        }
        Opcode::CmpNe => {
            let a = operand(frame, &op.a, "cmp")?;
            let b = operand(frame, &op.b, "cmp")?;
            set_dst(frame, op, compare(a, b, |x, y| x != y, |x, y| x != y));
        }
        Opcode::CmpLt => {
            let a = operand(frame, &op.a, "cmp")?;
            let b = operand(frame, &op.b, "cmp")?;
            set_dst(frame, op, compare(a, b, |x, y| x < y, |x, y| x < y));
        }
        Opcode::CmpLe => {
            let a = operand(frame, &op.a, "cmp")?;
            let b = operand(frame, &op.b, "cmp")?;
            set_dst(frame, op, compare(a, b, |x, y| x <= y, |x, y| x <= y));
        }
        Opcode::CmpGt => {
            let a = operand(frame, &op.a, "cmp")?;
            let b = operand(frame, &op.b, "cmp")?;
            set_dst(frame, op, compare(a, b, |x, y| x > y, |x, y| x > y));
        }
        Opcode::CmpGe => {
            let a = operand(frame, &op.a, "cmp")?;
            let b = operand(frame, &op.b, "cmp")?;
            set_dst(frame, op, compare(a, b, |x, y| x >= y, |x, y| x >= y));
        }
        Opcode::Load { slot } => {
            let value = frame.locals[*slot as usize];
            set_dst(frame, op, value);
        }
        Opcode::Store { slot } => {
            let a = operand(frame, &op.a, "store")?;
            frame.locals[*slot as usize] = a;
        }
        Opcode::SignalRead { signal } => {
            let value = signals.read(*signal);
            set_dst(frame, op, value);
        }
        Opcode::SignalDrive { signal } => {
            let value = operand(frame, &op.a, "drive")?;
            let after = match &op.b {
                Some(_) => {
                    let delay = operand(frame, &op.b, "drive")?;
                    delay.as_int().ok_or(IrError::ExpectedInteger)?.max(0) as u64
                }
                None => 0,
            };
            signals.drive(*signal, value, after);
        }
        Opcode::Wait {
            sensitivity,
            has_timeout,
        } => {
            let timeout = if *has_timeout {
                let t = operand(frame, &op.a, "wait")?;
                Some(t.as_int().ok_or(IrError::ExpectedInteger)?.max(0) as u64)
            } else {
                None
            };
            return Ok(Control::Stop(StepOutcome::Wait {
                sensitivity: sensitivity.clone(),
                timeout,
            }));
        }
        Opcode::Jump { target } => return Ok(Control::Goto(*target)),
        Opcode::Branch { if_true, if_false } => {
            let cond = operand(frame, &op.a, "branch")?;
            let target = if cond.is_true() { *if_true } else { *if_false };
            return Ok(Control::Goto(target));
        }
        Opcode::Return => {
            let value = match &op.a {
                Some(_) => Some(operand(frame, &op.a, "return")?),
                None => None,
            };
            return Ok(Control::Stop(StepOutcome::Done(value)));
        }
        Opcode::Assert { message } => {
            let cond = operand(frame, &op.a, "assert")?;
            if !cond.is_true() {
                let severity = match &op.b {
                    Some(_) => operand(frame, &op.b, "assert")?.as_int().unwrap_or(SEVERITY_ERROR),
                    None => SEVERITY_ERROR,
                };
                let text = message
                    .clone()
                    .unwrap_or_else(|| "assertion failed".to_string());
                if severity >= SEVERITY_ERROR {
                    return trap(text);
                }
                frame.output.push(text);
            }
        }
        Opcode::Trap { message } => return trap(message.clone()),
    }

    Ok(Control::Next)
}

fn int_operand(frame: &Frame, op: &Option<Operand>, opcode: &'static str) -> Result<i64, IrError> {
    operand(frame, op, opcode)?
        .as_int()
        .ok_or(IrError::ExpectedInteger)
}
