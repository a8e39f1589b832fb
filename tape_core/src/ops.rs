//! Primitive recorders.
//!
//! Every function evaluates its operation forward and, when the recorder is
//! active, writes one entry holding the closed-form local partials with
//! respect to each tracked operand. Operands are anything convertible into
//! [`Operand`]: a [`Value`] or a plain `f64`. Constants (including untracked
//! values) contribute no pair, and an operation whose operands are all
//! constant records nothing.
//!
//! Inputs outside an operation's domain follow IEEE semantics: the value and
//! its partials become NaN or infinite and propagate through the reverse pass.

use std::f64::consts::LN_10;

use bytemuck::Zeroable;

use crate::entry::{Pair, Value, MAX_OPERANDS};
use crate::recorder::Recorder;

/// One input to a primitive recorder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    /// A tracked value; contributes a pair.
    Var(Value),
    /// A constant; contributes no pair.
    Const(f64),
}

impl Operand {
    pub fn value(&self) -> f64 {
        match self {
            Operand::Var(v) => v.value(),
            Operand::Const(c) => *c,
        }
    }

    fn pair(&self, dx: f64) -> Option<Pair> {
        match self {
            Operand::Var(v) => Some(Pair::new(dx, v.id())),
            Operand::Const(_) => None,
        }
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        if v.is_tracked() {
            Operand::Var(v)
        } else {
            Operand::Const(v.value())
        }
    }
}

impl From<f64> for Operand {
    fn from(c: f64) -> Self {
        Operand::Const(c)
    }
}

/// Write an entry for the given pairs, skipping the constant ones.
fn record<R: Recorder + ?Sized>(
    tape: &R,
    value: f64,
    pairs: [Option<Pair>; MAX_OPERANDS],
) -> Value {
    let mut buf = [Pair::zeroed(); MAX_OPERANDS];
    let mut n = 0;
    for pair in pairs.into_iter().flatten() {
        buf[n] = pair;
        n += 1;
    }
    if n == 0 {
        return Value::constant(value);
    }
    Value::new(value, tape.push(&buf[..n]))
}

/// Record `f(x)` with local partial `d(x, f(x))`.
fn unary<R, F, D>(tape: &R, v: Operand, f: F, d: D) -> Value
where
    R: Recorder + ?Sized,
    F: FnOnce(f64) -> f64,
    D: FnOnce(f64, f64) -> f64,
{
    let x = v.value();
    let r = f(x);
    if !tape.is_recording() {
        return Value::constant(r);
    }
    record(tape, r, [v.pair(d(x, r)), None])
}

/// Record `f(x, y)` with local partials `d(x, y, f(x, y))`.
fn binary<R, F, D>(tape: &R, a: Operand, b: Operand, f: F, d: D) -> Value
where
    R: Recorder + ?Sized,
    F: FnOnce(f64, f64) -> f64,
    D: FnOnce(f64, f64, f64) -> (f64, f64),
{
    let (x, y) = (a.value(), b.value());
    let r = f(x, y);
    if !tape.is_recording() {
        return Value::constant(r);
    }
    let (dx, dy) = d(x, y, r);
    record(tape, r, [a.pair(dx), b.pair(dy)])
}

// === Arithmetic ===

/// a + b
pub fn add<R: Recorder + ?Sized>(tape: &R, a: impl Into<Operand>, b: impl Into<Operand>) -> Value {
    binary(tape, a.into(), b.into(), |x, y| x + y, |_, _, _| (1.0, 1.0))
}

/// a - b
pub fn sub<R: Recorder + ?Sized>(tape: &R, a: impl Into<Operand>, b: impl Into<Operand>) -> Value {
    binary(tape, a.into(), b.into(), |x, y| x - y, |_, _, _| (1.0, -1.0))
}

/// a * b
pub fn mul<R: Recorder + ?Sized>(tape: &R, a: impl Into<Operand>, b: impl Into<Operand>) -> Value {
    binary(tape, a.into(), b.into(), |x, y| x * y, |x, y, _| (y, x))
}

/// a / b
pub fn div<R: Recorder + ?Sized>(tape: &R, a: impl Into<Operand>, b: impl Into<Operand>) -> Value {
    binary(
        tape,
        a.into(),
        b.into(),
        |x, y| x / y,
        |_, y, r| {
            let inv = 1.0 / y;
            (inv, -r * inv)
        },
    )
}

/// a^b
pub fn pow<R: Recorder + ?Sized>(tape: &R, a: impl Into<Operand>, b: impl Into<Operand>) -> Value {
    binary(
        tape,
        a.into(),
        b.into(),
        f64::powf,
        |x, y, r| (y * x.powf(y - 1.0), x.ln() * r),
    )
}

/// -v
pub fn neg<R: Recorder + ?Sized>(tape: &R, v: impl Into<Operand>) -> Value {
    unary(tape, v.into(), |x| -x, |_, _| -1.0)
}

/// v * v, recorded as a single entry.
pub fn square<R: Recorder + ?Sized>(tape: &R, v: impl Into<Operand>) -> Value {
    unary(tape, v.into(), |x| x * x, |x, _| 2.0 * x)
}

// === Trigonometric ===

pub fn sin<R: Recorder + ?Sized>(tape: &R, v: impl Into<Operand>) -> Value {
    unary(tape, v.into(), f64::sin, |x, _| x.cos())
}

pub fn cos<R: Recorder + ?Sized>(tape: &R, v: impl Into<Operand>) -> Value {
    unary(tape, v.into(), f64::cos, |x, _| -x.sin())
}

/// tan(v); partial sec²(v).
pub fn tan<R: Recorder + ?Sized>(tape: &R, v: impl Into<Operand>) -> Value {
    unary(tape, v.into(), f64::tan, |x, _| {
        let sec = 1.0 / x.cos();
        sec * sec
    })
}

pub fn asin<R: Recorder + ?Sized>(tape: &R, v: impl Into<Operand>) -> Value {
    unary(tape, v.into(), f64::asin, |x, _| 1.0 / (1.0 - x * x).sqrt())
}

pub fn acos<R: Recorder + ?Sized>(tape: &R, v: impl Into<Operand>) -> Value {
    unary(tape, v.into(), f64::acos, |x, _| -1.0 / (1.0 - x * x).sqrt())
}

pub fn atan<R: Recorder + ?Sized>(tape: &R, v: impl Into<Operand>) -> Value {
    unary(tape, v.into(), f64::atan, |x, _| 1.0 / (1.0 + x * x))
}

// === Hyperbolic ===

pub fn sinh<R: Recorder + ?Sized>(tape: &R, v: impl Into<Operand>) -> Value {
    unary(tape, v.into(), f64::sinh, |x, _| x.cosh())
}

pub fn cosh<R: Recorder + ?Sized>(tape: &R, v: impl Into<Operand>) -> Value {
    unary(tape, v.into(), f64::cosh, |x, _| x.sinh())
}

/// tanh(v); partial sech²(v).
pub fn tanh<R: Recorder + ?Sized>(tape: &R, v: impl Into<Operand>) -> Value {
    unary(tape, v.into(), f64::tanh, |x, _| {
        let sech = 1.0 / x.cosh();
        sech * sech
    })
}

// === Exponential and logarithmic ===

pub fn exp<R: Recorder + ?Sized>(tape: &R, v: impl Into<Operand>) -> Value {
    unary(tape, v.into(), f64::exp, |_, r| r)
}

/// Natural logarithm.
pub fn log<R: Recorder + ?Sized>(tape: &R, v: impl Into<Operand>) -> Value {
    unary(tape, v.into(), f64::ln, |x, _| 1.0 / x)
}

pub fn log10<R: Recorder + ?Sized>(tape: &R, v: impl Into<Operand>) -> Value {
    unary(tape, v.into(), f64::log10, |x, _| 1.0 / (x * LN_10))
}

pub fn sqrt<R: Recorder + ?Sized>(tape: &R, v: impl Into<Operand>) -> Value {
    unary(tape, v.into(), f64::sqrt, |_, r| 0.5 / r)
}

// === In-place accumulation ===

/// target += addend, reusing the target's id.
///
/// The entry written has the target's existing id as its result and pairs
/// `{1.0, target}` and `{1.0, addend}`, so a running sum grows the tape by
/// one entry per term but keeps a single id. An untracked target that
/// receives a tracked addend is given a fresh id first.
pub fn accumulate<R: Recorder + ?Sized>(tape: &R, target: &mut Value, addend: impl Into<Operand>) {
    let addend = addend.into();
    target.set_value(target.value() + addend.value());
    if !tape.is_recording() {
        return;
    }

    if target.is_tracked() {
        let mut buf = [Pair::new(1.0, target.id()); MAX_OPERANDS];
        let n = match addend.pair(1.0) {
            Some(pair) => {
                buf[1] = pair;
                2
            }
            None => 1,
        };
        tape.push_into(target.id(), &buf[..n]);
    } else if let Some(pair) = addend.pair(1.0) {
        target.set_id(tape.push(&[pair]));
    }
}
