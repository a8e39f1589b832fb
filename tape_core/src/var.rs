//! Operator overloading on top of the recorder functions.
//!
//! A [`Var`] pairs a [`Value`] with the recorder it was produced on, so that
//! expressions can be written with `+`, `-`, `*`, `/` and method calls. Every
//! operator forwards to the matching function in [`ops`](crate::ops).
//!
//! ```
//! use tape_core::Tape;
//!
//! let mut tape = Tape::new(64);
//! let x = tape.var(2.0);
//! let y = tape.var(3.0);
//!
//! // z = x * y + sin(x)
//! let z = x * y + x.sin();
//! let (x, y, z) = (x.inner(), y.inner(), z.inner());
//! assert!((z.value() - 6.909297426825682).abs() < 1e-10);
//!
//! // dz/dx = y + cos(x), dz/dy = x
//! let grads = tape.gradient().unwrap();
//! assert!((grads.wrt(x) - 2.5838531634528574).abs() < 1e-10);
//! assert!((grads.wrt(y) - 2.0).abs() < 1e-10);
//! ```

use std::fmt;

use crate::alloc::SlotAllocator;
use crate::entry::{Value, VarId};
use crate::ops::{self, Operand};
use crate::recorder::Recorder;
use crate::tape::Tape;

macro_rules! unary_methods {
    ($($name:ident),* $(,)?) => {
        $(
            pub fn $name(self) -> Self {
                self.wrap(ops::$name(self.tape, self.inner))
            }
        )*
    };
}

/// A value bound to the recorder that produced it.
pub struct Var<'t, R: Recorder + ?Sized> {
    tape: &'t R,
    inner: Value,
}

impl<'t, R: Recorder + ?Sized> Var<'t, R> {
    /// Bind an existing value to `tape`.
    pub fn new(tape: &'t R, inner: Value) -> Self {
        Var { tape, inner }
    }

    /// Bind a constant (untracked) value to `tape`.
    pub fn constant(tape: &'t R, value: f64) -> Self {
        Var::new(tape, Value::constant(value))
    }

    /// The underlying value, detached from the recorder.
    pub fn inner(&self) -> Value {
        self.inner
    }

    pub fn value(&self) -> f64 {
        self.inner.value()
    }

    pub fn id(&self) -> VarId {
        self.inner.id()
    }

    fn wrap(&self, inner: Value) -> Self {
        Var::new(self.tape, inner)
    }

    /// self^exponent, where the exponent may itself be tracked.
    pub fn pow(self, exponent: impl Into<Operand>) -> Self {
        self.wrap(ops::pow(self.tape, self.inner, exponent))
    }

    /// self^c for a constant c.
    pub fn powf(self, c: f64) -> Self {
        self.pow(c)
    }

    unary_methods!(
        square, sin, cos, tan, asin, acos, atan, sinh, cosh, tanh, exp, log, log10, sqrt
    );
}

impl<R: Recorder + ?Sized> Clone for Var<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: Recorder + ?Sized> Copy for Var<'_, R> {}

impl<R: Recorder + ?Sized> fmt::Debug for Var<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Var")
            .field("value", &self.inner.value())
            .field("id", &self.inner.id())
            .finish()
    }
}

impl<R: Recorder + ?Sized> From<Var<'_, R>> for Operand {
    fn from(v: Var<'_, R>) -> Self {
        Operand::from(v.inner)
    }
}

impl<R: Recorder + ?Sized> From<Var<'_, R>> for Value {
    fn from(v: Var<'_, R>) -> Self {
        v.inner
    }
}

// === Operator overloads ===

macro_rules! binary_op {
    ($trait:ident, $method:ident) => {
        impl<'t, R: Recorder + ?Sized> std::ops::$trait for Var<'t, R> {
            type Output = Var<'t, R>;

            fn $method(self, rhs: Var<'t, R>) -> Var<'t, R> {
                self.wrap(ops::$method(self.tape, self.inner, rhs.inner))
            }
        }

        impl<'t, R: Recorder + ?Sized> std::ops::$trait<f64> for Var<'t, R> {
            type Output = Var<'t, R>;

            fn $method(self, rhs: f64) -> Var<'t, R> {
                self.wrap(ops::$method(self.tape, self.inner, rhs))
            }
        }

        impl<'t, R: Recorder + ?Sized> std::ops::$trait<Var<'t, R>> for f64 {
            type Output = Var<'t, R>;

            fn $method(self, rhs: Var<'t, R>) -> Var<'t, R> {
                rhs.wrap(ops::$method(rhs.tape, self, rhs.inner))
            }
        }
    };
}

binary_op!(Add, add);
binary_op!(Sub, sub);
binary_op!(Mul, mul);
binary_op!(Div, div);

impl<'t, R: Recorder + ?Sized> std::ops::Neg for Var<'t, R> {
    type Output = Var<'t, R>;

    fn neg(self) -> Var<'t, R> {
        self.wrap(ops::neg(self.tape, self.inner))
    }
}

/// `a += b` records an accumulate entry that keeps `a`'s id.
impl<'t, R: Recorder + ?Sized> std::ops::AddAssign for Var<'t, R> {
    fn add_assign(&mut self, rhs: Var<'t, R>) {
        ops::accumulate(self.tape, &mut self.inner, rhs.inner);
    }
}

impl<R: Recorder + ?Sized> std::ops::AddAssign<f64> for Var<'_, R> {
    fn add_assign(&mut self, rhs: f64) {
        ops::accumulate(self.tape, &mut self.inner, rhs);
    }
}

impl<A: SlotAllocator> Tape<A> {
    /// Register an independent variable and bind it to this tape.
    pub fn var(&self, value: f64) -> Var<'_, Self> {
        Var::new(self, self.variable(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polynomial() {
        // f(x, y) = x^2 * y + y^3 at (2, 3)
        // df/dx = 2xy = 12, df/dy = x^2 + 3y^2 = 31
        let mut tape = Tape::new(32);
        let x = tape.var(2.0);
        let y = tape.var(3.0);
        let f = x.powf(2.0) * y + y.powf(3.0);
        let (x, y, f) = (x.inner(), y.inner(), f.inner());

        assert!((f.value() - 39.0).abs() < 1e-10);
        let g = tape.gradient().unwrap();
        assert!((g.wrt(x) - 12.0).abs() < 1e-10);
        assert!((g.wrt(y) - 31.0).abs() < 1e-10);
    }

    #[test]
    fn test_scalar_on_either_side() {
        // f(x) = (1 - x) / 2 + 3 / x at x = 1.5
        // df/dx = -0.5 - 3/x^2
        let mut tape = Tape::new(32);
        let x = tape.var(1.5);
        let f = (1.0 - x) / 2.0 + 3.0 / x;
        assert!((f.value() - 1.75).abs() < 1e-12);
        let x = x.inner();

        let g = tape.gradient().unwrap();
        assert!((g.wrt(x) - (-0.5 - 3.0 / 2.25)).abs() < 1e-10);
    }

    #[test]
    fn test_neg_and_unary_chain() {
        // f(x) = -exp(sin(x)), df/dx = -cos(x) exp(sin(x))
        let mut tape = Tape::new(16);
        let x = tape.var(0.3);
        let f = -x.sin().exp();
        let x = x.inner();
        assert!((f.value() + 0.3_f64.sin().exp()).abs() < 1e-12);

        let g = tape.gradient().unwrap();
        let expected = -0.3_f64.cos() * 0.3_f64.sin().exp();
        assert!((g.wrt(x) - expected).abs() < 1e-10);
    }

    #[test]
    fn test_add_assign_accumulates() {
        // s = sum of x_i^2, ds/dx_i = 2 x_i
        let mut tape = Tape::new(32);
        let xs: Vec<_> = [1.0, -2.0, 0.5].iter().map(|&v| tape.var(v)).collect();
        let mut s = Var::constant(&tape, 0.0);
        for x in &xs {
            s += x.square();
        }
        s += 10.0;
        let xs: Vec<Value> = xs.iter().map(Var::inner).collect();
        assert!((s.value() - 15.25).abs() < 1e-12);

        let g = tape.gradient().unwrap();
        assert_eq!(g.wrt_many(&xs), vec![2.0, -4.0, 1.0]);
    }

    #[test]
    fn test_var_as_operand() {
        let tape = Tape::new(8);
        let x = tape.var(4.0);
        let y = ops::mul(&tape, x, x);
        assert_eq!(y.value(), 16.0);
        assert!(y.is_tracked());
    }
}
