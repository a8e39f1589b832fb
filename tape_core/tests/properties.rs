//! Property tests: tape gradients against central finite differences, and
//! invariants of the reverse pass that must hold for any input.

use approx::{abs_diff_eq, relative_eq};
use proptest::prelude::*;
use tape_core::{finite_diff_grad, ops, Tape, Value, ZeroAdjoint, UNTRACKED};

const EPS: f64 = 1e-6;

fn close(tape: f64, fd: f64) -> bool {
    abs_diff_eq!(tape, fd, epsilon = 1e-7) || relative_eq!(tape, fd, max_relative = 1e-6)
}

type Unary = fn(&Tape, Value) -> Value;
type Binary = fn(&Tape, Value, Value) -> Value;

/// Tape gradient and finite-difference gradient of `f` at `point`.
fn both_gradients(f: impl Fn(&Tape, &[Value]) -> Value, point: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut tape = Tape::new(256);
    let inputs: Vec<Value> = point.iter().map(|&v| tape.variable(v)).collect();
    f(&tape, &inputs[..]);
    let grads = tape.gradient().unwrap().wrt_many(&inputs);

    let fd = finite_diff_grad(
        |p: &[f64]| {
            let scratch = Tape::new(1);
            let constants: Vec<Value> = p.iter().map(|&v| Value::constant(v)).collect();
            f(&scratch, &constants[..]).value()
        },
        point,
        EPS,
    );
    (grads, fd)
}

fn unary_case(op: Unary, x: f64) -> (f64, f64) {
    let (g, fd) = both_gradients(|t, v| op(t, v[0]), &[x]);
    (g[0], fd[0])
}

// ============================================================================
// Primitive correctness
// ============================================================================

proptest! {
    #[test]
    fn prop_trig(x in -1.2f64..1.2) {
        let cases: [(&str, Unary); 4] = [
            ("sin", |t, v| ops::sin(t, v)),
            ("cos", |t, v| ops::cos(t, v)),
            ("tan", |t, v| ops::tan(t, v)),
            ("atan", |t, v| ops::atan(t, v)),
        ];
        for (name, op) in cases {
            let (g, fd) = unary_case(op, x);
            prop_assert!(close(g, fd), "{}: tape={}, fd={}", name, g, fd);
        }
    }

    #[test]
    fn prop_inverse_trig(x in -0.9f64..0.9) {
        let cases: [(&str, Unary); 2] = [
            ("asin", |t, v| ops::asin(t, v)),
            ("acos", |t, v| ops::acos(t, v)),
        ];
        for (name, op) in cases {
            let (g, fd) = unary_case(op, x);
            prop_assert!(close(g, fd), "{}: tape={}, fd={}", name, g, fd);
        }
    }

    #[test]
    fn prop_hyperbolic_and_exp(x in -3.0f64..3.0) {
        let cases: [(&str, Unary); 6] = [
            ("sinh", |t, v| ops::sinh(t, v)),
            ("cosh", |t, v| ops::cosh(t, v)),
            ("tanh", |t, v| ops::tanh(t, v)),
            ("exp", |t, v| ops::exp(t, v)),
            ("square", |t, v| ops::square(t, v)),
            ("neg", |t, v| ops::neg(t, v)),
        ];
        for (name, op) in cases {
            let (g, fd) = unary_case(op, x);
            prop_assert!(close(g, fd), "{}: tape={}, fd={}", name, g, fd);
        }
    }

    #[test]
    fn prop_positive_domain(x in 0.1f64..10.0) {
        let cases: [(&str, Unary); 3] = [
            ("log", |t, v| ops::log(t, v)),
            ("log10", |t, v| ops::log10(t, v)),
            ("sqrt", |t, v| ops::sqrt(t, v)),
        ];
        for (name, op) in cases {
            let (g, fd) = unary_case(op, x);
            prop_assert!(close(g, fd), "{}: tape={}, fd={}", name, g, fd);
        }
    }

    #[test]
    fn prop_binary(x in 0.2f64..3.0, y in 0.2f64..3.0) {
        let cases: [(&str, Binary); 5] = [
            ("add", |t, a, b| ops::add(t, a, b)),
            ("sub", |t, a, b| ops::sub(t, a, b)),
            ("mul", |t, a, b| ops::mul(t, a, b)),
            ("div", |t, a, b| ops::div(t, a, b)),
            ("pow", |t, a, b| ops::pow(t, a, b)),
        ];
        for (name, op) in cases {
            let (g, fd) = both_gradients(|t, v| op(t, v[0], v[1]), &[x, y]);
            for i in 0..2 {
                prop_assert!(close(g[i], fd[i]), "{}[{}]: tape={}, fd={}", name, i, g[i], fd[i]);
            }
        }
    }

    #[test]
    fn prop_composite(x in -2.0f64..2.0, y in 0.5f64..2.0) {
        // z = exp(x) * log(y) + sin(x * y), with a running sum on top
        let f = |t: &Tape, v: &[Value]| {
            let a = ops::mul(t, ops::exp(t, v[0]), ops::log(t, v[1]));
            let mut z = ops::sin(t, ops::mul(t, v[0], v[1]));
            ops::accumulate(t, &mut z, a);
            ops::accumulate(t, &mut z, ops::square(t, v[0]));
            z
        };
        let (g, fd) = both_gradients(f, &[x, y]);
        for i in 0..2 {
            prop_assert!(close(g[i], fd[i]), "dz[{}]: tape={}, fd={}", i, g[i], fd[i]);
        }
    }

    // ========================================================================
    // Reverse pass invariants
    // ========================================================================

    #[test]
    fn prop_zero_adjoint_modes_agree(xs in proptest::collection::vec(-2.0f64..2.0, 1..8)) {
        // Half the terms feed the output, half are dead branches
        let mut tape = Tape::new(256);
        let inputs: Vec<Value> = xs.iter().map(|&v| tape.variable(v)).collect();
        let mut sum = Value::constant(0.0);
        for (i, &x) in inputs.iter().enumerate() {
            let t = ops::tanh(&tape, ops::mul(&tape, x, x));
            if i % 2 == 0 {
                ops::accumulate(&tape, &mut sum, t);
            } else {
                ops::cos(&tape, t);
            }
        }
        let out = ops::add(&tape, sum, 1.0);

        let skip = tape.gradient_of(out).unwrap();
        tape.set_zero_adjoint(ZeroAdjoint::Propagate);
        let propagate = tape.gradient_of(out).unwrap();
        prop_assert_eq!(skip, propagate);
    }

    #[test]
    fn prop_disabled_recording(x in -5.0f64..5.0, y in -5.0f64..5.0) {
        let mut tape = Tape::new(16);
        let a = tape.variable(x);
        let b = tape.variable(y);
        tape.set_recording(false);

        let mut z = ops::mul(&tape, ops::sin(&tape, a), b);
        ops::accumulate(&tape, &mut z, a);
        prop_assert_eq!(z.id(), UNTRACKED);
        prop_assert_eq!(z.value(), x.sin() * y + x);
        prop_assert_eq!(tape.len(), 0);

        let grads = tape.gradient().unwrap();
        prop_assert!(grads.as_slice().iter().all(|&g| g == 0.0));
    }

    #[test]
    fn prop_reset_reproduces_entries(x in -1.0f64..1.0, epochs in 1usize..5) {
        let mut tape = Tape::new(32);
        let a = tape.variable(x);
        let base = tape.next_id();

        let mut first = None;
        for _ in 0..epochs {
            let b = ops::atan(&tape, a);
            ops::div(&tape, b, ops::cosh(&tape, a));
            let entries = tape.entries().to_vec();
            let expected = first.get_or_insert_with(|| entries.clone());
            prop_assert_eq!(&*expected, &entries);
            tape.reset(base);
        }
    }
}
