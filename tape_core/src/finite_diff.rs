//! Numerical reference gradients.
//!
//! Evaluate the same objective with constants only (nothing is recorded) and
//! compare [`finite_diff_grad`] against what the reverse pass produced.

/// Central-difference gradient of `f` at `point` with step `eps`.
///
/// ```
/// use tape_core::{finite_diff_grad, ops, Tape};
///
/// // f(x, y) = x * exp(y), evaluated without recording
/// let f = |v: &[f64]| {
///     let tape = Tape::new(1);
///     ops::mul(&tape, v[0], ops::exp(&tape, v[1])).value()
/// };
/// let grads = finite_diff_grad(f, &[3.0, 0.5], 1e-7);
///
/// assert!((grads[0] - 0.5_f64.exp()).abs() < 1e-5);
/// assert!((grads[1] - 3.0 * 0.5_f64.exp()).abs() < 1e-5);
/// ```
pub fn finite_diff_grad<F>(f: F, point: &[f64], eps: f64) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let mut probe = point.to_vec();
    let step = 2.0 * eps;

    (0..point.len())
        .map(|i| {
            probe[i] = point[i] + eps;
            let up = f(&probe);
            probe[i] = point[i] - eps;
            let down = f(&probe);
            probe[i] = point[i];
            (up - down) / step
        })
        .collect()
}

/// Largest `|a - b| / max(1, |b|)` across the two vectors, `reference` being `b`.
///
/// Components below 1 in magnitude are compared absolutely.
pub fn max_relative_error(computed: &[f64], reference: &[f64]) -> f64 {
    assert_eq!(
        computed.len(),
        reference.len(),
        "gradient vectors differ in length"
    );
    computed
        .iter()
        .zip(reference)
        .map(|(a, b)| (a - b).abs() / b.abs().max(1.0))
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ops, Tape, Value};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_matches_reverse_pass() {
        // f(a, b) = a / b + atan(a * b)
        let record = |t: &Tape, a: Value, b: Value| {
            ops::add(t, ops::div(t, a, b), ops::atan(t, ops::mul(t, a, b)))
        };

        let mut tape = Tape::new(8);
        let (a, b) = (tape.variable(0.8), tape.variable(1.7));
        record(&tape, a, b);
        let g = tape.gradient().unwrap().wrt_many(&[a, b]);

        let scratch = Tape::new(1);
        let fd = finite_diff_grad(
            |p: &[f64]| record(&scratch, p[0].into(), p[1].into()).value(),
            &[0.8, 1.7],
            1e-6,
        );
        assert!(max_relative_error(&g, &fd) < 1e-7);
        assert!(scratch.is_empty());
    }

    #[test]
    fn test_random_points_match_reverse_pass() {
        // f(x, y, z) = sqrt(x^2 + y^2 + z^2) * cosh(x - z)
        let record = |t: &Tape, v: &[Value]| {
            let mut r2 = ops::square(t, v[0]);
            ops::accumulate(t, &mut r2, ops::square(t, v[1]));
            ops::accumulate(t, &mut r2, ops::square(t, v[2]));
            ops::mul(t, ops::sqrt(t, r2), ops::cosh(t, ops::sub(t, v[0], v[2])))
        };

        let mut rng = StdRng::seed_from_u64(42);
        let scratch = Tape::new(1);
        for _ in 0..20 {
            let point: Vec<f64> = (0..3).map(|_| rng.gen_range(0.2..1.5)).collect();

            let mut tape = Tape::new(32);
            let vars: Vec<Value> = point.iter().map(|&p| tape.variable(p)).collect();
            record(&tape, &vars);
            let g = tape.gradient().unwrap().wrt_many(&vars);

            let fd = finite_diff_grad(
                |p: &[f64]| {
                    let constants: Vec<Value> = p.iter().map(|&c| Value::constant(c)).collect();
                    record(&scratch, &constants).value()
                },
                &point,
                1e-6,
            );
            assert!(max_relative_error(&g, &fd) < 1e-6, "at {point:?}: tape={g:?}, fd={fd:?}");
        }
    }

    #[test]
    fn test_relative_error_scales_large_components() {
        let computed = [1.0, 2.0, 300.0];
        let reference = [0.9, 2.0, 303.0];
        // 0.1 / 1 beats 3 / 303
        assert!((max_relative_error(&computed, &reference) - 0.1).abs() < 1e-10);
    }

    #[test]
    #[should_panic(expected = "differ in length")]
    fn test_length_mismatch() {
        max_relative_error(&[1.0], &[1.0, 2.0]);
    }
}
