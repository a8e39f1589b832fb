//! The two demo programs.

use std::time::Instant;

use anyhow::{ensure, Context, Result};
use rand::{Rng, SeedableRng};
use tape_core::{finite_diff_grad, max_relative_error, ops, Recorder, SlotAllocator, Tape, Value};
use tape_lanes::LaneBackend;

use crate::args::{MatmulArgs, RegressionArgs};
use crate::lanes::LaneTape;

const FD_EPS: f64 = 1e-7;
const TOLERANCE: f64 = 1e-5;

// === Regression ===

/// (m * x + q - y)^2
fn squared_residual<R: Recorder + ?Sized>(t: &R, m: Value, q: Value, x: f64, y: f64) -> Value {
    let r = ops::sub(t, ops::add(t, ops::mul(t, m, x), q), y);
    ops::mul(t, r, r)
}

/// log(sum_i (m x_i + q - y_i)^2) without recording anything.
fn regression_objective(m: f64, q: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let scratch = Tape::new(1);
    let (m, q) = (Value::constant(m), Value::constant(q));
    let mut sum = Value::constant(0.0);
    for (&x, &y) in xs.iter().zip(ys) {
        ops::accumulate(&scratch, &mut sum, squared_residual(&scratch, m, q, x, y));
    }
    ops::log(&scratch, sum).value()
}

pub fn regression<A, B>(tape: &mut Tape<A>, backend: &B, args: &RegressionArgs) -> Result<()>
where
    A: SlotAllocator,
    Tape<A>: LaneTape,
    B: LaneBackend,
{
    ensure!(args.points > 0, "regression needs at least one data point");

    let xs: Vec<f64> = (0..args.points).map(|i| i as f64).collect();
    let ys: Vec<f64> = xs.iter().map(|x| args.slope * x + args.intercept).collect();

    // Start slightly off the generating line
    let mut m = tape.variable(4.19);
    let mut q = tape.variable(3.21);
    let base = tape.next_id();

    println!("=== Line Fit: f = log(sum (m*x + q - y)^2) ===\n");
    println!(
        "{} points, {} lanes on {} backend ({}), {} recording\n",
        args.points,
        backend.parallelism(),
        backend.name(),
        tape.path(),
        tape.strategy()
    );

    let mut checked = false;
    for epoch in 0..args.epochs {
        let recording = epoch % 2 == 0;
        tape.set_recording(recording);

        let started = Instant::now();
        let residuals = tape
            .record_lanes(backend, args.points, |t, lane| {
                squared_residual(t, m, q, xs[lane], ys[lane])
            })
            .with_context(|| format!("recording lanes in epoch {epoch}"))?;
        let lane_time = started.elapsed();

        let mut sum = Value::constant(0.0);
        for r in residuals {
            ops::accumulate(&*tape, &mut sum, r);
        }
        let f = ops::log(&*tape, sum);
        let grads = tape
            .gradient()
            .with_context(|| format!("reverse pass in epoch {epoch}"))?;

        println!(
            "epoch {epoch} (recording {}): {} entries, next id {}, lanes {:.3} ms",
            if recording { "on" } else { "off" },
            tape.len(),
            tape.next_id(),
            lane_time.as_secs_f64() * 1e3
        );
        println!("  f     = {:.10}", f.value());
        println!("  m     = {:.10}, df/dm = {:.10}", m.value(), grads.wrt(m));
        println!("  q     = {:.10}, df/dq = {:.10}", q.value(), grads.wrt(q));

        if recording && !checked {
            let fd = finite_diff_grad(
                |p: &[f64]| regression_objective(p[0], p[1], &xs, &ys),
                &[m.value(), q.value()],
                FD_EPS,
            );
            let err = max_relative_error(&grads.wrt_many(&[m, q]), &fd);
            println!("  finite differences: df/dm = {:.10}, df/dq = {:.10}", fd[0], fd[1]);
            report(err)?;
            checked = true;
        }

        // Nudge the parameters and rewind, keeping their ids
        m = m.with_value(m.value() + 1e-8);
        q = q.with_value(q.value() + 1e-8);
        tape.reset(base);
    }
    Ok(())
}

// === Matrix product ===

pub fn matmul<A, B>(tape: &mut Tape<A>, backend: &B, args: &MatmulArgs) -> Result<()>
where
    A: SlotAllocator,
    Tape<A>: LaneTape,
    B: LaneBackend,
{
    let n = args.size;
    ensure!(n > 0, "matrix size must be positive");

    let mut rng = rand::rngs::StdRng::seed_from_u64(args.seed);
    let a: Vec<Value> = (0..n * n).map(|_| tape.variable(rng.gen::<f64>())).collect();
    let b: Vec<Value> = (0..n * n).map(|_| tape.variable(rng.gen::<f64>())).collect();
    let base = tape.next_id();

    println!("=== Matrix Product: C = A * B, objective sum(C) ===\n");
    println!(
        "{n}x{n} matrices, {} lanes on {} backend ({})\n",
        backend.parallelism(),
        backend.name(),
        tape.path()
    );

    for epoch in 0..args.epochs {
        let started = Instant::now();
        // Lane (row, col) owns C[row][col]
        let c = tape
            .record_lanes(backend, n * n, |t, lane| {
                let (row, col) = (lane / n, lane % n);
                let mut value = Value::constant(0.0);
                for k in 0..n {
                    ops::accumulate(t, &mut value, ops::mul(t, a[row * n + k], b[k * n + col]));
                }
                value
            })
            .with_context(|| format!("recording lanes in epoch {epoch}"))?;
        let lane_time = started.elapsed();

        let mut total = Value::constant(0.0);
        for v in &c {
            ops::accumulate(&*tape, &mut total, *v);
        }

        let started = Instant::now();
        let grads = tape
            .gradient()
            .with_context(|| format!("reverse pass in epoch {epoch}"))?;
        let sweep_time = started.elapsed();

        println!(
            "epoch {epoch}: {} entries, lanes {:.3} ms, reverse pass {:.3} ms, sum(C) = {:.6}",
            tape.len(),
            lane_time.as_secs_f64() * 1e3,
            sweep_time.as_secs_f64() * 1e3,
            total.value()
        );

        if epoch == 0 {
            // d sum(C) / dA[i][k] = sum_j B[k][j], d sum(C) / dB[k][j] = sum_i A[i][k]
            let spots = [(0, 0), (n - 1, n / 2), (n / 2, n - 1)];
            let mut err: f64 = 0.0;
            for &(i, k) in &spots {
                let expect_a: f64 = (0..n).map(|j| b[k * n + j].value()).sum();
                let expect_b: f64 = (0..n).map(|r| a[r * n + i].value()).sum();
                let got_a = grads.wrt(a[i * n + k]);
                let got_b = grads.wrt(b[i * n + k]);
                println!(
                    "  dA[{i}][{k}] = {got_a:.10} (expected {expect_a:.10}), dB[{i}][{k}] = {got_b:.10} (expected {expect_b:.10})"
                );
                err = err
                    .max(max_relative_error(&[got_a], &[expect_a]))
                    .max(max_relative_error(&[got_b], &[expect_b]));
            }
            report(err)?;
        }

        tape.reset(base);
    }
    Ok(())
}

fn report(max_err: f64) -> Result<()> {
    ensure!(
        max_err < TOLERANCE,
        "FAIL: max relative error ({max_err:.2e}) >= tolerance ({TOLERANCE:.2e})"
    );
    println!("  PASS: max relative error ({max_err:.2e}) < tolerance ({TOLERANCE:.2e})");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tape_core::Atomic;
    use tape_lanes::{SerialLanes, ThreadLanes};

    #[test]
    fn test_regression_runs_on_both_paths() {
        let args = RegressionArgs {
            points: 20,
            epochs: 3,
            slope: 2.0,
            intercept: 1.0,
        };
        let mut seq = Tape::new(4096);
        regression(&mut seq, &SerialLanes, &args).unwrap();

        let mut shared = Tape::<Atomic>::atomic(4096);
        regression(&mut shared, &ThreadLanes::new(2).unwrap(), &args).unwrap();
    }

    #[test]
    fn test_matmul_gradient_check() {
        let args = MatmulArgs {
            size: 6,
            epochs: 2,
            seed: 1,
        };
        let mut tape = Tape::new(4096);
        matmul(&mut tape, &ThreadLanes::new(3).unwrap(), &args).unwrap();
    }

    #[test]
    fn test_capacity_error_has_context() {
        let args = RegressionArgs {
            points: 50,
            epochs: 1,
            slope: 1.0,
            intercept: 0.0,
        };
        let mut tape = Tape::new(16);
        let err = regression(&mut tape, &SerialLanes, &args).unwrap_err();
        assert!(format!("{err:#}").contains("reverse pass in epoch 0"));
    }

    #[test]
    fn test_objective_matches_direct_formula() {
        let xs = [0.0, 1.0, 2.0];
        let ys = [1.0, 3.0, 5.5];
        let direct: f64 = xs
            .iter()
            .zip(&ys)
            .map(|(x, y)| (2.0 * x + 1.0 - y) * (2.0 * x + 1.0 - y))
            .sum::<f64>()
            .ln();
        assert!((regression_objective(2.0, 1.0, &xs, &ys) - direct).abs() < 1e-12);
    }
}
