//! Levenberg-Marquardt least squares for small fixed-size parameter vectors.
//!
//! Minimises Σ (y − f(x; p))² with Marquardt (diagonal-scaled) damping on the
//! normal equations JᵀJ·δ = Jᵀr. Works in f64 throughout.

use crate::config::FitConfig;

/// A model that can be fit with [`optimize`].
pub trait LmModel<const N: usize> {
    fn evaluate(&self, x: f64, params: &[f64; N]) -> f64;

    /// Partial derivatives ∂f/∂pᵢ at `x`.
    fn jacobian_row(&self, x: f64, params: &[f64; N]) -> [f64; N];
}

#[derive(Debug, Clone, Copy)]
pub struct LmOutcome<const N: usize> {
    pub params: [f64; N],
    /// Residual sum of squares at `params`.
    pub rss: f64,
    pub converged: bool,
    pub iterations: usize,
}

/// Lambda above which the step is considered hopeless.
const LAMBDA_MAX: f64 = 1e10;

pub fn optimize<const N: usize, M: LmModel<N>>(
    model: &M,
    xs: &[f64],
    ys: &[f64],
    initial: [f64; N],
    cfg: &FitConfig,
) -> LmOutcome<N> {
    let mut params = initial;
    let mut rss = residual_sum(model, xs, ys, &params);
    let mut lambda = cfg.initial_lambda;
    let mut iterations = 0;

    if !rss.is_finite() {
        return LmOutcome { params, rss, converged: false, iterations };
    }
    if rss == 0.0 {
        return LmOutcome { params, rss, converged: true, iterations };
    }

    let mut converged = false;
    for iter in 0..cfg.max_iterations {
        iterations = iter + 1;

        let (hessian, gradient) = normal_equations(model, xs, ys, &params);
        let mut damped = hessian;
        for (i, row) in damped.iter_mut().enumerate() {
            row[i] *= 1.0 + lambda;
        }

        let Some(delta) = solve(&damped, &gradient) else {
            lambda *= cfg.lambda_up;
            if lambda > LAMBDA_MAX {
                break;
            }
            continue;
        };

        let mut trial = params;
        for (p, d) in trial.iter_mut().zip(delta.iter()) {
            *p += d;
        }
        let small_step = params
            .iter()
            .zip(delta.iter())
            .all(|(p, d)| d.abs() <= cfg.xtol * (p.abs() + cfg.xtol));

        let trial_rss = residual_sum(model, xs, ys, &trial);
        if trial_rss.is_finite() && trial_rss <= rss {
            let reduction = rss - trial_rss;
            let near_gauss_newton = lambda < 1.0;
            let before = rss;
            params = trial;
            rss = trial_rss;
            lambda *= cfg.lambda_down;
            if rss == 0.0 || small_step || (near_gauss_newton && reduction <= cfg.ftol * before) {
                converged = true;
                break;
            }
        } else {
            if small_step {
                // Already at the minimum to within xtol.
                converged = true;
                break;
            }
            lambda *= cfg.lambda_up;
            if lambda > LAMBDA_MAX {
                break;
            }
        }
    }

    LmOutcome { params, rss, converged, iterations }
}

fn residual_sum<const N: usize, M: LmModel<N>>(model: &M, xs: &[f64], ys: &[f64], params: &[f64; N]) -> f64 {
    xs.iter()
        .zip(ys.iter())
        .map(|(&x, &y)| {
            let r = y - model.evaluate(x, params);
            r * r
        })
        .sum()
}

/// JᵀJ and Jᵀr at `params`. Upper triangle accumulated, then mirrored.
#[allow(clippy::needless_range_loop)]
fn normal_equations<const N: usize, M: LmModel<N>>(
    model: &M,
    xs: &[f64],
    ys: &[f64],
    params: &[f64; N],
) -> ([[f64; N]; N], [f64; N]) {
    let mut hessian = [[0.0f64; N]; N];
    let mut gradient = [0.0f64; N];
    for (&x, &y) in xs.iter().zip(ys.iter()) {
        let row = model.jacobian_row(x, params);
        let r = y - model.evaluate(x, params);
        for i in 0..N {
            gradient[i] += row[i] * r;
            for j in i..N {
                hessian[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 1..N {
        for j in 0..i {
            hessian[i][j] = hessian[j][i];
        }
    }
    (hessian, gradient)
}

/// Gaussian elimination with partial pivoting. `None` if singular or non-finite.
#[allow(clippy::needless_range_loop)]
pub fn solve<const N: usize>(a: &[[f64; N]; N], b: &[f64; N]) -> Option<[f64; N]> {
    let mut m = *a;
    let mut rhs = *b;

    let scale = m.iter().flat_map(|r| r.iter()).fold(0.0f64, |acc, v| acc.max(v.abs()));
    if !scale.is_finite() || scale == 0.0 {
        return None;
    }
    let tiny = scale * 1e-14;

    for col in 0..N {
        let mut pivot = col;
        for row in (col + 1)..N {
            if m[row][col].abs() > m[pivot][col].abs() {
                pivot = row;
            }
        }
        if m[pivot][col].abs() <= tiny {
            return None;
        }
        if pivot != col {
            m.swap(col, pivot);
            rhs.swap(col, pivot);
        }
        for row in (col + 1)..N {
            let factor = m[row][col] / m[col][col];
            let pivot_row = m[col];
            for (j, v) in m[row].iter_mut().enumerate().skip(col) {
                *v -= factor * pivot_row[j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = [0.0f64; N];
    for i in (0..N).rev() {
        let mut sum = rhs[i];
        for (j, &xj) in x.iter().enumerate().skip(i + 1) {
            sum -= m[i][j] * xj;
        }
        x[i] = sum / m[i][i];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Line;

    impl LmModel<2> for Line {
        fn evaluate(&self, x: f64, p: &[f64; 2]) -> f64 {
            p[0] + p[1] * x
        }
        fn jacobian_row(&self, x: f64, _p: &[f64; 2]) -> [f64; 2] {
            [1.0, x]
        }
    }

    struct Exponential;

    impl LmModel<2> for Exponential {
        fn evaluate(&self, x: f64, p: &[f64; 2]) -> f64 {
            p[0] * (p[1] * x).exp()
        }
        fn jacobian_row(&self, x: f64, p: &[f64; 2]) -> [f64; 2] {
            let e = (p[1] * x).exp();
            [e, p[0] * x * e]
        }
    }

    #[test]
    fn solve_2x2() {
        let x = solve(&[[2.0, 1.0], [1.0, 3.0]], &[3.0, 5.0]).unwrap();
        assert_relative_eq!(x[0], 0.8, max_relative = 1e-12);
        assert_relative_eq!(x[1], 1.4, max_relative = 1e-12);
    }

    #[test]
    fn solve_singular_is_none() {
        assert!(solve(&[[1.0, 2.0], [2.0, 4.0]], &[1.0, 2.0]).is_none());
        assert!(solve(&[[0.0, 0.0], [0.0, 0.0]], &[1.0, 2.0]).is_none());
    }

    #[test]
    fn linear_model_converges_to_exact_line() {
        let xs: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 - 0.5 * x).collect();
        let out = optimize(&Line, &xs, &ys, [0.0, 0.0], &FitConfig::default());
        assert!(out.converged);
        assert_relative_eq!(out.params[0], 3.0, max_relative = 1e-8);
        assert_relative_eq!(out.params[1], -0.5, max_relative = 1e-8);
    }

    #[test]
    fn nonlinear_model_from_default_guess() {
        let xs: Vec<f64> = (0..20).map(|i| i as f64 * 0.1).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 * (0.7 * x).exp()).collect();
        let out = optimize(&Exponential, &xs, &ys, [1.0, 1.0], &FitConfig::default());
        assert!(out.converged, "{out:?}");
        assert_relative_eq!(out.params[0], 2.0, max_relative = 1e-6);
        assert_relative_eq!(out.params[1], 0.7, max_relative = 1e-6);
    }

    #[test]
    fn exact_start_converges_immediately() {
        let xs = [1.0, 2.0, 3.0];
        let ys = [1.0, 2.0, 3.0];
        let out = optimize(&Line, &xs, &ys, [0.0, 1.0], &FitConfig::default());
        assert!(out.converged);
        assert_eq!(out.iterations, 0);
    }
}
