//! Power-law regression y = a·xᵇ by nonlinear least squares.
//!
//! Residuals are taken in linear (x, y) space, not log space, so large counts
//! dominate the fit exactly as in a direct curve fit. The starting point is
//! the log-log OLS line through the strictly positive pairs (falling back to
//! a = b = 1), which lets exact power laws converge in one step.

pub mod lm;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::FitConfig;
use crate::error::{Result, SfdError};
use lm::{optimize, LmModel};

/// Parameters of a fitted power law.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub a: f64,
    pub b: f64,
}

impl FitResult {
    /// Sentinel for "fit not performed" (fewer than two usable points).
    pub const NOT_FITTED: FitResult = FitResult { a: 0.0, b: 0.0 };

    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        self.a * x.powf(self.b)
    }

    pub fn curve(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.eval(x)).collect()
    }
}

struct PowerLaw;

impl LmModel<2> for PowerLaw {
    #[inline]
    fn evaluate(&self, x: f64, p: &[f64; 2]) -> f64 {
        p[0] * x.powf(p[1])
    }

    #[inline]
    fn jacobian_row(&self, x: f64, p: &[f64; 2]) -> [f64; 2] {
        let xb = x.powf(p[1]);
        [xb, p[0] * xb * x.ln()]
    }
}

/// Least-squares slope and intercept of `y` on `x`. `None` when x has no spread.
fn ols(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len() as f64;
    if x.len() < 2 {
        return None;
    }
    let sx: f64 = x.iter().sum();
    let sy: f64 = y.iter().sum();
    let sxx: f64 = x.iter().map(|v| v * v).sum();
    let sxy: f64 = x.iter().zip(y.iter()).map(|(a, b)| a * b).sum();
    let denom = n * sxx - sx * sx;
    if denom.abs() < 1e-14 {
        return None;
    }
    let slope = (n * sxy - sx * sy) / denom;
    Some((slope, (sy - slope * sx) / n))
}

fn initial_guess(x: &[f64], y: &[f64]) -> [f64; 2] {
    let (lx, ly): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y.iter())
        .filter(|(&xi, &yi)| xi > 0.0 && yi > 0.0)
        .map(|(&xi, &yi)| (xi.ln(), yi.ln()))
        .unzip();
    match ols(&lx, &ly) {
        Some((b, ln_a)) if b.is_finite() && ln_a.is_finite() => [ln_a.exp(), b],
        _ => [1.0, 1.0],
    }
}

pub struct PowerLawFitter<'a> {
    pub config: &'a FitConfig,
}

impl PowerLawFitter<'_> {
    /// Fit y = a·xᵇ. Fails with `FitConvergence` when the system is
    /// under-determined, the solver does not converge, or the result is not finite.
    pub fn fit(&self, x: &[f64], y: &[f64]) -> Result<FitResult> {
        if x.len() != y.len() {
            return Err(SfdError::FitConvergence(format!(
                "{} x values but {} y values",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(SfdError::FitConvergence(format!(
                "{} point(s) cannot determine 2 parameters",
                x.len()
            )));
        }
        if x.iter().any(|&v| !(v > 0.0 && v.is_finite())) {
            return Err(SfdError::FitConvergence("x values must be positive and finite".into()));
        }

        let seed = initial_guess(x, y);
        let out = optimize(&PowerLaw, x, y, seed, self.config);
        debug!(
            points = x.len(),
            iterations = out.iterations,
            rss = out.rss,
            a = out.params[0],
            b = out.params[1],
            "power-law fit"
        );

        let [a, b] = out.params;
        if !out.converged {
            return Err(SfdError::FitConvergence(format!(
                "no convergence after {} iterations (rss {:.3e})",
                out.iterations, out.rss
            )));
        }
        if !(a.is_finite() && b.is_finite()) {
            return Err(SfdError::FitConvergence(format!("non-finite parameters a={a}, b={b}")));
        }
        Ok(FitResult { a, b })
    }

    /// As [`fit`](Self::fit), but fewer than two points yield
    /// [`FitResult::NOT_FITTED`] without running the solver.
    pub fn fit_guarded(&self, x: &[f64], y: &[f64]) -> Result<FitResult> {
        if x.len() < 2 || y.len() < 2 {
            return Ok(FitResult::NOT_FITTED);
        }
        self.fit(x, y)
    }
}
