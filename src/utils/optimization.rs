//! Derivative-free minimisation for likelihood and sum-of-squares fits.

use std::cmp::Ordering;

/// Outcome of a [`nelder_mead`] run.
#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    pub optimal_point: Vec<f64>,
    pub optimal_value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Simplex coefficients and stopping rules.
#[derive(Debug, Clone)]
pub struct NelderMeadConfig {
    pub max_iter: usize,
    /// Relative spread of objective values across the simplex needed to stop.
    pub tolerance: f64,
    /// Largest distance from the best vertex needed to stop, relative to its norm.
    pub x_tolerance: f64,
    /// Reflection.
    pub alpha: f64,
    /// Expansion.
    pub gamma: f64,
    /// Contraction.
    pub rho: f64,
    /// Shrink.
    pub sigma: f64,
    /// Relative size of the initial simplex.
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tolerance: 1e-8,
            x_tolerance: 1e-6,
            alpha: 1.0,
            gamma: 2.0,
            rho: 0.5,
            sigma: 0.5,
            initial_step: 0.05,
        }
    }
}

impl NelderMeadConfig {
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_initial_step(mut self, step: f64) -> Self {
        self.initial_step = step;
        self
    }
}

struct Vertex {
    point: Vec<f64>,
    value: f64,
}

/// Minimise `objective` from `initial`, clamping every trial point to `bounds`.
///
/// Non-finite objective values are treated as `+inf`, so callers can signal
/// infeasible parameters by returning NaN.
///
/// ```
/// use load_forecast::utils::optimization::{nelder_mead, NelderMeadConfig};
///
/// let r = nelder_mead(
///     |x| (x[0] - 2.0).powi(2) + (x[1] + 1.0).powi(2),
///     &[0.0, 0.0],
///     None,
///     NelderMeadConfig::default(),
/// );
/// assert!((r.optimal_point[0] - 2.0).abs() < 1e-3);
/// assert!((r.optimal_point[1] + 1.0).abs() < 1e-3);
/// ```
pub fn nelder_mead<F>(
    objective: F,
    initial: &[f64],
    bounds: Option<&[(f64, f64)]>,
    config: NelderMeadConfig,
) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    let n = initial.len();
    if n == 0 {
        return NelderMeadResult {
            optimal_point: Vec::new(),
            optimal_value: f64::NAN,
            iterations: 0,
            converged: false,
        };
    }

    let eval = |p: &[f64]| {
        let v = objective(p);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };
    let make = |point: Vec<f64>| {
        let point = clamp(point, bounds);
        let value = eval(&point);
        Vertex { point, value }
    };

    let mut simplex: Vec<Vertex> = Vec::with_capacity(n + 1);
    simplex.push(make(initial.to_vec()));
    for i in 0..n {
        let mut p = initial.to_vec();
        let step = if p[i].abs() > 1e-10 {
            config.initial_step * p[i].abs()
        } else {
            config.initial_step
        };
        p[i] += step;
        // bounced back onto the start point by the bounds: step the other way
        let mut v = make(p.clone());
        if v.point == simplex[0].point {
            p[i] -= 2.0 * step;
            v = make(p);
        }
        simplex.push(v);
    }

    let mut iterations = 0;
    let mut converged = false;
    while iterations < config.max_iter {
        iterations += 1;
        simplex.sort_by(|a, b| a.value.partial_cmp(&b.value).unwrap_or(Ordering::Equal));

        let best = simplex[0].value;
        let worst = simplex[n].value;
        let diameter = simplex_diameter(&simplex);
        let scale = 1.0 + norm(&simplex[0].point);
        let flat = (worst - best).abs() <= config.tolerance * (1.0 + best.abs());
        // equal values on either side of a minimum are not convergence
        if (flat && diameter <= config.x_tolerance * scale) || diameter <= f64::EPSILON * scale {
            converged = true;
            break;
        }

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|v| v.point[j]).sum::<f64>() / n as f64)
            .collect();
        let toward = |from: &[f64], t: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(from)
                .map(|(c, p)| c + t * (p - c))
                .collect()
        };

        let reflected = make(toward(&simplex[n].point, -config.alpha));
        if reflected.value < best {
            let expanded = make(toward(&reflected.point, config.gamma));
            simplex[n] = if expanded.value < reflected.value {
                expanded
            } else {
                reflected
            };
            continue;
        }
        if reflected.value < simplex[n - 1].value {
            simplex[n] = reflected;
            continue;
        }

        let contracted = if reflected.value < worst {
            make(toward(&reflected.point, config.rho))
        } else {
            make(toward(&simplex[n].point, config.rho))
        };
        if contracted.value < worst.min(reflected.value) {
            simplex[n] = contracted;
            continue;
        }

        let anchor = simplex[0].point.clone();
        for v in simplex.iter_mut().skip(1) {
            let shrunk: Vec<f64> = anchor
                .iter()
                .zip(&v.point)
                .map(|(a, p)| a + config.sigma * (p - a))
                .collect();
            *v = make(shrunk);
        }
    }

    simplex.sort_by(|a, b| a.value.partial_cmp(&b.value).unwrap_or(Ordering::Equal));
    let best = simplex.swap_remove(0);
    NelderMeadResult {
        optimal_point: best.point,
        optimal_value: best.value,
        iterations,
        converged,
    }
}

/// Largest distance from the best vertex to any other.
fn simplex_diameter(simplex: &[Vertex]) -> f64 {
    let best = &simplex[0].point;
    simplex[1..]
        .iter()
        .map(|v| {
            v.point
                .iter()
                .zip(best)
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt()
        })
        .fold(0.0, f64::max)
}

fn norm(point: &[f64]) -> f64 {
    point.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn clamp(mut point: Vec<f64>, bounds: Option<&[(f64, f64)]>) -> Vec<f64> {
    if let Some(b) = bounds {
        for (x, &(lo, hi)) in point.iter_mut().zip(b) {
            *x = x.clamp(lo, hi);
        }
    }
    point
}
