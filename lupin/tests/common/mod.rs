#![allow(dead_code)]

use lupin::{Expectations, FixedNode, MarkovBlanket, Role, SharedNode};
use matrix_util::traits::{SampleOps, SubsetOps};
use ndarray::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Multi-view data simulated from a linear factor model
#[derive(Clone)]
pub struct Sim {
    /// samples x features, NaN where missing
    pub y: Vec<Array2<f32>>,
    /// features x factors
    pub w: Vec<Array2<f32>>,
    pub w_var: Vec<Array2<f32>>,
    /// 1 x features
    pub tau: Vec<Array2<f32>>,
}

impl Sim {
    pub fn new(nrows: usize, nfactors: usize, dims: &[usize]) -> Self {
        let z = Array2::<f32>::rnorm(nrows, nfactors);
        let mut sim = Sim {
            y: vec![],
            w: vec![],
            w_var: vec![],
            tau: vec![],
        };
        for &d in dims {
            let w = Array2::<f32>::rnorm(d, nfactors);
            let w_var = Array2::<f32>::runif(d, nfactors) * 0.1 + 0.01;
            let tau = Array2::<f32>::runif(1, d) + 0.5;
            let y = z.dot(&w.t()) + Array2::<f32>::rnorm(nrows, d) * 0.5;
            sim.y.push(y);
            sim.w.push(w);
            sim.w_var.push(w_var);
            sim.tau.push(tau);
        }
        sim
    }

    pub fn with_missing(mut self, view: usize, entries: &[(usize, usize)]) -> Self {
        for &(n, d) in entries {
            self.y[view][(n, d)] = f32::NAN;
        }
        self
    }

    pub fn nrows(&self) -> usize {
        self.y[0].nrows()
    }

    pub fn w2(&self) -> Vec<Array2<f32>> {
        self.w
            .iter()
            .zip(self.w_var.iter())
            .map(|(w, v)| w * w + v)
            .collect()
    }

    /// The same model with the factors `idx` dropped from W
    pub fn remove_factors(&self, idx: &[usize]) -> anyhow::Result<Self> {
        let mut ret = self.clone();
        for (w, v) in ret.w.iter_mut().zip(ret.w_var.iter_mut()) {
            *w = w.remove_columns(idx)?;
            *v = v.remove_columns(idx)?;
        }
        Ok(ret)
    }
}

/// W, Y and Tau neighbours; Y and Tau stay reachable so tests can
/// move their minibatch
pub struct Neighbours {
    pub y: Rc<RefCell<FixedNode>>,
    pub tau: Rc<RefCell<FixedNode>>,
    pub blanket: MarkovBlanket,
}

pub fn neighbours(sim: &Sim) -> anyhow::Result<Neighbours> {
    let y = Rc::new(RefCell::new(FixedNode::observations(sim.y.clone())));
    let tau = Rc::new(RefCell::new(FixedNode::new(
        sim.tau.iter().map(|t| Expectations::new(t.clone())).collect(),
    )));
    let w: SharedNode = Rc::new(FixedNode::gaussian(sim.w.clone(), sim.w_var.clone())?);
    let blanket = MarkovBlanket::new()
        .with(Role::W, w)
        .with(Role::Y, y.clone())
        .with(Role::Tau, tau.clone());
    Ok(Neighbours { y, tau, blanket })
}

/// A single-view neighbour holding fixed expectations
pub fn fixed(ex: Expectations) -> SharedNode {
    Rc::new(FixedNode::new(vec![ex]))
}

fn residual(sim: &Sim, m: usize, n: usize, d: usize, z: &Array2<f32>, row: usize, k: usize) -> f64 {
    let w = &sim.w[m];
    let fitted: f64 = (0..w.ncols())
        .filter(|&j| j != k)
        .map(|j| z[(row, j)] as f64 * w[(d, j)] as f64)
        .sum();
    sim.y[m][(n, d)] as f64 - fitted
}

/// Element-by-element Gaussian factor sweep over `rows`.
/// `alpha`, `mu`, `mean` and `var` hold one row per entry of `rows`.
pub fn naive_gaussian_sweep(
    sim: &Sim,
    rows: &[usize],
    alpha: &Array2<f32>,
    mu: &Array2<f32>,
    mean: &mut Array2<f32>,
    var: &mut Array2<f32>,
) {
    let w2 = sim.w2();
    let nfactors = mean.ncols();
    for k in 0..nfactors {
        for (i, &n) in rows.iter().enumerate() {
            let mut prec = alpha[(i, k)] as f64;
            let mut eta = (alpha[(i, k)] * mu[(i, k)]) as f64;
            for m in 0..sim.y.len() {
                for d in 0..sim.y[m].ncols() {
                    if sim.y[m][(n, d)].is_nan() {
                        continue;
                    }
                    let tau = sim.tau[m][(0, d)] as f64;
                    prec += tau * w2[m][(d, k)] as f64;
                    eta += tau * sim.w[m][(d, k)] as f64 * residual(sim, m, n, d, mean, i, k);
                }
            }
            var[(i, k)] = (1.0 / prec) as f32;
            mean[(i, k)] = (eta / prec) as f32;
        }
    }
}

/// Element-by-element spike-and-slab sweep over every row
pub fn naive_spike_slab_sweep(
    sim: &Sim,
    alpha: &Array2<f32>,
    prior_theta: &Array2<f32>,
    mean_b1: &mut Array2<f32>,
    var_b1: &mut Array2<f32>,
    theta: &mut Array2<f32>,
) {
    let w2 = sim.w2();
    let (nrows, nfactors) = mean_b1.dim();
    let mut sz = &*theta * &*mean_b1;
    for k in 0..nfactors {
        for n in 0..nrows {
            let a = alpha[(n, k)] as f64;
            let mut t3 = a;
            let mut resid = 0_f64;
            for m in 0..sim.y.len() {
                for d in 0..sim.y[m].ncols() {
                    if sim.y[m][(n, d)].is_nan() {
                        continue;
                    }
                    let tau = sim.tau[m][(0, d)] as f64;
                    t3 += tau * w2[m][(d, k)] as f64;
                    resid += tau * sim.w[m][(d, k)] as f64 * residual(sim, m, n, d, &sz, n, k);
                }
            }
            let p = prior_theta[(n, k)] as f64;
            let logit =
                p.ln() - (1.0 - p).ln() + 0.5 * a.ln() - 0.5 * t3.ln() + 0.5 * resid * resid / t3;
            let t = 1.0 / (1.0 + (-logit).exp());
            var_b1[(n, k)] = (1.0 / t3) as f32;
            mean_b1[(n, k)] = (resid / t3) as f32;
            theta[(n, k)] = t as f32;
            sz[(n, k)] = (t * resid / t3) as f32;
        }
    }
}
