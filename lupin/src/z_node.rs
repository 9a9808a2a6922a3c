//! Gaussian latent factors
//!
//! z[n,k] ~ N(mu[n,k], 1/alpha[n,k])
//! y[m][n,d] ~ N(sum_k z[n,k] w[m][d,k], 1/tau[m][n,d])
//!
//! with q(z[n,k]) = N(mean[n,k], var[n,k]).

use crate::backend::{Backend, NodeOptions};
use crate::expectations::{expand, Expectations};
use crate::factor_node::{check_factor_indices, FactorNode};
use crate::markov_blanket::{MarkovBlanket, Node, Role};
use crate::mini_batch::{check_rows, restrict, BatchMode};
use crate::numeric::{blend_gaussian, step_size, sum_f64};
use crate::views::{gather_views, other_factors, ViewData};

use log::{debug, info};
use matrix_param::traits::{FactorParam, Inference};
use matrix_param::GaussianMatrix;
use ndarray::prelude::*;

pub struct ZNode {
    p: GaussianMatrix,
    q: GaussianMatrix,
    markov_blanket: Option<MarkovBlanket>,
    batch: BatchMode,
    backend: Backend,
}

impl ZNode {
    /// * `p` - prior mean and variance, samples x factors
    /// * `q` - initial posterior mean and variance, same shape
    pub fn new(p: GaussianMatrix, q: GaussianMatrix) -> anyhow::Result<Self> {
        if (p.nrows(), p.ncols()) != (q.nrows(), q.ncols()) {
            anyhow::bail!(
                "prior {:?} and posterior {:?} shapes differ",
                (p.nrows(), p.ncols()),
                (q.nrows(), q.ncols())
            );
        }
        Ok(Self {
            p,
            q,
            markov_blanket: None,
            batch: BatchMode::FullBatch,
            backend: Backend::default(),
        })
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Attach the neighbours; W, Y and Tau are mandatory
    pub fn set_markov_blanket(&mut self, blanket: MarkovBlanket) -> anyhow::Result<()> {
        blanket.require(&[Role::W, Role::Y, Role::Tau])?;
        self.markov_blanket = Some(blanket);
        Ok(())
    }

    pub fn markov_blanket(&self) -> anyhow::Result<&MarkovBlanket> {
        self.markov_blanket
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Z: markov blanket is not set"))
    }

    pub fn p(&self) -> &GaussianMatrix {
        &self.p
    }

    pub fn q(&self) -> &GaussianMatrix {
        &self.q
    }

    pub fn batch_mode(&self) -> &BatchMode {
        &self.batch
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    fn full_expectations(&self) -> Expectations {
        Expectations::new(self.q.posterior_mean().clone())
            .with_e2(self.q.posterior_second_moment().clone())
    }
}

/// One sweep over the factors in ascending order. `qmean` is
/// updated in place, so factor k sees the new means of factors < k.
///
/// var[n,k] = 1 / (alpha[n,k] + sum_m sum_d tau[n,d] E[w[d,k]^2])
/// mean[n,k] = var[n,k] * (sum_m sum_d tau[n,d] w[d,k] r[n,d] + alpha[n,k] mu[n,k])
///
/// where `r` is the residual of Y without factor k.
pub(crate) fn update_gaussian_factors(
    backend: &Backend,
    views: &[ViewData],
    alpha: &Array2<f32>,
    mu: &Array2<f32>,
    qmean: &mut Array2<f32>,
    qvar: &mut Array2<f32>,
    ro: f32,
) -> anyhow::Result<()> {
    let (nrows, nfactors) = qmean.dim();

    for k in 0..nfactors {
        let others = other_factors(k, nfactors);
        let mut foo = Array1::<f32>::zeros(nrows);
        let mut bar = Array1::<f32>::zeros(nrows);

        for view in views {
            foo += &backend.matvec(view.tau.view(), view.w2.column(k))?;

            let mut resid = view.y.clone();
            if !others.is_empty() {
                let z_rest = qmean.select(Axis(1), &others);
                let w_rest = view.w.select(Axis(1), &others);
                resid -= &backend.matmul(z_rest.view(), w_rest.t())?;
            }
            resid *= &view.tau;
            bar += &backend.matvec(resid.view(), view.w.column(k))?;
        }

        let alpha_k = alpha.column(k);
        let var_k = (&alpha_k + &foo).mapv(|x| 1.0 / x);
        let mean_k = &var_k * &(&bar + &(&alpha_k * &mu.column(k)));

        blend_gaussian(qmean.column_mut(k), qvar.column_mut(k), &mean_k, &var_k, ro);
    }
    Ok(())
}

impl Node for ZNode {
    fn expectations(&self) -> anyhow::Result<Vec<Expectations>> {
        Ok(vec![self.full_expectations()])
    }

    fn mini_batch(&self) -> anyhow::Result<Vec<Expectations>> {
        Ok(vec![self.get_mini_batch()])
    }
}

impl FactorNode for ZNode {
    fn dim(&self) -> (usize, usize) {
        (self.q.nrows(), self.q.ncols())
    }

    fn precompute(&mut self, options: &NodeOptions) -> anyhow::Result<()> {
        self.backend = Backend::from_options(options);
        info!("Z: {:?} backend", self.backend);
        Ok(())
    }

    fn update_parameters(&mut self, ix: Option<&[usize]>, ro: Option<f32>) -> anyhow::Result<()> {
        let ro = step_size(ro)?;
        let (ntot, nfactors) = self.dim();
        check_rows(ix, ntot)?;
        let nrows = ix.map_or(ntot, |ix| ix.len());

        let blanket = self.markov_blanket()?;
        let views = gather_views(blanket, ix, nrows, nfactors)?;

        let mu = match blanket.single_mini_batch(Role::MuZ)? {
            Some(mu) => expand(&mu.e, (nrows, nfactors))?,
            None => restrict(self.p.mean(), ix)?,
        };

        let alpha = match blanket.single_mini_batch(Role::AlphaZ)? {
            Some(alpha) => expand(&alpha.e, (nrows, nfactors))?,
            None => restrict(self.p.var(), ix)?.mapv(|v| 1.0 / v),
        };

        let mut qmean = restrict(self.q.mean(), ix)?;
        let mut qvar = restrict(self.q.var(), ix)?;

        update_gaussian_factors(
            &self.backend,
            &views,
            &alpha,
            &mu,
            &mut qmean,
            &mut qvar,
            ro,
        )?;

        match ix {
            None => {
                self.q.set_parameters(qmean, qvar)?;
                self.batch = BatchMode::FullBatch;
            }
            Some(ix) => {
                self.q.assign_rows(ix, &qmean, &qvar)?;

                let e2 = &qmean * &qmean + &qvar;
                self.batch = BatchMode::MiniBatch {
                    rows: ix.to_vec(),
                    cache: Expectations::new(qmean).with_e2(e2),
                };
            }
        }

        debug!(
            "Z: updated {} x {} over {} views (ro = {})",
            nrows,
            nfactors,
            views.len(),
            ro
        );
        Ok(())
    }

    fn calculate_elbo(&self) -> anyhow::Result<f64> {
        let blanket = self.markov_blanket()?;
        let dims = self.dim();

        let qe = self.q.posterior_mean();
        let qe2 = self.q.posterior_second_moment();

        let (pe, pe2) = match blanket.single_expectations(Role::MuZ)? {
            Some(mu) => (expand(&mu.e, dims)?, expand(mu.e2()?, dims)?),
            None => (self.p.mean().clone(), self.p.mean().mapv(|x| x * x)),
        };

        let (alpha, ln_alpha) = match blanket.single_expectations(Role::AlphaZ)? {
            Some(alpha) => (expand(&alpha.e, dims)?, expand(alpha.ln_e()?, dims)?),
            None => {
                let alpha = self.p.var().mapv(|v| 1.0 / v);
                let ln_alpha = alpha.mapv(f32::ln);
                (alpha, ln_alpha)
            }
        };

        // E[ln p(z)] without the 2 pi constant
        let quad = qe2 * 0.5 - &pe * qe + &pe2 * 0.5;
        let lb_p = -sum_f64(&(&quad * &alpha)) + 0.5 * sum_f64(&ln_alpha);

        // E[ln q(z)] without the 2 pi constant
        let lb_q = -0.5 * (sum_f64(&self.q.var().mapv(f32::ln)) + (dims.0 * dims.1) as f64);

        let elbo = lb_p - lb_q;
        debug!("Z: elbo = {}", elbo);
        Ok(elbo)
    }

    fn remove_factors(&mut self, idx: &[usize], axis: Axis) -> anyhow::Result<()> {
        let idx = check_factor_indices(idx, axis, self.factors_axis(), self.dim().1)?;
        self.p.remove_columns(&idx)?;
        self.q.remove_columns(&idx)?;
        self.batch.remove_columns(&idx)?;
        debug!("Z: removed factors {:?}, {} left", idx, self.dim().1);
        Ok(())
    }

    fn get_mini_batch(&self) -> Expectations {
        self.batch.current(|| self.full_expectations())
    }
}
