//! Spike-and-slab latent factors
//!
//! z[n,k] = s[n,k] * b[n,k]
//! s[n,k] ~ N(0, 1/alpha[n,k]), b[n,k] ~ Bernoulli(theta[n,k])
//!
//! with q(s, b) factorised as b ~ Bernoulli(qtheta), s | b=1 ~
//! N(mean_b1, var_b1) and s | b=0 ~ N(0, 1/alpha).

use crate::backend::{Backend, NodeOptions};
use crate::expectations::{expand, Expectations};
use crate::factor_node::{check_factor_indices, FactorNode};
use crate::markov_blanket::{MarkovBlanket, Node, Role};
use crate::mini_batch::{check_rows, restrict, BatchMode};
use crate::numeric::{blend_gaussian, blend_probability, nan_sum_f64, sigmoid, step_size, sum_f64};
use crate::views::{gather_views, other_factors, ViewData};

use log::{debug, info};
use matrix_param::traits::{FactorParam, Inference};
use matrix_param::{SpikeSlabMatrix, SpikeSlabParams};
use ndarray::prelude::*;
use ndarray::Zip;

pub struct SzNode {
    p: SpikeSlabMatrix,
    q: SpikeSlabMatrix,
    markov_blanket: Option<MarkovBlanket>,
    batch: BatchMode,
    backend: Backend,
}

/// Slab and inclusion parameters of the rows being updated
pub(crate) struct SlabRows {
    pub mean_b1: Array2<f32>,
    pub var_b1: Array2<f32>,
    pub theta: Array2<f32>,
    /// `theta * mean_b1`, kept current within a sweep
    pub sz: Array2<f32>,
}

/// Prior log-odds pieces `E[ln theta]` and `E[ln (1 - theta)]`
pub(crate) struct InclusionPrior {
    pub ln_e: Array2<f32>,
    pub ln_e_inv: Array2<f32>,
}

impl SzNode {
    /// * `p` - prior spike-and-slab parameters, samples x factors
    /// * `q` - initial posterior, same shape
    pub fn new(p: SpikeSlabMatrix, q: SpikeSlabMatrix) -> anyhow::Result<Self> {
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

    /// Attach the neighbours; W, Y and Tau are mandatory. Without
    /// ThetaZ the prior inclusion probability of `p` is used.
    pub fn set_markov_blanket(&mut self, blanket: MarkovBlanket) -> anyhow::Result<()> {
        blanket.require(&[Role::W, Role::Y, Role::Tau])?;
        self.markov_blanket = Some(blanket);
        Ok(())
    }

    pub fn markov_blanket(&self) -> anyhow::Result<&MarkovBlanket> {
        self.markov_blanket
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SZ: markov blanket is not set"))
    }

    pub fn p(&self) -> &SpikeSlabMatrix {
        &self.p
    }

    pub fn q(&self) -> &SpikeSlabMatrix {
        &self.q
    }

    pub fn batch_mode(&self) -> &BatchMode {
        &self.batch
    }

    fn full_expectations(&self) -> Expectations {
        Expectations::new(self.q.posterior_mean().clone())
            .with_e2(self.q.posterior_second_moment().clone())
            .with_eb(self.q.posterior_inclusion().clone())
            .with_enn(self.q.posterior_zero_inflated_second_moment().clone())
    }

    fn inclusion_prior(
        &self,
        theta: Option<Expectations>,
        ix: Option<&[usize]>,
        dims: (usize, usize),
    ) -> anyhow::Result<InclusionPrior> {
        match theta {
            Some(theta) => Ok(InclusionPrior {
                ln_e: expand(theta.ln_e()?, dims)?,
                ln_e_inv: expand(theta.ln_e_inv()?, dims)?,
            }),
            None => {
                let theta = restrict(self.p.theta(), ix)?;
                Ok(InclusionPrior {
                    ln_e: theta.mapv(f32::ln),
                    ln_e_inv: theta.mapv(|t| (1.0 - t).ln()),
                })
            }
        }
    }
}

/// One Gauss-Seidel sweep over the factors in ascending order.
/// `slab.sz[:, k]` is refreshed right after factor k, so factor k+1
/// sees the new values of factors <= k and the old values of the
/// rest.
pub(crate) fn update_spike_slab_factors(
    backend: &Backend,
    views: &[ViewData],
    alpha: &Array2<f32>,
    prior: &InclusionPrior,
    slab: &mut SlabRows,
    ro: f32,
) -> anyhow::Result<()> {
    let (nrows, nfactors) = slab.sz.dim();

    // t1 = sum_m (tau * Y) W, t3 = sum_m tau W^2 + alpha
    let mut t1 = Array2::<f32>::zeros((nrows, nfactors));
    let mut t3 = alpha.clone();
    for view in views {
        let tau_y = &view.tau * &view.y;
        t1 += &backend.matmul(tau_y.view(), view.w.view())?;
        t3 += &backend.matmul(view.tau.view(), view.w2.view())?;
    }

    for k in 0..nfactors {
        let others = other_factors(k, nfactors);

        // t2[n] = sum_m sum_d tau[n,d] (sum_{k' != k} sz[n,k'] w[d,k']) w[d,k]
        let mut t2 = Array1::<f32>::zeros(nrows);
        if !others.is_empty() {
            let sz_rest = slab.sz.select(Axis(1), &others);
            for view in views {
                let w_rest = view.w.select(Axis(1), &others);
                let fitted = backend.matmul(sz_rest.view(), w_rest.t())? * &view.tau;
                t2 += &backend.matvec(fitted.view(), view.w.column(k))?;
            }
        }

        let resid = &t1.column(k) - &t2;
        let t3_k = t3.column(k);

        let theta_k = Zip::from(&resid)
            .and(&t3_k)
            .and(&alpha.column(k))
            .and(&prior.ln_e.column(k))
            .and(&prior.ln_e_inv.column(k))
            .map_collect(|&r, &t3, &a, &ln_e, &ln_e_inv| {
                let logit = (ln_e - ln_e_inv) + 0.5 * a.ln() - 0.5 * t3.ln() + 0.5 * r * r / t3;
                sigmoid(logit)
            });

        let var_k = t3_k.mapv(|x| 1.0 / x);
        let mean_k = &var_k * &resid;

        blend_gaussian(
            slab.mean_b1.column_mut(k),
            slab.var_b1.column_mut(k),
            &mean_k,
            &var_k,
            ro,
        );
        blend_probability(slab.theta.column_mut(k), &theta_k, ro);

        let sz_k = &slab.theta.column(k) * &slab.mean_b1.column(k);
        slab.sz.column_mut(k).assign(&sz_k);
    }
    Ok(())
}

impl Node for SzNode {
    fn expectations(&self) -> anyhow::Result<Vec<Expectations>> {
        Ok(vec![self.full_expectations()])
    }

    fn mini_batch(&self) -> anyhow::Result<Vec<Expectations>> {
        Ok(vec![self.get_mini_batch()])
    }
}

impl FactorNode for SzNode {
    fn dim(&self) -> (usize, usize) {
        (self.q.nrows(), self.q.ncols())
    }

    fn precompute(&mut self, options: &NodeOptions) -> anyhow::Result<()> {
        self.backend = Backend::from_options(options);
        info!("SZ: {:?} backend", self.backend);
        Ok(())
    }

    fn update_parameters(&mut self, ix: Option<&[usize]>, ro: Option<f32>) -> anyhow::Result<()> {
        let ro = step_size(ro)?;
        let (ntot, nfactors) = self.dim();
        check_rows(ix, ntot)?;
        let nrows = ix.map_or(ntot, |ix| ix.len());
        let dims = (nrows, nfactors);

        let blanket = self.markov_blanket()?;
        let views = gather_views(blanket, ix, nrows, nfactors)?;

        let alpha = match blanket.single_mini_batch(Role::AlphaZ)? {
            Some(alpha) => expand(&alpha.e, dims)?,
            None => restrict(self.p.var_b1(), ix)?.mapv(|v| 1.0 / v),
        };
        let prior = self.inclusion_prior(blanket.single_mini_batch(Role::ThetaZ)?, ix, dims)?;

        let mut slab = SlabRows {
            mean_b1: restrict(self.q.mean_b1(), ix)?,
            var_b1: restrict(self.q.var_b1(), ix)?,
            theta: restrict(self.q.theta(), ix)?,
            sz: restrict(self.q.posterior_mean(), ix)?,
        };

        update_spike_slab_factors(&self.backend, &views, &alpha, &prior, &mut slab, ro)?;

        let rows = SpikeSlabParams {
            mean_b0: Array2::zeros(dims),
            var_b0: alpha.mapv(|a| 1.0 / a),
            mean_b1: slab.mean_b1,
            var_b1: slab.var_b1,
            theta: slab.theta,
        };

        match ix {
            None => {
                self.q.set_parameters(rows)?;
                self.batch = BatchMode::FullBatch;
            }
            Some(ix) => {
                self.q.assign_rows(ix, &rows)?;

                let theta = &rows.theta;
                let e = theta * &rows.mean_b1;
                let e2 = theta * &(&rows.mean_b1 * &rows.mean_b1 + &rows.var_b1);
                let enn = &e2 + &(theta.mapv(|t| 1.0 - t) * &rows.var_b0);
                self.batch = BatchMode::MiniBatch {
                    rows: ix.to_vec(),
                    cache: Expectations::new(e)
                        .with_e2(e2)
                        .with_eb(theta.clone())
                        .with_enn(enn),
                };
            }
        }

        debug!(
            "SZ: updated {} x {} over {} views (ro = {})",
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

        let tt = self.q.posterior_inclusion();
        let zz = self.q.posterior_zero_inflated_second_moment();
        let qvar = self.q.var_b1();

        let prior = self.inclusion_prior(blanket.single_expectations(Role::ThetaZ)?, None, dims)?;

        let (alpha, ln_alpha) = match blanket.single_expectations(Role::AlphaZ)? {
            Some(alpha) => (expand(&alpha.e, dims)?, expand(alpha.ln_e()?, dims)?),
            None => {
                let alpha = self.p.var_b1().mapv(|v| 1.0 / v);
                let ln_alpha = alpha.mapv(f32::ln);
                (alpha, ln_alpha)
            }
        };

        // continuous part
        let lb_pz = 0.5 * (sum_f64(&ln_alpha) - sum_f64(&(&alpha * zz)));
        let entropy = Zip::from(tt)
            .and(qvar)
            .and(&alpha)
            .map_collect(|&t, &v, &a| t * v.ln() + (1.0 - t) * (1.0 / a).ln());
        let lb_qz = -0.5 * (dims.0 * dims.1) as f64 - 0.5 * sum_f64(&entropy);
        let lb_z = lb_pz - lb_qz;

        // inclusion part; NaN where theta hits exactly 0 or 1
        let lb_pt = Zip::from(tt)
            .and(&prior.ln_e)
            .and(&prior.ln_e_inv)
            .map_collect(|&t, &ln_e, &ln_e_inv| t * ln_e + (1.0 - t) * ln_e_inv);
        let lb_qt = tt.mapv(|t| t * t.ln() + (1.0 - t) * (1.0 - t).ln());
        let lb_t = nan_sum_f64(&lb_pt) - nan_sum_f64(&lb_qt);

        let elbo = lb_z + lb_t;
        debug!("SZ: elbo = {} (z: {}, theta: {})", elbo, lb_z, lb_t);
        Ok(elbo)
    }

    fn remove_factors(&mut self, idx: &[usize], axis: Axis) -> anyhow::Result<()> {
        let idx = check_factor_indices(idx, axis, self.factors_axis(), self.dim().1)?;
        self.p.remove_columns(&idx)?;
        self.q.remove_columns(&idx)?;
        self.batch.remove_columns(&idx)?;
        debug!("SZ: removed factors {:?}, {} left", idx, self.dim().1);
        Ok(())
    }

    fn get_mini_batch(&self) -> Expectations {
        self.batch.current(|| self.full_expectations())
    }
}
