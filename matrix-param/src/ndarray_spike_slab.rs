use crate::io::ParamIo;
use crate::ndarray_gaussian::check_variance;
use crate::traits::*;
use matrix_util::traits::SubsetOps;
use ndarray::prelude::*;
use rand::Rng;
use rand_distr::{Bernoulli, Distribution, Normal};

/// Parameters of a Bernoulli-Gaussian (spike-and-slab) matrix
///
/// x[i,j] = b[i,j] * z1[i,j] + (1 - b[i,j]) * z0[i,j]
/// b[i,j] ~ Bernoulli(theta[i,j])
/// z1[i,j] ~ N(mean_b1[i,j], var_b1[i,j])
/// z0[i,j] ~ N(mean_b0[i,j], var_b0[i,j])
///
#[derive(Debug, Clone)]
pub struct SpikeSlabParams {
    pub mean_b0: Array2<f32>,
    pub var_b0: Array2<f32>,
    pub mean_b1: Array2<f32>,
    pub var_b1: Array2<f32>,
    pub theta: Array2<f32>,
}

impl SpikeSlabParams {
    fn dim(&self) -> (usize, usize) {
        self.theta.dim()
    }

    fn check(&self) -> anyhow::Result<()> {
        let dims = self.dim();
        for (name, x) in [
            ("mean_b0", &self.mean_b0),
            ("var_b0", &self.var_b0),
            ("mean_b1", &self.mean_b1),
            ("var_b1", &self.var_b1),
        ] {
            if x.dim() != dims {
                anyhow::bail!("{} has shape {:?}, expected {:?}", name, x.dim(), dims);
            }
        }
        check_variance(&self.var_b0, "var_b0")?;
        check_variance(&self.var_b1, "var_b1")?;
        if let Some(t) = self.theta.iter().find(|&&t| !(0.0..=1.0).contains(&t)) {
            anyhow::bail!("theta must lie in [0, 1], found {}", t);
        }
        Ok(())
    }

    fn remove_columns(&self, idx: &[usize]) -> anyhow::Result<Self> {
        Ok(Self {
            mean_b0: self.mean_b0.remove_columns(idx)?,
            var_b0: self.var_b0.remove_columns(idx)?,
            mean_b1: self.mean_b1.remove_columns(idx)?,
            var_b1: self.var_b1.remove_columns(idx)?,
            theta: self.theta.remove_columns(idx)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SpikeSlabMatrix {
    num_rows: usize,
    num_columns: usize,
    params: SpikeSlabParams,
    //////////////////
    // expectations //
    //////////////////
    estimated_e: Array2<f32>,
    estimated_e2: Array2<f32>,
    estimated_eb: Array2<f32>,
    estimated_enn: Array2<f32>,
}

impl SpikeSlabMatrix {
    pub fn new(params: SpikeSlabParams) -> anyhow::Result<Self> {
        params.check()?;
        let dims = params.dim();
        let mut ret = Self {
            num_rows: dims.0,
            num_columns: dims.1,
            params,
            estimated_e: Array2::zeros(dims),
            estimated_e2: Array2::zeros(dims),
            estimated_eb: Array2::zeros(dims),
            estimated_enn: Array2::zeros(dims),
        };
        ret.calibrate();
        Ok(ret)
    }

    /// Same slab for every element, spike at zero with the slab's
    /// variance
    pub fn from_elem(
        dims: (usize, usize),
        mean_b1: f32,
        var_b1: f32,
        theta: f32,
    ) -> anyhow::Result<Self> {
        Self::new(SpikeSlabParams {
            mean_b0: Array2::zeros(dims),
            var_b0: Array2::from_elem(dims, var_b1),
            mean_b1: Array2::from_elem(dims, mean_b1),
            var_b1: Array2::from_elem(dims, var_b1),
            theta: Array2::from_elem(dims, theta),
        })
    }

    pub fn parameters(&self) -> &SpikeSlabParams {
        &self.params
    }

    pub fn mean_b0(&self) -> &Array2<f32> {
        &self.params.mean_b0
    }

    pub fn var_b0(&self) -> &Array2<f32> {
        &self.params.var_b0
    }

    pub fn mean_b1(&self) -> &Array2<f32> {
        &self.params.mean_b1
    }

    pub fn var_b1(&self) -> &Array2<f32> {
        &self.params.var_b1
    }

    pub fn theta(&self) -> &Array2<f32> {
        &self.params.theta
    }

    /// `E[b]`
    pub fn posterior_inclusion(&self) -> &Array2<f32> {
        &self.estimated_eb
    }

    /// `E[x^2]` including the spike branch
    pub fn posterior_zero_inflated_second_moment(&self) -> &Array2<f32> {
        &self.estimated_enn
    }

    /// Replace all parameters at once; the shape must stay the same
    pub fn set_parameters(&mut self, params: SpikeSlabParams) -> anyhow::Result<()> {
        if params.dim() != (self.num_rows, self.num_columns) {
            anyhow::bail!(
                "expected {:?}, found {:?}",
                (self.num_rows, self.num_columns),
                params.dim()
            );
        }
        params.check()?;
        self.params = params;
        self.calibrate();
        Ok(())
    }

    /// Overwrite the rows `rows` of every parameter; `sub` holds one
    /// row per entry of `rows`
    pub fn assign_rows(&mut self, rows: &[usize], sub: &SpikeSlabParams) -> anyhow::Result<()> {
        sub.check()?;
        let mut params = self.params.clone();
        params.mean_b0.assign_rows(rows, &sub.mean_b0)?;
        params.var_b0.assign_rows(rows, &sub.var_b0)?;
        params.mean_b1.assign_rows(rows, &sub.mean_b1)?;
        params.var_b1.assign_rows(rows, &sub.var_b1)?;
        params.theta.assign_rows(rows, &sub.theta)?;
        self.params = params;
        self.calibrate();
        Ok(())
    }
}

impl FactorParam for SpikeSlabMatrix {
    fn calibrate(&mut self) {
        let p = &self.params;
        let slab2 = &p.mean_b1 * &p.mean_b1 + &p.var_b1;
        let spike2 = &p.mean_b0 * &p.mean_b0 + &p.var_b0;
        self.estimated_e = &p.theta * &p.mean_b1;
        self.estimated_e2 = &p.theta * &slab2;
        self.estimated_eb = p.theta.clone();
        self.estimated_enn = &self.estimated_e2 + &(p.theta.mapv(|t| 1.0 - t) * &spike2);
    }

    fn remove_columns(&mut self, idx: &[usize]) -> anyhow::Result<()> {
        let params = self.params.remove_columns(idx)?;
        self.num_columns = params.dim().1;
        self.params = params;
        self.calibrate();
        Ok(())
    }

    fn named_matrices(&self) -> Vec<(&'static str, &Array2<f32>)> {
        vec![
            ("mean_b0", &self.params.mean_b0),
            ("var_b0", &self.params.var_b0),
            ("mean_b1", &self.params.mean_b1),
            ("var_b1", &self.params.var_b1),
            ("theta", &self.params.theta),
            ("E", &self.estimated_e),
            ("E2", &self.estimated_e2),
            ("EB", &self.estimated_eb),
            ("ENN", &self.estimated_enn),
        ]
    }
}

impl Inference for SpikeSlabMatrix {
    type Mat = Array2<f32>;

    fn posterior_mean(&self) -> &Self::Mat {
        &self.estimated_e
    }

    fn posterior_second_moment(&self) -> &Self::Mat {
        &self.estimated_e2
    }

    fn posterior_sample<R: Rng + ?Sized>(&self, rng: &mut R) -> anyhow::Result<Self::Mat> {
        let p = &self.params;
        let mut ret = Array2::zeros(p.dim());
        for (ij, x) in ret.indexed_iter_mut() {
            *x = if Bernoulli::new(p.theta[ij] as f64)?.sample(rng) {
                Normal::new(p.mean_b1[ij], p.var_b1[ij].sqrt())?.sample(rng)
            } else {
                0.0
            };
        }
        Ok(ret)
    }

    fn nrows(&self) -> usize {
        self.num_rows
    }

    fn ncols(&self) -> usize {
        self.num_columns
    }
}

impl ParamIo for SpikeSlabMatrix {}
