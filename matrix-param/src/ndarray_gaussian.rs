use crate::io::ParamIo;
use crate::traits::*;
use matrix_util::traits::SubsetOps;
use ndarray::prelude::*;
use rand::Rng;
use rand_distr::{Distribution, Normal};

#[derive(Debug, Clone)]
pub struct GaussianMatrix {
    num_rows: usize,
    num_columns: usize,
    ////////////////
    // parameters //
    ////////////////
    mean: Array2<f32>,
    var: Array2<f32>,
    //////////////////
    // expectations //
    //////////////////
    estimated_e: Array2<f32>,
    estimated_e2: Array2<f32>,
}

pub(crate) fn check_variance(var: &Array2<f32>, what: &str) -> anyhow::Result<()> {
    if let Some(v) = var.iter().find(|&&v| !(v > 0.0)) {
        anyhow::bail!("{} must be strictly positive, found {}", what, v);
    }
    Ok(())
}

impl GaussianMatrix {
    /// Element-wise univariate Gaussian
    ///
    /// x[i,j] ~ N(mean[i,j], var[i,j])
    ///
    /// #Arguments
    /// * `mean` - mean matrix
    /// * `var` - variance matrix of the same shape, strictly positive
    ///
    pub fn new(mean: Array2<f32>, var: Array2<f32>) -> anyhow::Result<Self> {
        if mean.dim() != var.dim() {
            anyhow::bail!(
                "mean {:?} and variance {:?} shapes differ",
                mean.dim(),
                var.dim()
            );
        }
        check_variance(&var, "variance")?;

        let dims = mean.dim();
        let mut ret = Self {
            num_rows: dims.0,
            num_columns: dims.1,
            mean,
            var,
            estimated_e: Array2::zeros(dims),
            estimated_e2: Array2::zeros(dims),
        };
        ret.calibrate();
        Ok(ret)
    }

    /// Same mean and variance for every element
    pub fn from_elem(dims: (usize, usize), mean: f32, var: f32) -> anyhow::Result<Self> {
        Self::new(Array2::from_elem(dims, mean), Array2::from_elem(dims, var))
    }

    pub fn mean(&self) -> &Array2<f32> {
        &self.mean
    }

    pub fn var(&self) -> &Array2<f32> {
        &self.var
    }

    /// Replace both parameters; the shape must stay the same
    pub fn set_parameters(&mut self, mean: Array2<f32>, var: Array2<f32>) -> anyhow::Result<()> {
        let dims = (self.num_rows, self.num_columns);
        if mean.dim() != dims || var.dim() != dims {
            anyhow::bail!(
                "expected {:?}, but mean {:?} and variance {:?}",
                dims,
                mean.dim(),
                var.dim()
            );
        }
        check_variance(&var, "variance")?;
        self.mean = mean;
        self.var = var;
        self.calibrate();
        Ok(())
    }

    /// Overwrite the rows `rows` of both parameters with `mean` and
    /// `var` (one row each per entry of `rows`)
    pub fn assign_rows(
        &mut self,
        rows: &[usize],
        mean: &Array2<f32>,
        var: &Array2<f32>,
    ) -> anyhow::Result<()> {
        check_variance(var, "variance")?;
        let mut new_mean = self.mean.clone();
        let mut new_var = self.var.clone();
        new_mean.assign_rows(rows, mean)?;
        new_var.assign_rows(rows, var)?;
        self.mean = new_mean;
        self.var = new_var;
        self.calibrate();
        Ok(())
    }
}

impl FactorParam for GaussianMatrix {
    fn calibrate(&mut self) {
        self.estimated_e = self.mean.clone();
        self.estimated_e2 = &self.mean * &self.mean + &self.var;
    }

    fn remove_columns(&mut self, idx: &[usize]) -> anyhow::Result<()> {
        let mean = self.mean.remove_columns(idx)?;
        let var = self.var.remove_columns(idx)?;
        self.num_columns = mean.ncols();
        self.mean = mean;
        self.var = var;
        self.calibrate();
        Ok(())
    }

    fn named_matrices(&self) -> Vec<(&'static str, &Array2<f32>)> {
        vec![
            ("mean", &self.mean),
            ("var", &self.var),
            ("E", &self.estimated_e),
            ("E2", &self.estimated_e2),
        ]
    }
}

impl Inference for GaussianMatrix {
    type Mat = Array2<f32>;

    fn posterior_mean(&self) -> &Self::Mat {
        &self.estimated_e
    }

    fn posterior_second_moment(&self) -> &Self::Mat {
        &self.estimated_e2
    }

    fn posterior_sample<R: Rng + ?Sized>(&self, rng: &mut R) -> anyhow::Result<Self::Mat> {
        let mut ret = Array2::zeros(self.mean.dim());
        for ((x, &mu), &v) in ret.iter_mut().zip(self.mean.iter()).zip(self.var.iter()) {
            *x = Normal::new(mu, v.sqrt())?.sample(rng);
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

impl ParamIo for GaussianMatrix {}
