use matrix_util::traits::SubsetOps;
use ndarray::prelude::*;

/// Moments a node exposes to its neighbours. `e` is always present;
/// the rest depend on the distribution (e.g. `ln_e` for a Gamma
/// precision, `eb`/`enn` for a spike-and-slab).
#[derive(Debug, Clone)]
pub struct Expectations {
    pub e: Array2<f32>,
    pub e2: Option<Array2<f32>>,
    pub ln_e: Option<Array2<f32>>,
    pub ln_e_inv: Option<Array2<f32>>,
    pub eb: Option<Array2<f32>>,
    pub enn: Option<Array2<f32>>,
}

fn require<'a>(x: &'a Option<Array2<f32>>, name: &str) -> anyhow::Result<&'a Array2<f32>> {
    x.as_ref()
        .ok_or_else(|| anyhow::anyhow!("expectation {} is not available", name))
}

/// Broadcast `x` to `dims`; a single row is repeated over rows
pub fn expand(x: &Array2<f32>, dims: (usize, usize)) -> anyhow::Result<Array2<f32>> {
    match x.broadcast(dims) {
        Some(xx) => Ok(xx.to_owned()),
        None => anyhow::bail!("cannot broadcast {:?} to {:?}", x.dim(), dims),
    }
}

impl Expectations {
    pub fn new(e: Array2<f32>) -> Self {
        Self {
            e,
            e2: None,
            ln_e: None,
            ln_e_inv: None,
            eb: None,
            enn: None,
        }
    }

    pub fn with_e2(mut self, e2: Array2<f32>) -> Self {
        self.e2 = Some(e2);
        self
    }

    pub fn with_ln_e(mut self, ln_e: Array2<f32>) -> Self {
        self.ln_e = Some(ln_e);
        self
    }

    pub fn with_ln_e_inv(mut self, ln_e_inv: Array2<f32>) -> Self {
        self.ln_e_inv = Some(ln_e_inv);
        self
    }

    pub fn with_eb(mut self, eb: Array2<f32>) -> Self {
        self.eb = Some(eb);
        self
    }

    pub fn with_enn(mut self, enn: Array2<f32>) -> Self {
        self.enn = Some(enn);
        self
    }

    pub fn e2(&self) -> anyhow::Result<&Array2<f32>> {
        require(&self.e2, "E2")
    }

    pub fn ln_e(&self) -> anyhow::Result<&Array2<f32>> {
        require(&self.ln_e, "lnE")
    }

    pub fn ln_e_inv(&self) -> anyhow::Result<&Array2<f32>> {
        require(&self.ln_e_inv, "lnEInv")
    }

    pub fn eb(&self) -> anyhow::Result<&Array2<f32>> {
        require(&self.eb, "EB")
    }

    pub fn enn(&self) -> anyhow::Result<&Array2<f32>> {
        require(&self.enn, "ENN")
    }

    pub fn nrows(&self) -> usize {
        self.e.nrows()
    }

    fn map_all<F>(&self, f: F) -> anyhow::Result<Self>
    where
        F: Fn(&Array2<f32>) -> anyhow::Result<Array2<f32>>,
    {
        let opt = |x: &Option<Array2<f32>>| x.as_ref().map(&f).transpose();
        Ok(Self {
            e: f(&self.e)?,
            e2: opt(&self.e2)?,
            ln_e: opt(&self.ln_e)?,
            ln_e_inv: opt(&self.ln_e_inv)?,
            eb: opt(&self.eb)?,
            enn: opt(&self.enn)?,
        })
    }

    /// Every moment restricted to `rows`
    pub fn select_rows(&self, rows: &[usize]) -> anyhow::Result<Self> {
        self.map_all(|x| x.select_rows(rows))
    }

    /// Every moment without the columns `idx`
    pub fn remove_columns(&self, idx: &[usize]) -> anyhow::Result<Self> {
        self.map_all(|x| x.remove_columns(idx))
    }
}
