//! A neighbour whose expectations do not change: observed data, or
//! a W/Tau/prior node held fixed while the factors are fitted.

use crate::expectations::Expectations;
use crate::markov_blanket::Node;
use ndarray::prelude::*;
use special::Gamma;

#[derive(Debug, Clone)]
pub struct FixedNode {
    views: Vec<Expectations>,
    masks: Vec<Array2<bool>>,
    mini_batch: Option<Vec<Expectations>>,
}

impl FixedNode {
    pub fn new(views: Vec<Expectations>) -> Self {
        Self {
            views,
            masks: vec![],
            mini_batch: None,
        }
    }

    pub fn with_masks(mut self, masks: Vec<Array2<bool>>) -> anyhow::Result<Self> {
        if masks.len() != self.views.len() {
            anyhow::bail!("{} masks for {} views", masks.len(), self.views.len());
        }
        for (mask, view) in masks.iter().zip(self.views.iter()) {
            if mask.dim() != view.e.dim() {
                anyhow::bail!("mask {:?} vs data {:?}", mask.dim(), view.e.dim());
            }
        }
        self.masks = masks;
        Ok(self)
    }

    /// Observed views; NaN marks a missing entry
    pub fn observations(data: Vec<Array2<f32>>) -> Self {
        let masks = data.iter().map(|y| y.mapv(f32::is_nan)).collect();
        let views = data
            .into_iter()
            .map(|y| Expectations::new(y.mapv(|x| if x.is_nan() { 0.0 } else { x })))
            .collect();
        Self {
            views,
            masks,
            mini_batch: None,
        }
    }

    /// Gaussian views: `E = mean`, `E2 = mean^2 + var`
    pub fn gaussian(means: Vec<Array2<f32>>, vars: Vec<Array2<f32>>) -> anyhow::Result<Self> {
        if means.len() != vars.len() {
            anyhow::bail!("{} means, {} variances", means.len(), vars.len());
        }
        let views = means
            .into_iter()
            .zip(vars)
            .map(|(mean, var)| {
                if mean.dim() != var.dim() {
                    anyhow::bail!("mean {:?} vs var {:?}", mean.dim(), var.dim());
                }
                let e2 = &mean * &mean + &var;
                Ok(Expectations::new(mean).with_e2(e2))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self::new(views))
    }

    /// Gamma(shape a, rate b) precision:
    /// `E = a/b`, `E[ln x] = digamma(a) - ln(b)`
    pub fn gamma(a: &Array2<f32>, b: &Array2<f32>) -> anyhow::Result<Self> {
        if a.dim() != b.dim() {
            anyhow::bail!("shape {:?} vs rate {:?}", a.dim(), b.dim());
        }
        let e = a / b;
        let ln_e = a.mapv(|x| x.digamma()) - b.mapv(f32::ln);
        Ok(Self::new(vec![Expectations::new(e).with_ln_e(ln_e)]))
    }

    /// Beta(a, b) inclusion probability:
    /// `E[ln x] = digamma(a) - digamma(a+b)`,
    /// `E[ln(1-x)] = digamma(b) - digamma(a+b)`
    pub fn beta(a: &Array2<f32>, b: &Array2<f32>) -> anyhow::Result<Self> {
        if a.dim() != b.dim() {
            anyhow::bail!("a {:?} vs b {:?}", a.dim(), b.dim());
        }
        let ab = a + b;
        let e = a / &ab;
        let dig_ab = ab.mapv(|x| x.digamma());
        let ln_e = a.mapv(|x| x.digamma()) - &dig_ab;
        let ln_e_inv = b.mapv(|x| x.digamma()) - &dig_ab;
        Ok(Self::new(vec![Expectations::new(e)
            .with_ln_e(ln_e)
            .with_ln_e_inv(ln_e_inv)]))
    }

    /// Cache every view restricted to `rows`, as a stochastic
    /// training loop does before updating the factors
    pub fn set_mini_batch(&mut self, rows: &[usize]) -> anyhow::Result<()> {
        let views = self
            .views
            .iter()
            .map(|v| v.select_rows(rows))
            .collect::<anyhow::Result<Vec<_>>>()?;
        self.mini_batch = Some(views);
        Ok(())
    }

    pub fn clear_mini_batch(&mut self) {
        self.mini_batch = None;
    }
}

impl Node for FixedNode {
    fn expectations(&self) -> anyhow::Result<Vec<Expectations>> {
        Ok(self.views.clone())
    }

    fn mini_batch(&self) -> anyhow::Result<Vec<Expectations>> {
        Ok(self.mini_batch.clone().unwrap_or_else(|| self.views.clone()))
    }

    fn masks(&self) -> anyhow::Result<Vec<Array2<bool>>> {
        Ok(self.masks.clone())
    }
}
