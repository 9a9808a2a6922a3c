use crate::expectations::expand;
use crate::markov_blanket::{MarkovBlanket, Role};
use matrix_util::traits::SubsetOps;
use ndarray::prelude::*;
use ndarray::Zip;

/// Inputs of one view for a factor update, rows already restricted
/// to the minibatch
pub struct ViewData {
    /// observations, rows x features, zero where missing
    pub y: Array2<f32>,
    /// noise precision, rows x features, zero where missing
    pub tau: Array2<f32>,
    /// `E[W]`, features x factors
    pub w: Array2<f32>,
    /// `E[W^2]`, features x factors
    pub w2: Array2<f32>,
}

/// Collect W, Y, Tau and the masks of every view.
///
/// * `ix` - minibatch rows, used to cut the (full) masks
/// * `nrows` - number of rows being updated
/// * `nfactors` - number of factors
pub fn gather_views(
    blanket: &MarkovBlanket,
    ix: Option<&[usize]>,
    nrows: usize,
    nfactors: usize,
) -> anyhow::Result<Vec<ViewData>> {
    let w_views = blanket.node(Role::W)?.expectations()?;
    let y_node = blanket.node(Role::Y)?;
    let y_views = y_node.mini_batch()?;
    let masks = y_node.masks()?;
    let tau_views = blanket.node(Role::Tau)?.mini_batch()?;

    let nviews = y_views.len();
    if w_views.len() != nviews || tau_views.len() != nviews {
        anyhow::bail!(
            "views disagree: {} in Y, {} in W, {} in Tau",
            nviews,
            w_views.len(),
            tau_views.len()
        );
    }
    if !masks.is_empty() && masks.len() != nviews {
        anyhow::bail!("{} masks for {} views", masks.len(), nviews);
    }

    let mut ret = Vec::with_capacity(nviews);
    for (m, ((w_m, y_m), tau_m)) in w_views
        .into_iter()
        .zip(y_views)
        .zip(tau_views)
        .enumerate()
    {
        let mut y = y_m.e;
        let (nr, nfeatures) = y.dim();
        if nr != nrows {
            anyhow::bail!("view {}: Y has {} rows, expected {}", m, nr, nrows);
        }
        let mut tau = expand(&tau_m.e, (nrows, nfeatures))?;

        if let Some(mask) = masks.get(m) {
            let mask = match ix {
                Some(ix) => mask.select_rows(ix)?,
                None => mask.clone(),
            };
            if mask.dim() != (nrows, nfeatures) {
                anyhow::bail!(
                    "view {}: mask {:?} does not match Y {:?}",
                    m,
                    mask.dim(),
                    (nrows, nfeatures)
                );
            }
            Zip::from(&mut tau)
                .and(&mut y)
                .and(&mask)
                .for_each(|t, x, &missing| {
                    if missing {
                        *t = 0.0;
                        *x = 0.0;
                    }
                });
        }

        let w2 = w_m.e2()?.clone();
        let w = w_m.e;
        if w.dim() != (nfeatures, nfactors) || w2.dim() != w.dim() {
            anyhow::bail!(
                "view {}: W is {:?}, expected {:?}",
                m,
                w.dim(),
                (nfeatures, nfactors)
            );
        }

        ret.push(ViewData { y, tau, w, w2 });
    }
    Ok(ret)
}

/// Columns other than `k`
pub fn other_factors(k: usize, nfactors: usize) -> Vec<usize> {
    (0..nfactors).filter(|&j| j != k).collect()
}
