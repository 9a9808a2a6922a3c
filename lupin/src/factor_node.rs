use crate::backend::NodeOptions;
use crate::expectations::Expectations;
use crate::markov_blanket::Node;
use ndarray::Axis;

/// Latent factor matrix (samples x factors) updated by coordinate
/// ascent. The training loop calls `update_parameters` once per
/// iteration, `calculate_elbo` to monitor convergence, and
/// `remove_factors` to prune inactive factors.
pub trait FactorNode: Node {
    /// (number of samples, number of factors)
    fn dim(&self) -> (usize, usize);

    /// Axis indexing the latent factors
    fn factors_axis(&self) -> Axis {
        Axis(1)
    }

    /// Select the dense backend
    fn precompute(&mut self, options: &NodeOptions) -> anyhow::Result<()>;

    /// Closed-form update of the variational parameters.
    ///
    /// * `ix` - minibatch rows (`None` = every row)
    /// * `ro` - step size in (0, 1] (`None` = 1, full replacement)
    fn update_parameters(&mut self, ix: Option<&[usize]>, ro: Option<f32>) -> anyhow::Result<()>;

    /// This node's contribution to the evidence lower bound
    fn calculate_elbo(&self) -> anyhow::Result<f64>;

    /// Drop the factors `idx` along `axis` from every prior,
    /// posterior and cached array
    fn remove_factors(&mut self, idx: &[usize], axis: Axis) -> anyhow::Result<()>;

    /// Expectations of the last minibatch, or of every row
    fn get_mini_batch(&self) -> Expectations;
}

/// Check pruning indices up front so that the removal itself cannot
/// fail halfway
pub(crate) fn check_factor_indices(
    idx: &[usize],
    axis: Axis,
    factors_axis: Axis,
    nfactors: usize,
) -> anyhow::Result<Vec<usize>> {
    if axis != factors_axis {
        anyhow::bail!(
            "factors live on axis {}, not {}",
            factors_axis.index(),
            axis.index()
        );
    }
    let mut idx = idx.to_vec();
    idx.sort_unstable();
    idx.dedup();
    if let Some(&bad) = idx.iter().find(|&&k| k >= nfactors) {
        anyhow::bail!("factor {} out of range [0, {})", bad, nfactors);
    }
    if idx.len() == nfactors {
        anyhow::bail!("cannot remove all {} factors", nfactors);
    }
    Ok(idx)
}
