use ndarray::Array2;
use rand::Rng;

pub trait Inference {
    type Mat;

    /// first moment `E[x]`
    fn posterior_mean(&self) -> &Self::Mat;

    /// second moment `E[x^2]`
    fn posterior_second_moment(&self) -> &Self::Mat;

    /// a single draw from the distribution
    fn posterior_sample<R: Rng + ?Sized>(&self, rng: &mut R) -> anyhow::Result<Self::Mat>;

    fn nrows(&self) -> usize;
    fn ncols(&self) -> usize;
}

/// A parameter matrix whose columns index latent factors. The
/// expectations are cached, so every write has to go through
/// `calibrate`.
pub trait FactorParam {
    fn calibrate(&mut self);

    /// Drop the columns `idx` from every parameter and expectation
    fn remove_columns(&mut self, idx: &[usize]) -> anyhow::Result<()>;

    /// (name, matrix) pairs of parameters and expectations, in a
    /// fixed order, for output
    fn named_matrices(&self) -> Vec<(&'static str, &Array2<f32>)>;
}
