use crate::expectations::Expectations;

/// Whether the last update covered every row or only a minibatch.
/// The cache is replaced wholesale on every stochastic update.
#[derive(Debug, Clone, Default)]
pub enum BatchMode {
    #[default]
    FullBatch,
    MiniBatch {
        rows: Vec<usize>,
        cache: Expectations,
    },
}

impl BatchMode {
    pub fn is_mini_batch(&self) -> bool {
        matches!(self, BatchMode::MiniBatch { .. })
    }

    /// rows of the last minibatch
    pub fn rows(&self) -> Option<&[usize]> {
        match self {
            BatchMode::FullBatch => None,
            BatchMode::MiniBatch { rows, .. } => Some(rows),
        }
    }

    /// The cached minibatch expectations, or `full()` in full-batch
    /// mode
    pub fn current<F>(&self, full: F) -> Expectations
    where
        F: FnOnce() -> Expectations,
    {
        match self {
            BatchMode::FullBatch => full(),
            BatchMode::MiniBatch { cache, .. } => cache.clone(),
        }
    }

    /// Drop factor columns from the cache so it stays aligned with
    /// the parameters
    pub fn remove_columns(&mut self, idx: &[usize]) -> anyhow::Result<()> {
        if let BatchMode::MiniBatch { cache, .. } = self {
            *cache = cache.remove_columns(idx)?;
        }
        Ok(())
    }
}

/// Validated row selection of one update call
pub(crate) fn check_rows(ix: Option<&[usize]>, nrows: usize) -> anyhow::Result<()> {
    if let Some(ix) = ix {
        if ix.is_empty() {
            anyhow::bail!("empty minibatch");
        }
        if let Some(&bad) = ix.iter().find(|&&i| i >= nrows) {
            anyhow::bail!("minibatch row {} out of range [0, {})", bad, nrows);
        }
    }
    Ok(())
}

/// `x[ix, :]`, or a copy of `x` when there is no minibatch
pub(crate) fn restrict(
    x: &ndarray::Array2<f32>,
    ix: Option<&[usize]>,
) -> anyhow::Result<ndarray::Array2<f32>> {
    use matrix_util::traits::SubsetOps;
    match ix {
        Some(ix) => x.select_rows(ix),
        None => Ok(x.clone()),
    }
}
