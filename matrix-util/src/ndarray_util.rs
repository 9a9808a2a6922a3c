pub use ndarray::prelude::*;
pub use rand::Rng;
pub use rand_distr::StandardNormal;
pub use rayon::prelude::*;

use crate::traits::*;
use num_traits::{Float, FromPrimitive};

impl<T> SampleOps for Array2<T>
where
    T: Float + FromPrimitive + Send,
{
    type Mat = Self;
    type Scalar = T;

    fn runif(dd: usize, nn: usize) -> Self::Mat {
        let rvec: Vec<T> = (0..(dd * nn))
            .into_par_iter()
            .map_init(rand::rng, |rng, _| {
                let x: f32 = rng.random();
                T::from_f32(x).unwrap_or_else(T::zero)
            })
            .collect();

        Array2::from_shape_vec((dd, nn), rvec).unwrap_or_else(|_| Array2::zeros((dd, nn)))
    }

    fn rnorm(dd: usize, nn: usize) -> Self::Mat {
        let rvec: Vec<T> = (0..(dd * nn))
            .into_par_iter()
            .map_init(rand::rng, |rng, _| {
                let x: f32 = rng.sample(StandardNormal);
                T::from_f32(x).unwrap_or_else(T::zero)
            })
            .collect();

        Array2::from_shape_vec((dd, nn), rvec).unwrap_or_else(|_| Array2::zeros((dd, nn)))
    }
}

fn check_bounds(idx: &[usize], len: usize, what: &str) -> anyhow::Result<()> {
    if let Some(&bad) = idx.iter().find(|&&i| i >= len) {
        anyhow::bail!("{} index {} out of range [0, {})", what, bad, len);
    }
    Ok(())
}

impl<T> SubsetOps for Array2<T>
where
    T: Clone,
{
    type Mat = Self;

    fn select_rows(&self, rows: &[usize]) -> anyhow::Result<Self::Mat> {
        check_bounds(rows, self.nrows(), "row")?;
        Ok(self.select(Axis(0), rows))
    }

    fn assign_rows(&mut self, rows: &[usize], src: &Self::Mat) -> anyhow::Result<()> {
        check_bounds(rows, self.nrows(), "row")?;
        if src.nrows() != rows.len() || src.ncols() != self.ncols() {
            anyhow::bail!(
                "cannot assign {} x {} into {} rows of a matrix with {} columns",
                src.nrows(),
                src.ncols(),
                rows.len(),
                self.ncols()
            );
        }
        for (src_row, &i) in src.rows().into_iter().zip(rows.iter()) {
            self.row_mut(i).assign(&src_row);
        }
        Ok(())
    }

    fn remove_along(&self, axis: Axis, idx: &[usize]) -> anyhow::Result<Self::Mat> {
        let len = self.len_of(axis);
        check_bounds(idx, len, "slice")?;
        let keep: Vec<usize> = (0..len).filter(|i| !idx.contains(i)).collect();
        Ok(self.select(axis, &keep))
    }
}

impl<T> MeltOps for Array2<T>
where
    T: Copy,
{
    type Scalar = T;

    fn melt(&self) -> Vec<Self::Scalar> {
        self.iter().copied().collect()
    }

    fn melt_with_indexes(&self) -> (Vec<Self::Scalar>, [Vec<usize>; 2]) {
        let mut values = Vec::with_capacity(self.len());
        let mut rows = Vec::with_capacity(self.len());
        let mut cols = Vec::with_capacity(self.len());
        for ((i, j), &x) in self.indexed_iter() {
            values.push(x);
            rows.push(i);
            cols.push(j);
        }
        (values, [rows, cols])
    }
}
