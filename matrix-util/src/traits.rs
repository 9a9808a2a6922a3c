use crate::common_io::Delimiter;
use candle_core::Device;
use candle_core::Tensor;
use ndarray::Axis;

/// Reading off from `Tensor`
pub trait ConvertMatOps {
    type Mat;
    type Scalar;

    fn from_tensor(_: &Tensor) -> anyhow::Result<Self::Mat>;
    fn to_tensor(&self, dev: &Device) -> anyhow::Result<Tensor>;
}

/// Operations to sample random matrices
pub trait SampleOps {
    type Mat;
    type Scalar;

    /// Sample a matrix from a uniform distribution `U(0,1)`
    fn runif(dd: usize, nn: usize) -> Self::Mat;

    /// Sample a matrix from a normal distribution `N(0,1)`
    fn rnorm(dd: usize, nn: usize) -> Self::Mat;
}

/// Take, overwrite, or drop slices along an axis. Every index is
/// checked against the matrix shape, so a bad index becomes an error
/// instead of a panic.
pub trait SubsetOps {
    type Mat;

    /// `self[rows, :]`
    fn select_rows(&self, rows: &[usize]) -> anyhow::Result<Self::Mat>;

    /// `self[rows, :] = src`
    fn assign_rows(&mut self, rows: &[usize], src: &Self::Mat) -> anyhow::Result<()>;

    /// Drop the slices `idx` along `axis`; the rest keep their order
    fn remove_along(&self, axis: Axis, idx: &[usize]) -> anyhow::Result<Self::Mat>;

    /// Drop the columns `idx`
    fn remove_columns(&self, idx: &[usize]) -> anyhow::Result<Self::Mat> {
        self.remove_along(Axis(1), idx)
    }
}

/// Long format: one entry per element with its (row, column)
pub trait MeltOps {
    type Scalar;

    /// values in row-major order
    fn melt(&self) -> Vec<Self::Scalar>;

    /// values in row-major order and `[row indexes, column indexes]`
    fn melt_with_indexes(&self) -> (Vec<Self::Scalar>, [Vec<usize>; 2]);
}

/// Read and write matrices from and to files
pub trait IoOps {
    type Scalar;
    type Mat;

    fn read_file_delim(
        file: &str,
        delim: impl Into<Delimiter>,
        skip: Option<usize>,
    ) -> anyhow::Result<Self::Mat>;

    fn from_tsv(tsv_file: &str, skip: Option<usize>) -> anyhow::Result<Self::Mat> {
        Self::read_file_delim(tsv_file, "\t", skip)
    }

    fn write_file_delim(&self, file: &str, delim: &str) -> anyhow::Result<()>;

    fn to_tsv(&self, tsv_file: &str) -> anyhow::Result<()> {
        self.write_file_delim(tsv_file, "\t")
    }

    fn to_csv(&self, csv_file: &str) -> anyhow::Result<()> {
        self.write_file_delim(csv_file, ",")
    }
}
