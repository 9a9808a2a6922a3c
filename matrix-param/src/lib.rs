pub mod io;
pub mod ndarray_gaussian;
pub mod ndarray_spike_slab;
pub mod traits;

pub use ndarray_gaussian::GaussianMatrix;
pub use ndarray_spike_slab::{SpikeSlabMatrix, SpikeSlabParams};
