//! Dense linear algebra used by the factor updates.
//!
//! Each node owns one [`Backend`]. The default is plain `ndarray` on
//! the host; `Candle` runs the matrix products on a candle `Device`
//! (CPU, CUDA or Metal) and brings the results back to the host.

use candle_core::{Device, Tensor};
use clap::{Args, ValueEnum};
use log::{info, warn};
use matrix_util::traits::ConvertMatOps;
use ndarray::prelude::*;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[clap(rename_all = "lowercase")]
pub enum ComputeDevice {
    #[default]
    Cpu,
    Cuda,
    Metal,
}

/// Options consumed by `precompute`
#[derive(Args, Debug, Clone)]
pub struct NodeOptions {
    /// Device for the dense matrix products; `cpu` keeps everything
    /// in ndarray
    #[arg(long, value_enum, default_value = "cpu")]
    pub device: ComputeDevice,

    /// Accelerator ordinal
    #[arg(long, default_value_t = 0)]
    pub device_no: usize,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            device: ComputeDevice::Cpu,
            device_no: 0,
        }
    }
}

impl NodeOptions {
    /// Map a plain on/off accelerator switch
    pub fn from_gpu_mode(gpu_mode: bool) -> Self {
        let device = if !gpu_mode {
            ComputeDevice::Cpu
        } else if cfg!(target_os = "macos") {
            ComputeDevice::Metal
        } else {
            ComputeDevice::Cuda
        };
        Self {
            device,
            device_no: 0,
        }
    }

    pub fn gpu_mode(&self) -> bool {
        self.device != ComputeDevice::Cpu
    }
}

/// A matrix living on a backend
#[derive(Debug, Clone)]
pub enum DenseArray {
    Host(Array2<f32>),
    Device(Tensor),
}

#[derive(Debug, Clone, Default)]
pub enum Backend {
    #[default]
    Ndarray,
    Candle(Device),
}

impl Backend {
    /// Resolve the backend for `options`, falling back to the host
    /// when the accelerator cannot be opened
    pub fn from_options(options: &NodeOptions) -> Self {
        let device = match options.device {
            ComputeDevice::Cpu => return Backend::Ndarray,
            ComputeDevice::Cuda => Device::new_cuda(options.device_no),
            ComputeDevice::Metal => Device::new_metal(options.device_no),
        };
        match device {
            Ok(dev) => {
                info!("dense backend: {:?}", dev);
                Backend::Candle(dev)
            }
            Err(e) => {
                warn!("{:?} unavailable ({}); staying on ndarray", options.device, e);
                Backend::Ndarray
            }
        }
    }

    /// array construction on this backend
    pub fn array(&self, x: ArrayView2<f32>) -> anyhow::Result<DenseArray> {
        match self {
            Backend::Ndarray => Ok(DenseArray::Host(x.to_owned())),
            Backend::Candle(dev) => {
                let x = x.as_standard_layout().to_owned();
                Ok(DenseArray::Device(x.to_tensor(dev)?))
            }
        }
    }

    /// `a * b` on this backend
    pub fn dot(&self, a: &DenseArray, b: &DenseArray) -> anyhow::Result<DenseArray> {
        match (a, b) {
            (DenseArray::Host(a), DenseArray::Host(b)) => {
                if a.ncols() != b.nrows() {
                    anyhow::bail!("cannot multiply {:?} by {:?}", a.dim(), b.dim());
                }
                Ok(DenseArray::Host(a.dot(b)))
            }
            (DenseArray::Device(a), DenseArray::Device(b)) => {
                Ok(DenseArray::Device(a.matmul(b)?))
            }
            _ => anyhow::bail!("operands live on different backends"),
        }
    }

    /// host transfer
    pub fn to_host(&self, x: DenseArray) -> anyhow::Result<Array2<f32>> {
        match x {
            DenseArray::Host(x) => Ok(x),
            DenseArray::Device(x) => Array2::<f32>::from_tensor(&x),
        }
    }

    /// `a * b` for host matrices, computed on this backend
    pub fn matmul(&self, a: ArrayView2<f32>, b: ArrayView2<f32>) -> anyhow::Result<Array2<f32>> {
        let prod = self.dot(&self.array(a)?, &self.array(b)?)?;
        self.to_host(prod)
    }

    /// `a * v` for a host matrix and vector
    pub fn matvec(&self, a: ArrayView2<f32>, v: ArrayView1<f32>) -> anyhow::Result<Array1<f32>> {
        let prod = self.matmul(a, v.insert_axis(Axis(1)))?;
        Ok(prod.column(0).to_owned())
    }
}
