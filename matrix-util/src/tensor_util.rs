use crate::traits::*;
use candle_core::{DType, Device, Tensor};
use ndarray::Array2;

impl ConvertMatOps for Array2<f32> {
    type Mat = Self;
    type Scalar = f32;

    fn from_tensor(tensor: &Tensor) -> anyhow::Result<Self::Mat> {
        let (nrow, ncol) = tensor.dims2()?;
        let data: Vec<f32> = tensor
            .to_device(&Device::Cpu)?
            .to_dtype(DType::F32)?
            .flatten_all()?
            .to_vec1()?;
        Ok(Array2::from_shape_vec((nrow, ncol), data)?)
    }

    fn to_tensor(&self, dev: &Device) -> anyhow::Result<Tensor> {
        let data: Vec<f32> = self.iter().copied().collect();
        Ok(Tensor::from_vec(data, self.dim(), dev)?)
    }
}
