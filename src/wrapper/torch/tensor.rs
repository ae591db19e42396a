//! torch.Tensor 与 candle Tensor 互转
//! 依赖:
//! - python: torch, numpy

use std::marker::PhantomData;

use candle_core::{Device, Tensor, WithDType};
use numpy::{
    Element, IntoPyArray, PyArrayDyn, PyArrayMethods, PyUntypedArrayMethods,
    ndarray::{ArrayD, IxDyn},
};
use pyo3::{Bound, PyAny, Python, types::PyAnyMethods};

use crate::error::Error;

pub struct TensorWrapper<T>
where
    T: Element + WithDType,
{
    tensor: Tensor,
    _marker: PhantomData<T>,
}

impl<T> TensorWrapper<T>
where
    T: Element + WithDType,
{
    /// 从 Python torch.Tensor 创建
    pub fn new(py_any: &Bound<'_, PyAny>, device: &Device) -> Result<Self, Error> {
        let tensor = Self::torch_to_candle(py_any, device)?;
        Ok(Self::from_tensor(tensor))
    }

    pub fn from_tensor(tensor: Tensor) -> Self {
        Self {
            tensor,
            _marker: PhantomData,
        }
    }

    /// The dimension size for this tensor on each axis.
    pub fn dims(&self) -> &[usize] {
        self.tensor.dims()
    }

    pub fn into_tensor(self) -> Tensor {
        self.tensor
    }

    /// 从 Python torch.Tensor 转为 candle Tensor
    ///
    /// 先移动到 CPU, 按逻辑顺序读取, 不要求内存连续
    fn torch_to_candle(torch_tensor: &Bound<'_, PyAny>, device: &Device) -> Result<Tensor, Error> {
        let np = torch_tensor
            .call_method0("detach")?
            .call_method0("cpu")?
            .call_method0("numpy")?;

        let arr = np
            .downcast::<PyArrayDyn<T>>()
            .map_err(|e| Error::PyDowncastError(e.to_string()))?;

        let shape = arr.shape().to_vec();
        let data: Vec<T> = arr.readonly().as_array().iter().copied().collect();

        Ok(Tensor::from_vec(data, shape, device)?)
    }
}

/// 将扁平数据按形状转为 numpy 数组
pub fn to_ndarray<'py, T: Element>(
    py: Python<'py>,
    shape: &[usize],
    data: Vec<T>,
) -> Result<Bound<'py, PyArrayDyn<T>>, Error> {
    let array = ArrayD::from_shape_vec(IxDyn(shape), data)
        .map_err(|e| Error::InvalidTensorShape(e.to_string()))?;
    Ok(array.into_pyarray(py))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore]
    fn test_torch_image_to_candle() -> anyhow::Result<()> {
        Python::initialize();
        Python::attach(|py| -> anyhow::Result<()> {
            let torch = py.import("torch")?;
            let image = torch.getattr("rand")?.call1((1, 8, 6, 3))?;

            let wrapper = TensorWrapper::<f32>::new(&image, &Device::Cpu)?;
            assert_eq!(wrapper.dims(), &[1, 8, 6, 3]);
            Ok(())
        })
    }

    #[test]
    #[ignore]
    fn test_to_ndarray_shape() -> anyhow::Result<()> {
        Python::initialize();
        Python::attach(|py| -> anyhow::Result<()> {
            let array = to_ndarray(py, &[2, 2, 3], vec![0u8; 12])?;
            assert_eq!(array.shape(), &[2, 2, 3]);

            let result = to_ndarray(py, &[2, 2], vec![0u8; 3]);
            assert!(matches!(result, Err(Error::InvalidTensorShape(_))));
            Ok(())
        })
    }
}
