//! ComfyUI IMAGE 张量转 8 位像素数组
//!
use candle_core::{DType, Device, Tensor};

use crate::error::Error;

/// 8 位像素数组
#[derive(Debug, Clone, PartialEq)]
pub struct PixelArray {
    /// 去掉单维度后的形状, 单张图片为 HWC
    pub shape: Vec<usize>,
    pub data: Vec<u8>,
}

/// 将张量转换为 8 位像素
///
/// samples: NHWC, 取值 [0, 1]
///
/// 去掉所有长度为 1 的维度, 缩放到 [0, 255], 截断为 u8
pub fn image_to_pixels(samples: &Tensor) -> Result<PixelArray, Error> {
    let shape: Vec<usize> = samples
        .dims()
        .iter()
        .copied()
        .filter(|&d| d != 1)
        .collect();

    let values = samples
        .to_device(&Device::Cpu)?
        .to_dtype(DType::F32)?
        .flatten_all()?
        .to_vec1::<f32>()?;

    // 数值处理 (缩放 + clip + 类型转换)
    let data: Vec<u8> = values
        .iter()
        .map(|&x| (255.0 * x).clamp(0.0, 255.0) as u8)
        .collect();

    Ok(PixelArray { shape, data })
}
