//! PuLID 运行配置

use std::path::PathBuf;

use strum_macros::{Display, EnumString};

/// PuLID 运行设备
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
pub enum PulidDevice {
    #[default]
    #[strum(to_string = "cuda")]
    Cuda,
    #[strum(to_string = "cpu")]
    Cpu,
}

/// 权重数据类型, 名称与 torch 属性一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
pub enum WeightDType {
    #[default]
    #[strum(to_string = "bfloat16")]
    BFloat16,
    #[strum(to_string = "float16")]
    Float16,
    #[strum(to_string = "float32")]
    Float32,
}

/// 人脸特征提取使用的 ONNX Runtime provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
pub enum OnnxProvider {
    #[default]
    #[strum(to_string = "gpu")]
    Gpu,
    #[strum(to_string = "cpu")]
    Cpu,
}

/// PuLID 配置
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PulidConfig {
    pub device: PulidDevice,
    pub weight_dtype: WeightDType,
    pub onnx_provider: OnnxProvider,
    /// 预训练权重路径, 为空时由 nunchaku 下载默认权重
    pub pretrained_model: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PulidConfig::default();

        assert_eq!(config.device.to_string(), "cuda");
        assert_eq!(config.weight_dtype.to_string(), "bfloat16");
        assert_eq!(config.onnx_provider.to_string(), "gpu");
        assert_eq!(config.pretrained_model, None);
    }

    #[test]
    fn test_parse_options() -> anyhow::Result<()> {
        assert_eq!("cpu".parse::<PulidDevice>()?, PulidDevice::Cpu);
        assert_eq!("float16".parse::<WeightDType>()?, WeightDType::Float16);
        assert_eq!("cpu".parse::<OnnxProvider>()?, OnnxProvider::Cpu);
        assert!("tpu".parse::<PulidDevice>().is_err());
        Ok(())
    }
}
