//! LoRA 相关路径推导

use std::path::{Path, PathBuf};

use strum_macros::{Display, EnumString};

/// 基础模型权重文件名
pub const TRANSFORMER_BLOCKS_FILE: &str = "transformer_blocks.safetensors";

/// 转换后 LoRA 文件名前缀
pub const CONVERTED_PREFIX: &str = "svdq";

/// 量化精度
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
pub enum Precision {
    #[strum(to_string = "fp4")]
    Fp4,
    #[strum(to_string = "int4")]
    Int4,
}

impl Precision {
    /// 根据基础模型名称判断精度, 包含 `fp4` 即为 fp4, 否则 int4
    pub fn from_base_model_name(base_model_name: &str) -> Self {
        if base_model_name.contains("fp4") {
            Precision::Fp4
        } else {
            Precision::Int4
        }
    }
}

/// 基础模型权重路径
///
/// 优先使用 `<models_dir>/diffusion_models/<base_model_name>/transformer_blocks.safetensors`,
/// 本地不存在时作为远程仓库引用 `<base_model_name>/transformer_blocks.safetensors`,
/// 交给 nunchaku 自行下载
pub fn base_model_path(models_dir: &Path, base_model_name: &str) -> PathBuf {
    let local = models_dir
        .join("diffusion_models")
        .join(base_model_name)
        .join(TRANSFORMER_BLOCKS_FILE);
    if local.exists() {
        return local;
    }

    Path::new(base_model_name).join(TRANSFORMER_BLOCKS_FILE)
}

/// 转换后 LoRA 的保存路径
///
/// 与源文件同目录, 文件名为 `svdq-<precision>-<原文件名>`
pub fn converted_lora_path(lora_path: &Path, base_model_name: &str) -> Option<PathBuf> {
    let basename = lora_path.file_name()?.to_string_lossy();
    let precision = Precision::from_base_model_name(base_model_name);
    let converted_name = format!("{CONVERTED_PREFIX}-{precision}-{basename}");

    let dirname = lora_path.parent().unwrap_or_else(|| Path::new(""));
    Some(dirname.join(converted_name))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_precision_from_base_model_name() {
        assert_eq!(
            Precision::from_base_model_name("svdq-fp4-flux.1-dev"),
            Precision::Fp4
        );
        assert_eq!(
            Precision::from_base_model_name("svdq-int4-flux.1-dev"),
            Precision::Int4
        );
        assert_eq!(Precision::from_base_model_name(""), Precision::Int4);
    }

    #[test]
    fn test_converted_lora_path() {
        let path = converted_lora_path(
            Path::new("/models/loras/my_lora.safetensors"),
            "svdq-fp4-flux.1-dev",
        );
        assert_eq!(
            path,
            Some(PathBuf::from("/models/loras/svdq-fp4-my_lora.safetensors"))
        );

        let path = converted_lora_path(Path::new("my_lora.safetensors"), "svdq-int4-flux.1-dev");
        assert_eq!(path, Some(PathBuf::from("svdq-int4-my_lora.safetensors")));

        assert_eq!(converted_lora_path(Path::new("/"), "fp4"), None);
    }

    #[test]
    fn test_base_model_path_local() -> anyhow::Result<()> {
        let models_dir = tempfile::tempdir()?;
        let base_dir = models_dir
            .path()
            .join("diffusion_models/svdq-int4-flux.1-dev");
        fs::create_dir_all(&base_dir)?;
        fs::write(base_dir.join(TRANSFORMER_BLOCKS_FILE), b"")?;

        let path = base_model_path(models_dir.path(), "svdq-int4-flux.1-dev");
        assert_eq!(path, base_dir.join(TRANSFORMER_BLOCKS_FILE));
        Ok(())
    }

    #[test]
    fn test_base_model_path_remote_fallback() -> anyhow::Result<()> {
        let models_dir = tempfile::tempdir()?;

        let path = base_model_path(models_dir.path(), "mit-han-lab/svdq-int4-flux.1-dev");
        assert_eq!(
            path,
            PathBuf::from("mit-han-lab/svdq-int4-flux.1-dev/transformer_blocks.safetensors")
        );
        Ok(())
    }
}
