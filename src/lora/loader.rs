//! LoRA 加载与缓存
//!
//! 节点每次执行都会调用 [`LoraLoader::load`]. LoRA 选择未变化时只更新强度,
//! 选择变化时才会重新解析文件、判断格式并在需要时转换.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use strum_macros::{Display, EnumString};

use crate::{
    core::model_identity::ModelIdentity,
    error::Error,
    lora::path::{base_model_path, converted_lora_path},
    wrapper::comfy::folder_paths::FolderPaths,
};

/// 表示未选择 LoRA 的下拉选项
pub const LORA_NONE: &str = "None";

/// LoRA 选择
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoraSelection {
    #[default]
    None,
    Named(String),
}

impl From<&str> for LoraSelection {
    fn from(name: &str) -> Self {
        if name == LORA_NONE {
            LoraSelection::None
        } else {
            LoraSelection::Named(name.to_string())
        }
    }
}

impl fmt::Display for LoraSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoraSelection::None => write!(f, "{LORA_NONE}"),
            LoraSelection::Named(name) => write!(f, "{name}"),
        }
    }
}

/// 是否保存转换后的 LoRA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display)]
pub enum SaveMode {
    #[default]
    #[strum(to_string = "disable")]
    Disable,
    #[strum(to_string = "enable")]
    Enable,
}

/// 传给模型的 LoRA 参数
#[derive(Debug, Clone, PartialEq)]
pub enum LoraParams<S> {
    /// 已经是 nunchaku 格式, 直接传文件路径
    Path(PathBuf),
    /// 转换后的参数
    Converted(S),
}

/// 单次加载请求
#[derive(Debug, Clone, PartialEq)]
pub struct LoraRequest {
    pub lora_name: LoraSelection,
    pub base_model_name: String,
    pub lora_strength: f64,
    pub save_mode: SaveMode,
}

/// LoRA 格式检测与转换
pub trait LoraConverter {
    type State;

    /// 是否已经是 nunchaku 格式
    fn is_native_format(&self, lora_path: &Path) -> Result<bool, Error>;

    /// 转换为 nunchaku 格式, `output_path` 不为空时同时保存
    fn convert(
        &self,
        lora_path: &Path,
        base_model_path: &Path,
        output_path: Option<&Path>,
    ) -> Result<Self::State, Error>;
}

/// 被修改的扩散模型
pub trait LoraTarget: ModelIdentity {
    type State;

    fn set_lora_strength(&self, strength: f64) -> Result<(), Error>;

    fn update_lora_params(&self, params: LoraParams<Self::State>) -> Result<(), Error>;
}

/// LoRA 文件定位
pub trait LoraLocator {
    /// 在 loras 目录中查找, 找不到返回 [`Error::FileNotFound`]
    fn lora_path(&self, lora_name: &str) -> Result<PathBuf, Error>;

    /// 模型根目录
    fn models_dir(&self) -> PathBuf;
}

impl LoraLocator for FolderPaths {
    fn lora_path(&self, lora_name: &str) -> Result<PathBuf, Error> {
        self.get_full_path_or_raise("loras", lora_name)
    }

    fn models_dir(&self) -> PathBuf {
        self.models_dir().to_path_buf()
    }
}

/// 最近一次成功应用的 LoRA
#[derive(Debug)]
struct LoraCache<H> {
    model: Option<H>,
    selection: LoraSelection,
}

/// LoRA 加载器, 每个节点实例持有一个
///
/// `H` 为模型句柄类型, 见 [`ModelIdentity`]
#[derive(Debug)]
pub struct LoraLoader<H> {
    cache: LoraCache<H>,
}

impl<H> Default for LoraLoader<H> {
    fn default() -> Self {
        Self {
            cache: LoraCache {
                model: None,
                selection: LoraSelection::None,
            },
        }
    }
}

impl<H> LoraLoader<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前已应用的 LoRA
    pub fn current(&self) -> &LoraSelection {
        &self.cache.selection
    }

    /// 应用 LoRA 到模型
    ///
    /// 出错时缓存保持不变
    pub fn load<C, L, T>(
        &mut self,
        converter: &C,
        locator: &L,
        target: &T,
        request: &LoraRequest,
    ) -> Result<(), Error>
    where
        C: LoraConverter,
        L: LoraLocator,
        T: LoraTarget<State = C::State, Handle = H>,
    {
        let same_model = self
            .cache
            .model
            .as_ref()
            .is_some_and(|handle| target.is_same_model(handle));

        match (&self.cache.selection, &request.lora_name) {
            (LoraSelection::None, LoraSelection::None) => {
                debug!("lora is None, nothing to do");
                return Ok(());
            }
            (current, requested) if current == requested && same_model => {
                debug!(
                    "lora {requested} unchanged, set strength {}",
                    request.lora_strength
                );
                target.set_lora_strength(request.lora_strength)?;
                return Ok(());
            }
            (_, LoraSelection::None) => {
                info!("lora removed, set strength 0");
                target.set_lora_strength(0.0)?;
            }
            (_, LoraSelection::Named(lora_name)) => {
                if !same_model && self.cache.model.is_some() {
                    debug!("model changed, reapply lora {lora_name}");
                }
                let params = Self::prepare_params(converter, locator, lora_name, request)?;
                target.update_lora_params(params)?;
                target.set_lora_strength(request.lora_strength)?;
            }
        }

        self.cache = LoraCache {
            model: Some(target.handle()?),
            selection: request.lora_name.clone(),
        };
        Ok(())
    }

    /// 解析 LoRA 文件并在需要时转换
    fn prepare_params<C: LoraConverter>(
        converter: &C,
        locator: &impl LoraLocator,
        lora_name: &str,
        request: &LoraRequest,
    ) -> Result<LoraParams<C::State>, Error> {
        let lora_path = match locator.lora_path(lora_name) {
            Ok(path) => path,
            Err(Error::FileNotFound(e)) => {
                warn!("{e}, use lora name as path");
                PathBuf::from(lora_name)
            }
            Err(e) => return Err(e),
        };

        if converter.is_native_format(&lora_path)? {
            info!("lora {} is in nunchaku format", lora_path.display());
            return Ok(LoraParams::Path(lora_path));
        }

        let base_model_path = base_model_path(&locator.models_dir(), &request.base_model_name);
        let output_path = match request.save_mode {
            SaveMode::Enable => {
                let output_path = converted_lora_path(&lora_path, &request.base_model_name);
                if output_path.is_none() {
                    warn!(
                        "cannot derive save path from {}, converted lora will not be saved",
                        lora_path.display()
                    );
                }
                output_path
            }
            SaveMode::Disable => None,
        };

        info!(
            "converting lora {} with base model {}",
            lora_path.display(),
            base_model_path.display()
        );
        let state = converter.convert(&lora_path, &base_model_path, output_path.as_deref())?;
        if let Some(output_path) = &output_path {
            info!("converted lora saved to {}", output_path.display());
        }

        Ok(LoraParams::Converted(state))
    }
}
