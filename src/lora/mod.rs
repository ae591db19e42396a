//! LoRA 加载、格式转换与缓存

mod loader;
pub use loader::{
    LORA_NONE, LoraConverter, LoraLoader, LoraLocator, LoraParams, LoraRequest, LoraSelection,
    LoraTarget, SaveMode,
};

mod path;
pub use path::{Precision, base_model_path, converted_lora_path};
