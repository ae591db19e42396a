//! 公共库
//!
//! 相关节点定义: ComfyUI/comfy/comfy_types/node_typing.py

pub mod category;
pub mod model_identity;
pub mod node;
pub mod node_base;
pub mod utils;
