//! 类型定义
//! 相关节点定义: ComfyUI/comfy/comfy_types/node_typing.py

pub const NODE_FLOAT: &str = "FLOAT";
pub const NODE_IMAGE: &str = "IMAGE";
pub const NODE_MODEL: &str = "MODEL";
