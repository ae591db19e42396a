//! ComfyUI comfy 包
pub mod file_list_cache;
pub mod folder_paths;
