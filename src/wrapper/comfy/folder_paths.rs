//! 文件夹路径
//!
//! ComfyUI folder_paths 的 Rust 实现, 只包含 LoRA 与扩散模型目录

use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use lazy_static::lazy_static;
use log::{error, warn};

use crate::{
    core::utils::directory::{filter_files_extensions, recursive_search},
    error::Error,
    wrapper::comfy::file_list_cache::{CacheEntry, FileListCache},
};

// 支持的模型文件扩展名
lazy_static! {
    static ref SUPPORTED_PT_EXTENSIONS: HashSet<&'static str> = HashSet::from([
        ".ckpt",
        ".pt",
        ".pt2",
        ".bin",
        ".pth",
        ".safetensors",
        ".pkl",
        ".sft",
    ]);
}

/// 文件夹路径配置结构体
#[allow(clippy::type_complexity)]
#[derive(Debug, Clone)]
pub struct FolderPaths {
    /// 基础路径
    base_path: PathBuf,
    /// 模型路径
    models_dir: PathBuf,
    /// 文件夹名称 -> (路径列表, 扩展名)
    folder_names_and_paths: BTreeMap<&'static str, (Vec<PathBuf>, HashSet<&'static str>)>,
}

impl Default for FolderPaths {
    /// ComfyUI 以安装目录作为工作目录启动
    fn default() -> Self {
        let base_path = std::env::current_dir().unwrap_or_else(|e| {
            warn!("get current directory failed, {e}");
            PathBuf::from(".")
        });
        Self::from_base_directory(base_path)
    }
}

impl FolderPaths {
    /// 从 ComfyUI 安装目录创建
    pub fn from_base_directory(base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        let models_dir = base_path.join("models");

        let mut folder_names_and_paths = BTreeMap::new();
        folder_names_and_paths.insert(
            "loras",
            (
                vec![models_dir.join("loras")],
                SUPPORTED_PT_EXTENSIONS.clone(),
            ),
        );
        folder_names_and_paths.insert(
            "diffusion_models",
            (
                vec![models_dir.join("unet"), models_dir.join("diffusion_models")],
                SUPPORTED_PT_EXTENSIONS.clone(),
            ),
        );

        Self {
            base_path,
            models_dir,
            folder_names_and_paths,
        }
    }

    /// 获取模型路径
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// 获取文件夹的搜索路径
    pub fn folder_paths(&self, folder_name: &str) -> Vec<PathBuf> {
        self.folder_names_and_paths
            .get(Self::map_legacy(folder_name))
            .map(|(paths, _)| paths.clone())
            .unwrap_or_default()
    }

    /// 旧文件夹名称映射
    pub fn map_legacy(folder_name: &str) -> &str {
        match folder_name {
            "unet" => "diffusion_models",
            _ => folder_name,
        }
    }
}

impl FolderPaths {
    /// 获取完整文件路径
    pub fn get_full_path(
        &self,
        folder_name: &str,
        filename: &str,
    ) -> Result<Option<PathBuf>, Error> {
        let folder_name = Self::map_legacy(folder_name);

        let (file_paths, _) = self
            .folder_names_and_paths
            .get(folder_name)
            .ok_or_else(|| Error::InvalidDirectory(format!("folder {folder_name} not found")))?;

        // 去掉开头的分隔符, 避免 join 覆盖基础路径
        let normalized_filename = filename.trim_start_matches(['/', '\\']);

        for file_path in file_paths {
            let full_path = file_path.join(normalized_filename);

            let Ok(metadata) = fs::symlink_metadata(&full_path) else {
                continue;
            };
            if metadata.is_file() {
                return Ok(Some(full_path));
            }
            if metadata.file_type().is_symlink() {
                if fs::metadata(&full_path).map(|m| m.is_file()).unwrap_or(false) {
                    return Ok(Some(full_path));
                }
                warn!(
                    "WARNING path {} exists but doesn't link anywhere, skipping.",
                    full_path.display()
                );
            }
        }

        Ok(None)
    }

    /// 获取完整文件路径, 不存在时返回 FileNotFound
    pub fn get_full_path_or_raise(
        &self,
        folder_name: &str,
        filename: &str,
    ) -> Result<PathBuf, Error> {
        self.get_full_path(folder_name, filename)?.ok_or_else(|| {
            Error::FileNotFound(format!(
                "Model in folder '{folder_name}' with filename '{filename}' not found."
            ))
        })
    }

    /// 获取文件名列表
    pub fn get_filename_list(&self, folder_name: &str) -> Vec<String> {
        let folder_name = Self::map_legacy(folder_name);
        let cache_key = format!("{}::{folder_name}", self.base_path.display());

        if let Some(entry) = self.cached_filename_list(&cache_key, folder_name) {
            return entry.files;
        }

        let entry = self.scan_filename_list(folder_name);
        if let Err(e) = FileListCache.set(cache_key, entry.clone()) {
            error!("Failed to update file list cache: {e}");
        }

        entry.files
    }

    /// 从缓存中获取文件列表
    fn cached_filename_list(&self, cache_key: &str, folder_name: &str) -> Option<CacheEntry> {
        let entry = match FileListCache.get(cache_key) {
            Ok(Some(entry)) => entry,
            Ok(None) | Err(_) => return None,
        };

        if !entry.is_valid() {
            return None;
        }

        // 检查是否有新增目录
        if let Some((dir_paths, _)) = self.folder_names_and_paths.get(folder_name) {
            for dir_path in dir_paths.iter().filter(|p| p.is_dir()) {
                if !entry
                    .dir_mtimes
                    .contains_key(&dir_path.to_string_lossy().to_string())
                {
                    return None;
                }
            }
        }

        Some(entry)
    }

    /// 扫描目录获取文件名列表
    fn scan_filename_list(&self, folder_name: &str) -> CacheEntry {
        let mut output_list = HashSet::new();
        let mut dir_mtimes = BTreeMap::new();

        if let Some((dir_paths, extensions)) = self.folder_names_and_paths.get(folder_name) {
            let extensions: Vec<&str> = extensions.iter().copied().collect();
            for dir_path in dir_paths {
                let (files, dirs) = recursive_search(dir_path, &[".git"]);
                dir_mtimes.extend(dirs);
                output_list.extend(filter_files_extensions(&files, &extensions));
            }
        }

        let mut files: Vec<String> = output_list.into_iter().collect();
        files.sort_unstable();

        CacheEntry { files, dir_mtimes }
    }
}
