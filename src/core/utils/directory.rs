//! 目录操作

use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};

use walkdir::{DirEntry, WalkDir};

use crate::error::Error;

/// 递归搜索目录
///
/// 返回 (相对文件路径列表, 目录修改时间)
pub fn recursive_search(
    directory: &Path,
    excluded_dir_names: &[&str],
) -> (Vec<String>, BTreeMap<String, f64>) {
    let mut files = Vec::new();
    let mut dirs = BTreeMap::new();

    if !directory.is_dir() {
        return (files, dirs);
    }

    let walker = WalkDir::new(directory)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(e, excluded_dir_names));

    for entry in walker.filter_map(|e| e.ok()) {
        if entry.file_type().is_file() {
            if let Ok(rel_path) = entry.path().strip_prefix(directory)
                && let Some(rel_str) = rel_path.to_str()
            {
                // ComfyUI 下拉列表统一使用 '/' 分隔
                files.push(rel_str.replace('\\', "/"));
            }
        } else if entry.file_type().is_dir()
            && let Some(path) = entry.path().to_str()
            && let Ok(mtime) = get_mtime(entry.path())
        {
            dirs.insert(path.to_string(), mtime);
        }
    }

    (files, dirs)
}

/// 检查是否为排除目录
fn is_excluded_dir(entry: &DirEntry, excluded_names: &[&str]) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }

    entry
        .file_name()
        .to_str()
        .map(|name| excluded_names.contains(&name))
        .unwrap_or(false)
}

/// 过滤文件扩展名
pub fn filter_files_extensions(files: &[String], extensions: &[&str]) -> Vec<String> {
    if extensions.is_empty() {
        return files.to_vec();
    }

    let normalized_exts: Vec<String> = extensions
        .iter()
        .map(|ext| ext.trim_start_matches('.').to_lowercase())
        .collect();

    files
        .iter()
        .filter(|file| {
            Path::new(file)
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| normalized_exts.iter().any(|e| *e == ext.to_lowercase()))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

/// 列出多个目录下的一级子目录名称
///
/// 跳过不存在的目录和以 '.' 开头的隐藏目录, 结果去重并排序
pub fn list_subdirectories(prefixes: &[PathBuf]) -> Vec<String> {
    let mut names = BTreeSet::new();

    for prefix in prefixes {
        let Ok(entries) = std::fs::read_dir(prefix) else {
            continue;
        };

        for entry in entries.filter_map(|e| e.ok()) {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') || !entry.path().is_dir() {
                continue;
            }
            names.insert(name);
        }
    }

    names.into_iter().collect()
}

/// 获取修改时间
pub fn get_mtime(path: &Path) -> Result<f64, Error> {
    let metadata = std::fs::metadata(path)?;
    let mtime = metadata
        .modified()?
        .duration_since(UNIX_EPOCH)?
        .as_secs_f64();
    Ok(mtime)
}
