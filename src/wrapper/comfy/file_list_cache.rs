//! 文件列表缓存
//!

use std::{
    collections::BTreeMap,
    path::Path,
    sync::{OnceLock, RwLock},
};

use log::error;

use crate::{core::utils::directory::get_mtime, error::Error};

// 全局文件列表缓存实例
static FILE_LIST_CACHE: OnceLock<RwLock<BTreeMap<String, CacheEntry>>> = OnceLock::new();

// 缓存项结构
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// 文件列表
    pub files: Vec<String>,
    /// 目录修改时间
    pub dir_mtimes: BTreeMap<String, f64>,
}

impl CacheEntry {
    /// 检查缓存是否有效
    ///
    /// 任一目录的修改时间变化即失效
    pub fn is_valid(&self) -> bool {
        for (folder, cached_time) in &self.dir_mtimes {
            let current_mtime = match get_mtime(Path::new(folder)) {
                Ok(v) => v,
                Err(e) => {
                    error!("get mtime failed, {folder}: {e}");
                    return false;
                }
            };
            if (current_mtime - cached_time).abs() > f64::EPSILON {
                return false;
            }
        }
        true
    }
}

// 文件列表缓存
pub struct FileListCache;

impl FileListCache {
    fn cache() -> &'static RwLock<BTreeMap<String, CacheEntry>> {
        FILE_LIST_CACHE.get_or_init(|| RwLock::new(BTreeMap::new()))
    }

    /// 更新文件名缓存
    pub fn set(&self, key: String, entry: CacheEntry) -> Result<(), Error> {
        let mut cache_guard = Self::cache()
            .write()
            .map_err(|e| Error::LockError(e.to_string()))?;
        cache_guard.insert(key, entry);
        Ok(())
    }

    /// 获取文件名缓存
    pub fn get(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        let cache_guard = Self::cache()
            .read()
            .map_err(|e| Error::LockError(e.to_string()))?;
        Ok(cache_guard.get(key).cloned())
    }
}
