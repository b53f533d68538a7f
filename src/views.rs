// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 视图根目录
//!
//! 静态文件与模板响应里的文件名都相对于同一个视图根目录解析。解析结果必须
//! 留在根目录之内：绝对路径、`..` 分量以及通过符号链接逃出根目录的路径一律拒绝。

use std::{
    fs,
    path::{Component, Path, PathBuf},
    sync::Mutex,
};

use bytes::Bytes;
use log::{debug, warn};

use crate::{
    cache::ViewCache,
    exception::{Exception, Result},
};

pub struct Views {
    root: PathBuf,
    cache: Mutex<ViewCache>,
}

impl Views {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_cache_capacity(root, 0)
    }

    pub fn with_cache_capacity(root: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            root: root.into(),
            cache: Mutex::new(ViewCache::from_capacity(capacity)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 把视图名解析成根目录下真实存在的文件路径。
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name.trim_start_matches('/'));
        if relative.as_os_str().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            warn!("拒绝越出视图根目录的路径：{}", name);
            return Err(Exception::InvalidPath(name.to_string()));
        }

        let root = fs::canonicalize(&self.root)
            .map_err(|_| Exception::ViewNotFound(name.to_string()))?;
        let full = match fs::canonicalize(root.join(relative)) {
            Ok(p) => p,
            Err(_) => return Err(Exception::ViewNotFound(name.to_string())),
        };
        if !full.starts_with(&root) {
            warn!("视图{}经符号链接指向根目录之外：{}", name, full.display());
            return Err(Exception::InvalidPath(name.to_string()));
        }
        if !full.is_file() {
            return Err(Exception::ViewNotFound(name.to_string()));
        }
        Ok(full)
    }

    /// 读取视图文件内容，未修改的文件直接从缓存返回。
    pub fn load(&self, name: &str) -> Result<(PathBuf, Bytes)> {
        let path = self.resolve(name)?;
        let modified = fs::metadata(&path)?.modified()?;

        let mut cache = match self.cache.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("视图缓存锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        };
        if let Some(bytes) = cache.find(&path, modified) {
            debug!("视图缓存命中：{}", path.display());
            return Ok((path, bytes));
        }
        let bytes = Bytes::from(fs::read(&path)?);
        cache.push(&path, bytes.clone(), modified);
        debug!("视图已读取并缓存：{}（{}字节）", path.display(), bytes.len());
        Ok((path, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn views_with(files: &[(&str, &str)]) -> (TempDir, Views) {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let views = Views::new(dir.path());
        (dir, views)
    }

    #[test]
    fn test_resolve_inside_root() {
        let (_dir, views) = views_with(&[("css/app.css", "body{}")]);
        let path = views.resolve("css/app.css").unwrap();
        assert!(path.ends_with("css/app.css"));
        assert!(views.resolve("/css/app.css").is_ok());
    }

    #[test]
    fn test_rejects_traversal() {
        let (_dir, views) = views_with(&[("index.html", "")]);
        for name in ["../secret", "css/../../etc/passwd", "..", ""] {
            assert!(
                matches!(views.resolve(name), Err(Exception::InvalidPath(_))),
                "{} should be rejected",
                name
            );
        }
    }

    /// 根目录内的符号链接指向根目录之外
    #[cfg(unix)]
    #[test]
    fn test_rejects_symlink_escape() {
        let outside = TempDir::new().unwrap();
        let secret = outside.path().join("secret.txt");
        fs::write(&secret, "top secret").unwrap();

        let (dir, views) = views_with(&[("index.html", "")]);
        std::os::unix::fs::symlink(&secret, dir.path().join("link")).unwrap();

        assert!(matches!(views.resolve("link"), Err(Exception::InvalidPath(_))));
        assert!(matches!(views.load("link"), Err(Exception::InvalidPath(_))));
    }

    #[test]
    fn test_missing_file() {
        let (_dir, views) = views_with(&[]);
        assert!(matches!(views.resolve("missing"), Err(Exception::ViewNotFound(_))));
    }

    #[test]
    fn test_directory_is_not_a_view() {
        let (_dir, views) = views_with(&[("sub/a.txt", "a")]);
        assert!(matches!(views.resolve("sub"), Err(Exception::ViewNotFound(_))));
    }

    #[test]
    fn test_load_reads_contents() {
        let (_dir, views) = views_with(&[("hello.txt", "hello")]);
        let (_, first) = views.load("hello.txt").unwrap();
        let (_, second) = views.load("hello.txt").unwrap();
        assert_eq!(first, Bytes::from("hello"));
        assert_eq!(first, second);
    }
}
