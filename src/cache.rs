// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use lru::LruCache;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(16) {
    Some(n) => n,
    None => unreachable!(),
};

#[derive(Clone)]
struct CacheEntry {
    content: Bytes,
    modified_time: SystemTime,
}

/// 视图文件内容缓存，以修改时间判断条目是否仍然有效。
pub struct ViewCache {
    cache: LruCache<PathBuf, CacheEntry>,
}

impl ViewCache {
    // 容量为0时使用默认容量
    pub fn from_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);
        Self {
            cache: LruCache::new(capacity),
        }
    }

    pub fn push(&mut self, path: &Path, content: Bytes, modified_time: SystemTime) {
        let entry = CacheEntry {
            content,
            modified_time,
        };
        self.cache.put(path.to_path_buf(), entry);
    }

    // 文件在缓存之后被修改过则视为未命中
    pub fn find(&mut self, path: &Path, current_modified_time: SystemTime) -> Option<Bytes> {
        match self.cache.get(path) {
            Some(entry) if entry.modified_time == current_modified_time => {
                Some(entry.content.clone())
            }
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cache_creation() {
        let cache = ViewCache::from_capacity(10);
        assert_eq!(cache.capacity(), 10);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_uses_default() {
        let cache = ViewCache::from_capacity(0);
        assert_eq!(cache.capacity(), DEFAULT_CAPACITY.get());
    }

    #[test]
    fn test_modified_time_invalidation() {
        let mut cache = ViewCache::from_capacity(3);
        let time1 = SystemTime::now();
        let time2 = time1 + Duration::from_secs(10);
        let path = Path::new("views/index.html");

        cache.push(path, Bytes::from("<h1>hi</h1>"), time1);

        assert!(cache.find(path, time2).is_none());
        assert_eq!(cache.find(path, time1).unwrap(), Bytes::from("<h1>hi</h1>"));
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = ViewCache::from_capacity(2);
        let time = SystemTime::now();

        cache.push(Path::new("a"), Bytes::from("a"), time);
        cache.push(Path::new("b"), Bytes::from("b"), time);
        cache.find(Path::new("a"), time);
        cache.push(Path::new("c"), Bytes::from("c"), time);

        assert_eq!(cache.len(), 2);
        assert!(cache.find(Path::new("b"), time).is_none());
        assert!(cache.find(Path::new("a"), time).is_some());
        assert!(cache.find(Path::new("c"), time).is_some());
    }
}
