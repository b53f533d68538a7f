// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 后台任务池
//!
//! 处理函数运行在阻塞线程池上，可以把耗时的后续工作（发信、清理等）交给
//! [`WorkerPool`]。池的并发上限由 `queue.workers` 决定，满载时不排队，直接返回
//! [`Exception::PoolSaturated`]，由调用方决定是否改为同步执行。

use std::sync::Arc;

use log::{debug, warn};
use tokio::{runtime::Handle, sync::Semaphore};

use crate::exception::{Exception, Result};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// 有界的后台任务池，可在多个处理函数之间克隆共享。
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    workers: usize,
    handle: Handle,
}

impl WorkerPool {
    pub fn new(workers: usize, handle: Handle) -> Self {
        let workers = if workers == 0 {
            warn!("任务池的工作者数量被设置为0，这是不允许的。工作者数量将被设置为1。");
            1
        } else {
            workers
        };
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            handle,
        }
    }

    /// 在空闲的工作者上执行任务；没有空闲工作者时立即返回错误。
    pub fn dispatch<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|_| Exception::PoolSaturated)?;
        self.handle.spawn_blocking(move || {
            task();
            drop(permit);
        });
        debug!("后台任务已派发，剩余空闲工作者：{}", self.idle());
        Ok(())
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// 当前空闲的工作者数量
    pub fn idle(&self) -> usize {
        self.permits.available_permits()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .field("idle", &self.idle())
            .finish()
    }
}

/// 一项任务，附带是否放入任务池执行的标记。
pub struct Job {
    task: Task,
    queued: bool,
}

impl Job {
    /// 新建任务，默认放入任务池
    pub fn new<F>(task: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            task: Box::new(task),
            queued: true,
        }
    }

    pub fn queue(mut self, queued: bool) -> Self {
        self.queued = queued;
        self
    }

    pub fn is_queued(&self) -> bool {
        self.queued
    }

    /// 未标记入池的任务在当前线程同步执行。
    pub fn dispatch(self, pool: &WorkerPool) -> Result<()> {
        if self.queued {
            pool.dispatch(self.task)
        } else {
            (self.task)();
            Ok(())
        }
    }
}
