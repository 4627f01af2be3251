// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Bounded FIFO transfer queue backing the Offloader's background upload
//! work, modeled on the teacher's `GlobalResourceManager` two-level
//! governance: a bounded channel caps total queued work, and a fixed pool
//! of workers caps total concurrency, independent of how many files are
//! being written to at once.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex as AsyncMutex};

use dittofs_payload_domain::config::TransferQueueConfig;
use dittofs_payload_domain::error::{PayloadError, PayloadResult};

type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A bounded task queue drained by `config.workers` background workers.
///
/// Tasks are plain futures; the Offloader closes over whatever
/// block-store/cache/hash state a given upload or download needs before
/// submitting it.
pub struct TransferQueue {
    sender: mpsc::Sender<BoxedTask>,
    pending: Arc<AtomicU64>,
    completed: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl TransferQueue {
    pub fn new(config: &TransferQueueConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.size);
        let receiver = Arc::new(AsyncMutex::new(receiver));
        let pending = Arc::new(AtomicU64::new(0));
        let completed = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicU64::new(0));

        for _ in 0..config.workers {
            let receiver = receiver.clone();
            let pending = pending.clone();
            let completed = completed.clone();
            tokio::spawn(async move {
                loop {
                    let task = {
                        let mut rx = receiver.lock().await;
                        rx.recv().await
                    };
                    match task {
                        Some(task) => {
                            task.await;
                            pending.fetch_sub(1, Ordering::Relaxed);
                            completed.fetch_add(1, Ordering::Relaxed);
                        }
                        None => break,
                    }
                }
            });
        }

        Self { sender, pending, completed, failed }
    }

    /// Enqueues `task`, waiting if the queue is at capacity. Returns
    /// [`PayloadError::Closed`] if every worker has shut down.
    pub async fn submit<F>(&self, task: F) -> PayloadResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending.fetch_add(1, Ordering::Relaxed);
        self.sender.send(Box::pin(task)).await.map_err(|_| PayloadError::Closed)
    }

    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Records a task-level failure observed by the caller after a
    /// submitted future completes (the queue itself never inspects task
    /// outcomes, since tasks return `()`).
    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn submitted_tasks_run_and_are_counted() {
        let queue = TransferQueue::new(&TransferQueueConfig { size: 8, workers: 2 });
        let ran = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let ran = ran.clone();
            queue.submit(async move { ran.fetch_add(1, Ordering::SeqCst); }).await.unwrap();
        }

        for _ in 0..50 {
            if queue.completed() == 5 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(ran.load(Ordering::SeqCst), 5);
        assert_eq!(queue.completed(), 5);
        assert_eq!(queue.pending(), 0);
    }
}
