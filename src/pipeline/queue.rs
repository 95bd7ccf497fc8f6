// src/pipeline/queue.rs

//! Shared FIFO job queue with completion tracking.
//!
//! Every pushed job counts as pending until it is acknowledged. When the last
//! pending job is acknowledged the queue closes itself and every waiting
//! consumer is released with `None`.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::Mutex;

use tokio::sync::Notify;

#[derive(Debug)]
struct QueueState<J> {
    items: VecDeque<J>,
    seen: HashSet<J>,
    pending: usize,
    closed: bool,
}

/// FIFO queue of jobs that ignores a job it has already seen in this run.
#[derive(Debug)]
pub struct WorkQueue<J> {
    state: Mutex<QueueState<J>>,
    available: Notify,
}

impl<J> Default for WorkQueue<J> {
    fn default() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                seen: HashSet::new(),
                pending: 0,
                closed: false,
            }),
            available: Notify::new(),
        }
    }
}

impl<J: Clone + Eq + Hash> WorkQueue<J> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a job. Returns `false` if it was already enqueued in this run
    /// or the queue is closed.
    pub fn push(&self, job: J) -> bool {
        {
            let mut state = self.lock();
            if state.closed || !state.seen.insert(job.clone()) {
                return false;
            }
            state.items.push_back(job);
            state.pending += 1;
        }
        self.available.notify_one();
        true
    }

    /// Wait for the next job; `None` once the queue is closed.
    pub async fn pop(&self) -> Option<J> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking so a push between the check and the
            // await is not missed.
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(job) = state.items.pop_front() {
                    return Some(job);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Mark one popped job as finished. Closes the queue when nothing is left.
    pub fn ack(&self) {
        let drained = {
            let mut state = self.lock();
            state.pending = state.pending.saturating_sub(1);
            state.pending == 0
        };
        if drained {
            self.close();
        }
    }

    /// Close the queue if nothing was ever pushed or everything is done.
    pub fn close_if_idle(&self) {
        let idle = self.lock().pending == 0;
        if idle {
            self.close();
        }
    }

    /// Drop every queued job and release all consumers.
    pub fn abort(&self) {
        {
            let mut state = self.lock();
            state.items.clear();
            state.pending = 0;
        }
        self.close();
    }

    /// Number of jobs pushed but not yet acknowledged.
    pub fn pending(&self) -> usize {
        self.lock().pending
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn close(&self) {
        self.lock().closed = true;
        self.available.notify_waiters();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState<J>> {
        // A panic while holding the lock leaves only plain data behind.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = WorkQueue::new();
        for n in [3, 1, 2] {
            assert!(queue.push(n));
        }
        assert_eq!(queue.pop().await, Some(3));
        assert_eq!(queue.pop().await, Some(1));
        assert_eq!(queue.pop().await, Some(2));
    }

    #[tokio::test]
    async fn test_duplicate_jobs_are_ignored() {
        let queue = WorkQueue::new();
        assert!(queue.push("CPSC 110"));
        assert!(!queue.push("CPSC 110"));
        assert_eq!(queue.pending(), 1);

        // still ignored after the first copy has been processed
        assert_eq!(queue.pop().await, Some("CPSC 110"));
        assert!(!queue.push("CPSC 110"));
        queue.ack();
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn test_closes_when_last_job_acknowledged() {
        let queue = WorkQueue::new();
        queue.push(1);
        assert_eq!(queue.pop().await, Some(1));

        // a child pushed before the parent's ack keeps the queue open
        queue.push(2);
        queue.ack();
        assert!(!queue.is_closed());

        assert_eq!(queue.pop().await, Some(2));
        queue.ack();
        assert!(queue.is_closed());
        assert_eq!(queue.pop().await, None);
        assert!(!queue.push(3));
    }

    #[tokio::test]
    async fn test_empty_queue_closes_when_idle() {
        let queue: WorkQueue<u32> = WorkQueue::new();
        queue.close_if_idle();
        assert_eq!(queue.pop().await, None);
    }

    #[tokio::test]
    async fn test_waiting_consumers_are_released() {
        let queue: Arc<WorkQueue<u32>> = Arc::new(WorkQueue::new());
        queue.push(7);

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.pop().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.ack();

        let mut results = Vec::new();
        for waiter in waiters {
            results.push(waiter.await.unwrap());
        }
        assert_eq!(results.iter().filter(|r| r.is_some()).count(), 1);
        assert_eq!(results.iter().filter(|r| r.is_none()).count(), 3);
    }

    #[tokio::test]
    async fn test_abort_discards_queued_jobs() {
        let queue = WorkQueue::new();
        queue.push(1);
        queue.push(2);
        queue.abort();
        assert_eq!(queue.pop().await, None);
        assert_eq!(queue.pending(), 0);
    }
}
