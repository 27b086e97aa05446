//! In-memory job queue shared by the reconcilers (producer) and the job
//! listener (consumer)
//!
//! Nothing here is persisted; the orchestrator resets the queue at the start
//! of every run.
//!
//! Discipline:
//! - FIFO appends at the tail, pops from the head
//! - LIFO appends at the head, `pop_job` pops from the head (newest first)
//!
//! In LIFO mode `pop_jobs` takes its batch from the *tail*, i.e. the oldest
//! jobs, returned in storage order. This differs from `pop_job` and is kept on
//! purpose; `test_lifo_batch_pop_takes_oldest` pins it.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    Fifo,
    Lifo,
}

/// Proof that the queue was observed empty. Required to stop a job listener.
#[derive(Debug)]
#[must_use = "pass the token to ListenerHandle::stop"]
pub struct Drained {
    _private: (),
}

pub struct JobQueue<J> {
    name: String,
    discipline: Discipline,
    storage: Mutex<VecDeque<J>>,
    job_added: Notify,
}

impl<J> JobQueue<J> {
    pub fn new(name: impl Into<String>, discipline: Discipline) -> Self {
        Self {
            name: name.into(),
            discipline,
            storage: Mutex::new(VecDeque::new()),
            job_added: Notify::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn storage(&self) -> MutexGuard<'_, VecDeque<J>> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.storage().len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage().is_empty()
    }

    pub fn add_job(&self, job: J) {
        {
            let mut storage = self.storage();
            match self.discipline {
                Discipline::Fifo => storage.push_back(job),
                Discipline::Lifo => storage.push_front(job),
            }
        }
        // Single consumer: a stored permit covers an add that races the
        // consumer going idle.
        self.job_added.notify_one();
    }

    /// `None` when the queue is empty.
    pub fn pop_job(&self) -> Option<J> {
        self.storage().pop_front()
    }

    /// Up to `count` jobs; fewer when the queue is shorter, none when empty.
    pub fn pop_jobs(&self, count: usize) -> Vec<J> {
        let mut storage = self.storage();
        let take = count.min(storage.len());

        match self.discipline {
            Discipline::Fifo => storage.drain(..take).collect(),
            Discipline::Lifo => {
                let start = storage.len() - take;
                storage.split_off(start).into_iter().collect()
            }
        }
    }

    pub fn reset(&self) {
        self.storage().clear();
    }

    /// Resolves once a job has been added since the last wake-up.
    pub async fn job_added(&self) {
        self.job_added.notified().await;
    }

    /// Poll until the queue is empty. Length is re-read on every check, so
    /// jobs added while waiting keep it waiting.
    pub async fn wait(&self, poll_interval: Duration) -> Drained {
        while !self.is_empty() {
            tokio::time::sleep(poll_interval).await;
        }
        Drained { _private: () }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn queue_with(discipline: Discipline, jobs: &[u32]) -> JobQueue<u32> {
        let queue = JobQueue::new("testQueue", discipline);
        for job in jobs {
            queue.add_job(*job);
        }
        queue
    }

    #[test]
    fn test_name_and_length() {
        let queue = queue_with(Discipline::Fifo, &[]);
        assert_eq!(queue.name(), "testQueue");
        assert_eq!(queue.len(), 0);
        assert!(queue.is_empty());

        queue.add_job(1);
        queue.add_job(2);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_fifo_pop_order() {
        let queue = queue_with(Discipline::Fifo, &[1, 2]);
        assert_eq!(queue.pop_job(), Some(1));
        assert_eq!(queue.pop_job(), Some(2));
        assert_eq!(queue.pop_job(), None);
    }

    #[test]
    fn test_fifo_batch_pop_returns_first_enqueued() {
        let queue = queue_with(Discipline::Fifo, &[1, 2, 3, 4]);
        assert_eq!(queue.pop_jobs(2), vec![1, 2]);
        assert_eq!(queue.pop_jobs(2), vec![3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_lifo_pop_returns_most_recent() {
        let queue = queue_with(Discipline::Lifo, &[1, 2, 3]);
        assert_eq!(queue.pop_job(), Some(3));
        assert_eq!(queue.pop_job(), Some(2));
        queue.add_job(4);
        assert_eq!(queue.pop_job(), Some(4));
        assert_eq!(queue.pop_job(), Some(1));
    }

    #[test]
    fn test_lifo_batch_pop_takes_oldest() {
        // Storage is newest-first: [4, 3, 2, 1]
        let queue = queue_with(Discipline::Lifo, &[1, 2, 3, 4]);
        assert_eq!(queue.pop_jobs(2), vec![2, 1]);
        assert_eq!(queue.pop_job(), Some(4));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_batch_pop_shorter_and_empty() {
        let queue = queue_with(Discipline::Fifo, &[1]);
        assert_eq!(queue.pop_jobs(5), vec![1]);
        assert!(queue.pop_jobs(5).is_empty());

        let lifo = queue_with(Discipline::Lifo, &[1, 2]);
        assert_eq!(lifo.pop_jobs(5), vec![2, 1]);
        assert!(lifo.pop_jobs(1).is_empty());
    }

    #[test]
    fn test_reset() {
        let queue = queue_with(Discipline::Fifo, &[1, 2, 3, 4]);
        queue.reset();
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.pop_job(), None);
    }

    #[tokio::test]
    async fn test_wait_on_empty_queue_returns_immediately() {
        let queue = queue_with(Discipline::Fifo, &[]);
        let _drained = queue.wait(Duration::from_secs(3600)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_rechecks_length() {
        let queue = Arc::new(queue_with(Discipline::Fifo, &[1]));

        let waiting = queue.clone();
        let waiter = tokio::spawn(async move { waiting.wait(Duration::from_millis(100)).await });

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(!waiter.is_finished());

        // Enqueue before draining the first job: length never reaches zero
        queue.add_job(2);
        queue.pop_job();
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(!waiter.is_finished());

        queue.pop_job();
        let _drained = waiter.await.unwrap();
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_added_wakes_consumer() {
        let queue = Arc::new(queue_with(Discipline::Fifo, &[]));

        let consumer = queue.clone();
        let handle = tokio::spawn(async move {
            consumer.job_added().await;
            consumer.pop_job()
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.add_job(7);

        assert_eq!(handle.await.unwrap(), Some(7));
    }
}
