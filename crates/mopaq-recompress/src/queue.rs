//! Static FIFO of archive paths shared by the workers

use crate::runtime::{RuntimeLock, ThreadRuntime};
use std::collections::VecDeque;

/// A path handed to one worker, with its 1-based position for progress output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Position in the original queue, starting at 1
    pub index: usize,
    /// Archive path
    pub path: String,
}

/// Pre-filled queue, drained once and never refilled
pub struct WorkQueue<R: ThreadRuntime> {
    items: R::Lock<VecDeque<WorkItem>>,
    total: usize,
}

impl<R: ThreadRuntime> WorkQueue<R> {
    /// Queue holding `paths` in order
    pub fn new(runtime: &R, paths: impl IntoIterator<Item = String>) -> Self {
        let items: VecDeque<WorkItem> = paths
            .into_iter()
            .enumerate()
            .map(|(i, path)| WorkItem { index: i + 1, path })
            .collect();
        let total = items.len();
        Self {
            items: runtime.create_lock(items),
            total,
        }
    }

    /// Next item, `None` once the queue is drained
    pub fn pop(&self) -> Option<WorkItem> {
        self.items.acquire().pop_front()
    }

    /// Items still waiting
    pub fn remaining(&self) -> usize {
        self.items.acquire().len()
    }

    /// Items the queue started with
    pub fn total(&self) -> usize {
        self.total
    }
}

impl<R: ThreadRuntime> std::fmt::Debug for WorkQueue<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("remaining", &self.remaining())
            .field("total", &self.total)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::runtime::OsThreads;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_fifo_order() {
        let queue = WorkQueue::new(&OsThreads, ["a", "b", "c"].map(String::from));
        assert_eq!(queue.total(), 3);

        let first = queue.pop().expect("Test operation should succeed");
        assert_eq!(first.index, 1);
        assert_eq!(first.path, "a");
        assert_eq!(queue.pop().map(|item| item.path).as_deref(), Some("b"));
        assert_eq!(queue.remaining(), 1);
        assert_eq!(queue.pop().map(|item| item.index), Some(3));
        assert!(queue.pop().is_none());
        assert_eq!(queue.total(), 3);
    }

    #[test]
    fn test_each_item_popped_once() {
        let runtime = OsThreads;
        let queue = Arc::new(WorkQueue::new(
            &runtime,
            (0..500).map(|i| format!("file{i}.dat")),
        ));
        let taken = Arc::new(runtime.create_lock(Vec::new()));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let queue = Arc::clone(&queue);
                let taken = Arc::clone(&taken);
                runtime
                    .spawn(format!("drain-{i}"), move || {
                        while let Some(item) = queue.pop() {
                            taken.acquire().push(item.index);
                        }
                    })
                    .expect("Test operation should succeed")
            })
            .collect();
        for handle in handles {
            assert!(runtime.join(handle));
        }

        assert_eq!(queue.remaining(), 0);
        let taken = taken.acquire();
        let unique: HashSet<usize> = taken.iter().copied().collect();
        assert_eq!(taken.len(), 500);
        assert_eq!(unique, (1..=500).collect());
    }
}
