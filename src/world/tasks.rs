use std::collections::VecDeque;

/// Follow-up work the decoder must not run inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredTask {
    /// The local player was described for the first time.
    LoginComplete,
}

/// One-shot tasks for the host's next loop iteration.
#[derive(Debug, Default)]
pub struct TaskQueue {
    pending: VecDeque<DeferredTask>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, task: DeferredTask) {
        self.pending.push_back(task);
    }

    pub fn pop(&mut self) -> Option<DeferredTask> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_run_once_in_order() {
        let mut queue = TaskQueue::new();
        queue.schedule(DeferredTask::LoginComplete);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some(DeferredTask::LoginComplete));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }
}
