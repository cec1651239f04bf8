//! Timer queue backing the parser's `HostScheduler`.

use crate::DocKey;
use core_types::TaskId;
use html::html5::HostScheduler;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Resume tasks of every document on the runtime thread, ordered by deadline.
#[derive(Debug, Default)]
pub struct TimerQueue {
    next_id: u64,
    due: BTreeSet<(Instant, TaskId)>,
    owners: HashMap<TaskId, (DocKey, Instant)>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn post(&mut self, owner: DocKey, delay: Duration) -> TaskId {
        self.next_id += 1;
        let task = TaskId(self.next_id);
        let deadline = Instant::now() + delay;
        self.due.insert((deadline, task));
        self.owners.insert(task, (owner, deadline));
        task
    }

    fn cancel(&mut self, task: TaskId) {
        if let Some((_, deadline)) = self.owners.remove(&task) {
            self.due.remove(&(deadline, task));
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.due.first().map(|(deadline, _)| *deadline)
    }

    /// Remove and return every task due at `now`, earliest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<(DocKey, TaskId)> {
        let mut fired = Vec::new();
        while let Some(&(deadline, task)) = self.due.first() {
            if deadline > now {
                break;
            }
            self.due.remove(&(deadline, task));
            if let Some((owner, _)) = self.owners.remove(&task) {
                fired.push((owner, task));
            }
        }
        fired
    }

    pub fn len(&self) -> usize {
        self.due.len()
    }

    pub fn is_empty(&self) -> bool {
        self.due.is_empty()
    }
}

/// One document's view of the shared queue.
pub struct TimerHandle {
    owner: DocKey,
    queue: Rc<RefCell<TimerQueue>>,
}

impl TimerHandle {
    pub fn new(owner: DocKey, queue: Rc<RefCell<TimerQueue>>) -> Self {
        Self { owner, queue }
    }
}

impl HostScheduler for TimerHandle {
    fn post_task(&mut self, delay: Duration) -> TaskId {
        let task = self.queue.borrow_mut().post(self.owner, delay);
        log::trace!(target: "runtime.parse", "{:?}: posted {task:?} in {delay:?}", self.owner);
        task
    }

    fn cancel_task(&mut self, task: TaskId) {
        self.queue.borrow_mut().cancel(task);
    }
}
