//! In-memory collaborators for driving a parse session in tests.
//!
//! Each double shares its log through `Rc<RefCell<..>>`, so a test keeps a
//! handle after boxing the double into a session.

use crate::html5::scheduler::HostScheduler;
use crate::html5::script::{Initiator, ResourceLoader};
use crate::html5::ParserObserver;
use core_types::{ResourceId, ResourceKind, TaskId};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedRequest {
    pub id: ResourceId,
    pub url: String,
    pub kind: ResourceKind,
    pub initiator: Initiator,
}

#[derive(Debug, Default)]
pub struct LoaderLog {
    pub requests: Vec<RecordedRequest>,
    pub watching: Vec<ResourceId>,
    pub stopped_watching: Vec<ResourceId>,
}

impl LoaderLog {
    pub fn urls(&self, initiator: Initiator) -> Vec<&str> {
        self.requests
            .iter()
            .filter(|req| req.initiator == initiator)
            .map(|req| req.url.as_str())
            .collect()
    }

    /// Id of the parser-initiated request for `url`.
    pub fn parser_request(&self, url: &str) -> Option<ResourceId> {
        self.requests
            .iter()
            .find(|req| req.initiator == Initiator::Parser && req.url == url)
            .map(|req| req.id)
    }
}

/// Loader that only records what it was asked for.
#[derive(Clone, Debug, Default)]
pub struct RecordingLoader {
    log: Rc<RefCell<LoaderLog>>,
    next_id: u64,
}

impl RecordingLoader {
    pub fn new() -> (Self, Rc<RefCell<LoaderLog>>) {
        let loader = Self::default();
        let log = Rc::clone(&loader.log);
        (loader, log)
    }
}

impl ResourceLoader for RecordingLoader {
    fn request(&mut self, url: &str, kind: ResourceKind, initiator: Initiator) -> ResourceId {
        self.next_id += 1;
        let id = ResourceId(self.next_id);
        self.log.borrow_mut().requests.push(RecordedRequest {
            id,
            url: url.to_string(),
            kind,
            initiator,
        });
        id
    }

    fn watch_for_load(&mut self, id: ResourceId) {
        self.log.borrow_mut().watching.push(id);
    }

    fn stop_watching_for_load(&mut self, id: ResourceId) {
        let mut log = self.log.borrow_mut();
        log.watching.retain(|watched| *watched != id);
        log.stopped_watching.push(id);
    }
}

#[derive(Debug, Default)]
pub struct HostLog {
    pub posted: Vec<(TaskId, Duration)>,
    pub cancelled: Vec<TaskId>,
}

impl HostLog {
    /// Most recently posted task that was not cancelled.
    pub fn live_task(&self) -> Option<TaskId> {
        self.posted
            .iter()
            .rev()
            .map(|(task, _)| *task)
            .find(|task| !self.cancelled.contains(task))
    }
}

/// Host scheduler whose tasks only run when the test says so.
#[derive(Clone, Debug, Default)]
pub struct ManualHost {
    log: Rc<RefCell<HostLog>>,
    next_id: u64,
}

impl ManualHost {
    pub fn new() -> (Self, Rc<RefCell<HostLog>>) {
        let host = Self::default();
        let log = Rc::clone(&host.log);
        (host, log)
    }
}

impl HostScheduler for ManualHost {
    fn post_task(&mut self, delay: Duration) -> TaskId {
        self.next_id += 1;
        let task = TaskId(self.next_id);
        self.log.borrow_mut().posted.push((task, delay));
        task
    }

    fn cancel_task(&mut self, task: TaskId) {
        self.log.borrow_mut().cancelled.push(task);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PumpEvent {
    Will { buffered: usize, line: u32 },
    Did { line: u32 },
}

/// Observer recording pump boundaries.
#[derive(Clone, Debug, Default)]
pub struct RecordingObserver {
    events: Rc<RefCell<Vec<PumpEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> (Self, Rc<RefCell<Vec<PumpEvent>>>) {
        let observer = Self::default();
        let events = Rc::clone(&observer.events);
        (observer, events)
    }
}

impl ParserObserver for RecordingObserver {
    fn will_pump(&mut self, buffered_len: usize, line: u32) {
        self.events.borrow_mut().push(PumpEvent::Will {
            buffered: buffered_len,
            line,
        });
    }

    fn did_pump(&mut self, line: u32) {
        self.events.borrow_mut().push(PumpEvent::Did { line });
    }
}
