//! Parse runtime: the single-threaded host loop for document parsers.
//!
//! One `Html5ParseSession` per `(tab, request)`. The runtime feeds network
//! chunks, answers the parser's fetches through the bus, runs resume tasks
//! when they come due and forwards DOM patches. A document is dropped as soon
//! as its completion event has been forwarded.

use bus::{CoreCommand, CoreEvent};
use core_types::{RequestId, TabId};
use html::html5::{Html5ParseSession, ParseCompletion, ParserConfig, ParserHost};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Instant;

mod loader;
mod timers;

pub use loader::{ChannelLoader, FetchTable};
pub use timers::{TimerHandle, TimerQueue};

pub type DocKey = (TabId, RequestId);

#[derive(Clone, Debug, Default)]
pub struct RuntimeConfig {
    pub parser: ParserConfig,
}

struct Document {
    session: Html5ParseSession,
    fetches: Rc<RefCell<FetchTable>>,
    body_done: bool,
}

pub struct ParseRuntime {
    config: RuntimeConfig,
    evt_tx: Sender<CoreEvent>,
    timers: Rc<RefCell<TimerQueue>>,
    documents: HashMap<DocKey, Document>,
}

impl ParseRuntime {
    pub fn new(config: RuntimeConfig, evt_tx: Sender<CoreEvent>) -> Self {
        Self {
            config,
            evt_tx,
            timers: Rc::new(RefCell::new(TimerQueue::new())),
            documents: HashMap::new(),
        }
    }

    pub fn handle_command(&mut self, cmd: CoreCommand) {
        match cmd {
            CoreCommand::ParseHtmlStart { tab_id, request_id } => {
                let key = (tab_id, request_id);
                if self.documents.contains_key(&key) {
                    self.report(key, "parse already started".to_string());
                    return;
                }
                let document = self.open_document(key);
                self.documents.insert(key, document);
                log::debug!(target: "runtime.parse", "{key:?}: parse started");
            }
            CoreCommand::ParseHtmlChunk {
                tab_id,
                request_id,
                bytes,
            } => {
                let key = (tab_id, request_id);
                let Some(doc) = self.documents.get_mut(&key) else {
                    self.report(key, "chunk for unknown document".to_string());
                    return;
                };
                if doc.body_done {
                    self.report(key, "chunk after end of body".to_string());
                    return;
                }
                doc.session.push_bytes(&bytes);
                self.settle(key);
            }
            CoreCommand::ParseHtmlDone { tab_id, request_id } => {
                let key = (tab_id, request_id);
                let Some(doc) = self.documents.get_mut(&key) else {
                    self.report(key, "end of body for unknown document".to_string());
                    return;
                };
                if doc.body_done {
                    self.report(key, "end of body reported twice".to_string());
                    return;
                }
                doc.body_done = true;
                doc.session.finish();
                self.settle(key);
            }
            CoreCommand::ResourceLoaded {
                tab_id,
                request_id,
                resource_id,
                body,
            } => {
                let key = (tab_id, request_id);
                let Some(doc) = self.documents.get_mut(&key) else {
                    // Document already finished; late loads are expected.
                    log::debug!(target: "runtime.parse", "{key:?}: dropping load {resource_id:?}");
                    return;
                };
                if !doc.fetches.borrow_mut().complete(resource_id, body) {
                    self.report(key, format!("load for unknown resource {resource_id:?}"));
                    return;
                }
                self.settle(key);
            }
            CoreCommand::StopParsing { tab_id, request_id } => {
                let key = (tab_id, request_id);
                if let Some(doc) = self.documents.get_mut(&key) {
                    doc.session.stop_parsing();
                    self.settle(key);
                }
            }
        }
    }

    /// Run every resume task due at `now`.
    pub fn run_due_tasks(&mut self, now: Instant) {
        let fired = self.timers.borrow_mut().pop_due(now);
        for (key, task) in fired {
            let Some(doc) = self.documents.get_mut(&key) else {
                continue;
            };
            doc.session.resume_parsing_after_yield(task);
            self.settle(key);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.borrow().next_deadline()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    fn open_document(&self, key: DocKey) -> Document {
        let fetches = Rc::new(RefCell::new(FetchTable::new()));
        let loader = ChannelLoader::new(key, Rc::clone(&fetches), self.evt_tx.clone());
        let scheduler = TimerHandle::new(key, Rc::clone(&self.timers));
        let host = ParserHost::new(Box::new(loader), Box::new(scheduler));
        Document {
            session: Html5ParseSession::new(self.config.parser.clone(), host),
            fetches,
            body_done: false,
        }
    }

    /// Deliver ready loads, forward patches, and retire a finished document.
    fn settle(&mut self, key: DocKey) {
        let Some(doc) = self.documents.get_mut(&key) else {
            return;
        };
        loop {
            if doc.session.is_finished() {
                break;
            }
            let next = doc.fetches.borrow_mut().pop_ready();
            let Some(resource) = next else {
                break;
            };
            doc.session.notify_finished(resource);
        }

        let (tab_id, request_id) = key;
        let patches = doc.session.take_patches();
        if !patches.is_empty() {
            let _ = self.evt_tx.send(CoreEvent::DomPatches {
                tab_id,
                request_id,
                patches,
            });
        }

        let Some(completion) = doc.session.take_completion() else {
            return;
        };
        let in_flight = doc.fetches.borrow().in_flight();
        self.documents.remove(&key);
        let ParseCompletion {
            tree,
            tokens,
            lines,
            parse_errors,
            stopped,
        } = completion;
        log::debug!(
            target: "runtime.parse",
            "{key:?}: finished ({tokens} tokens, {lines} lines, {in_flight} loads still in flight)"
        );
        let _ = self.evt_tx.send(CoreEvent::ParseFinished {
            tab_id,
            request_id,
            tokens,
            lines,
            nodes: tree.nodes_created,
            parse_errors,
            stopped,
        });
    }

    fn report(&self, key: DocKey, error: String) {
        log::warn!(target: "runtime.parse", "{key:?}: {error}");
        let (tab_id, request_id) = key;
        let _ = self.evt_tx.send(CoreEvent::ParseError {
            tab_id,
            request_id,
            error,
        });
    }
}

pub fn start_parse_runtime(
    cmd_rx: Receiver<CoreCommand>,
    evt_tx: Sender<CoreEvent>,
) -> thread::JoinHandle<()> {
    start_parse_runtime_with_config(cmd_rx, evt_tx, RuntimeConfig::default())
}

pub fn start_parse_runtime_with_config(
    cmd_rx: Receiver<CoreCommand>,
    evt_tx: Sender<CoreEvent>,
    config: RuntimeConfig,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut runtime = ParseRuntime::new(config, evt_tx);
        loop {
            runtime.run_due_tasks(Instant::now());
            let next = match runtime.next_deadline() {
                Some(deadline) => {
                    match cmd_rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                        Ok(cmd) => Some(cmd),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match cmd_rx.recv() {
                    Ok(cmd) => Some(cmd),
                    Err(_) => break,
                },
            };
            if let Some(cmd) = next {
                runtime.handle_command(cmd);
            }
        }
        log::debug!(
            target: "runtime.parse",
            "command channel closed with {} document(s) open",
            runtime.document_count()
        );
    })
}
