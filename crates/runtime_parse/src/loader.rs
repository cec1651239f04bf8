//! Resource loading for documents on the parse runtime.
//!
//! Fetches leave the runtime as `CoreEvent::FetchResource` and come back as
//! `CoreCommand::ResourceLoaded`. Each document keeps a URL cache, so a parser
//! request for something the preload scanner already fetched joins that fetch,
//! and a body that already arrived is delivered as soon as the parser asks.

use crate::DocKey;
use bus::CoreEvent;
use core_types::{ResourceId, ResourceKind};
use html::html5::{Initiator, LoadError, LoadedResource, ResourceLoader};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::mpsc::Sender;

#[derive(Debug)]
struct Fetch {
    url: String,
    kind: ResourceKind,
    body: Option<Result<String, String>>,
    /// The parser itself asked for it (blocking script or stylesheet).
    parser_wants: bool,
    /// The current want was answered; cleared again by the next want.
    delivered: bool,
}

/// Per-document fetch bookkeeping shared by the loader and the runtime.
#[derive(Debug, Default)]
pub struct FetchTable {
    next_id: u64,
    by_url: HashMap<String, ResourceId>,
    fetches: HashMap<ResourceId, Fetch>,
    ready: VecDeque<ResourceId>,
}

impl FetchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a body from the network. Returns false for unknown ids.
    pub fn complete(&mut self, id: ResourceId, body: Result<String, String>) -> bool {
        let Some(fetch) = self.fetches.get_mut(&id) else {
            return false;
        };
        if fetch.body.is_some() {
            log::debug!(target: "runtime.parse", "duplicate body for {id:?} ignored");
            return true;
        }
        fetch.body = Some(body);
        if fetch.parser_wants {
            self.ready.push_back(id);
        }
        true
    }

    /// The parser wants a completion for `id`. Each call asks for a fresh
    /// delivery, so a URL used twice gets its cached body twice.
    fn mark_wanted(&mut self, id: ResourceId) {
        let Some(fetch) = self.fetches.get_mut(&id) else {
            return;
        };
        fetch.parser_wants = true;
        fetch.delivered = false;
        if fetch.body.is_some() && !self.ready.contains(&id) {
            self.ready.push_back(id);
        }
    }

    /// Next completion the parser is waiting for, in arrival order.
    pub fn pop_ready(&mut self) -> Option<LoadedResource> {
        while let Some(id) = self.ready.pop_front() {
            let Some(fetch) = self.fetches.get_mut(&id) else {
                continue;
            };
            if fetch.delivered || !fetch.parser_wants {
                continue;
            }
            let Some(body) = fetch.body.clone() else {
                continue;
            };
            fetch.delivered = true;
            return Some(LoadedResource {
                id,
                kind: fetch.kind,
                url: fetch.url.clone(),
                body: body.map_err(LoadError::Network),
            });
        }
        None
    }

    pub fn in_flight(&self) -> usize {
        self.fetches
            .values()
            .filter(|fetch| fetch.body.is_none())
            .count()
    }
}

/// `ResourceLoader` of one document: turns requests into bus events.
pub struct ChannelLoader {
    key: DocKey,
    table: Rc<RefCell<FetchTable>>,
    evt_tx: Sender<CoreEvent>,
}

impl ChannelLoader {
    pub fn new(key: DocKey, table: Rc<RefCell<FetchTable>>, evt_tx: Sender<CoreEvent>) -> Self {
        Self { key, table, evt_tx }
    }
}

impl ResourceLoader for ChannelLoader {
    fn request(&mut self, url: &str, kind: ResourceKind, initiator: Initiator) -> ResourceId {
        let mut table = self.table.borrow_mut();
        if let Some(&id) = table.by_url.get(url) {
            log::debug!(target: "runtime.parse", "{:?}: joined fetch {id:?} for {url:?}", self.key);
            if initiator == Initiator::Parser && kind == ResourceKind::Stylesheet {
                table.mark_wanted(id);
            }
            return id;
        }
        table.next_id += 1;
        let id = ResourceId(table.next_id);
        table.by_url.insert(url.to_string(), id);
        table.fetches.insert(id, Fetch {
            url: url.to_string(),
            kind,
            body: None,
            parser_wants: initiator == Initiator::Parser && kind == ResourceKind::Stylesheet,
            delivered: false,
        });
        let (tab_id, request_id) = self.key;
        let _ = self.evt_tx.send(CoreEvent::FetchResource {
            tab_id,
            request_id,
            resource_id: id,
            url: url.to_string(),
            kind,
            speculative: initiator == Initiator::PreloadScanner,
        });
        id
    }

    fn watch_for_load(&mut self, id: ResourceId) {
        self.table.borrow_mut().mark_wanted(id);
    }

    fn stop_watching_for_load(&mut self, id: ResourceId) {
        if let Some(fetch) = self.table.borrow_mut().fetches.get_mut(&id) {
            fetch.parser_wants = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChannelLoader, FetchTable};
    use bus::CoreEvent;
    use core_types::ResourceKind;
    use html::html5::{Initiator, LoadError, ResourceLoader};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::mpsc;

    fn loader() -> (ChannelLoader, Rc<RefCell<FetchTable>>, mpsc::Receiver<CoreEvent>) {
        let (evt_tx, evt_rx) = mpsc::channel();
        let table = Rc::new(RefCell::new(FetchTable::new()));
        (ChannelLoader::new((1, 9), Rc::clone(&table), evt_tx), table, evt_rx)
    }

    #[test]
    fn parser_request_joins_a_preload_and_gets_the_cached_body() {
        let (mut loader, table, evt_rx) = loader();
        let preload = loader.request("a.js", ResourceKind::Script, Initiator::PreloadScanner);
        assert!(matches!(
            evt_rx.try_recv(),
            Ok(CoreEvent::FetchResource { speculative: true, .. })
        ));
        assert!(table.borrow_mut().complete(preload, Ok("x()".to_string())));
        assert!(table.borrow_mut().pop_ready().is_none());

        let id = loader.request("a.js", ResourceKind::Script, Initiator::Parser);
        assert_eq!(id, preload);
        assert!(evt_rx.try_recv().is_err());
        loader.watch_for_load(id);

        let ready = table.borrow_mut().pop_ready().expect("cached body delivered");
        assert_eq!(ready.id, id);
        assert_eq!(ready.body, Ok("x()".to_string()));
        assert!(table.borrow_mut().pop_ready().is_none());
    }

    #[test]
    fn second_watch_of_a_delivered_script_gets_the_body_again() {
        let (mut loader, table, evt_rx) = loader();
        let id = loader.request("a.js", ResourceKind::Script, Initiator::Parser);
        loader.watch_for_load(id);
        table.borrow_mut().complete(id, Ok("x()".to_string()));
        assert!(table.borrow_mut().pop_ready().is_some());
        loader.stop_watching_for_load(id);

        let again = loader.request("a.js", ResourceKind::Script, Initiator::Parser);
        assert_eq!(again, id);
        loader.watch_for_load(again);
        let ready = table.borrow_mut().pop_ready().expect("cached body delivered again");
        assert_eq!(ready.body, Ok("x()".to_string()));
        assert!(table.borrow_mut().pop_ready().is_none());
        assert_eq!(evt_rx.try_iter().count(), 1);
    }

    #[test]
    fn repeated_stylesheet_after_delivery_is_delivered_again() {
        let (mut loader, table, _evt_rx) = loader();
        let id = loader.request("s.css", ResourceKind::Stylesheet, Initiator::Parser);
        table.borrow_mut().complete(id, Ok(String::new()));
        assert!(table.borrow_mut().pop_ready().is_some());

        assert_eq!(
            loader.request("s.css", ResourceKind::Stylesheet, Initiator::Parser),
            id
        );
        assert_eq!(table.borrow_mut().pop_ready().map(|ready| ready.id), Some(id));
    }

    #[test]
    fn stylesheets_are_delivered_without_watching() {
        let (mut loader, table, _evt_rx) = loader();
        let id = loader.request("s.css", ResourceKind::Stylesheet, Initiator::Parser);
        assert_eq!(table.borrow().in_flight(), 1);
        table.borrow_mut().complete(id, Err("reset".to_string()));
        let ready = table.borrow_mut().pop_ready().expect("parser stylesheet");
        assert_eq!(ready.body, Err(LoadError::Network("reset".to_string())));
        assert_eq!(table.borrow().in_flight(), 0);
    }

    #[test]
    fn unwatched_completion_is_not_delivered() {
        let (mut loader, table, _evt_rx) = loader();
        let id = loader.request("a.js", ResourceKind::Script, Initiator::Parser);
        loader.watch_for_load(id);
        loader.stop_watching_for_load(id);
        table.borrow_mut().complete(id, Ok(String::new()));
        assert!(table.borrow_mut().pop_ready().is_none());
        assert!(!table.borrow_mut().complete(core_types::ResourceId(77), Ok(String::new())));
    }
}
