use core_types::{RequestId, ResourceId, ResourceKind, TabId};
use html::DomPatch;
use std::sync::mpsc::{Receiver, Sender};

#[derive(Debug)]
pub enum CoreCommand {
    // HTML Parser
    ParseHtmlStart {
        tab_id: TabId,
        request_id: RequestId,
    },
    ParseHtmlChunk {
        tab_id: TabId,
        request_id: RequestId,
        bytes: Vec<u8>,
    },
    ParseHtmlDone {
        tab_id: TabId,
        request_id: RequestId,
    },
    /// Answer to `CoreEvent::FetchResource`.
    ResourceLoaded {
        tab_id: TabId,
        request_id: RequestId,
        resource_id: ResourceId,
        body: Result<String, String>,
    },
    StopParsing {
        tab_id: TabId,
        request_id: RequestId,
    },
}

#[derive(Debug)]
pub enum CoreEvent {
    // HTML Parser -> UI (patch stream)
    DomPatches {
        tab_id: TabId,
        request_id: RequestId,
        patches: Vec<DomPatch>,
    },
    // HTML Parser -> network
    FetchResource {
        tab_id: TabId,
        request_id: RequestId,
        resource_id: ResourceId,
        url: String,
        kind: ResourceKind,
        /// Requested by the preload scanner rather than a blocked parser.
        speculative: bool,
    },
    ParseFinished {
        tab_id: TabId,
        request_id: RequestId,
        tokens: u64,
        lines: u32,
        nodes: u32,
        parse_errors: u64,
        stopped: bool,
    },
    ParseError {
        tab_id: TabId,
        request_id: RequestId,
        error: String,
    },
}

pub struct Bus {
    pub cmd_tx: Sender<CoreCommand>,
    pub evt_rx: Receiver<CoreEvent>,
    pub evt_tx: Sender<CoreEvent>, // shareable for runtimes
}

impl Bus {
    /// Fresh channels; the command receiver belongs to the runtime thread.
    pub fn new() -> (Self, Receiver<CoreCommand>) {
        let (cmd_tx, cmd_rx) = std::sync::mpsc::channel();
        let (evt_tx, evt_rx) = std::sync::mpsc::channel();
        (
            Self {
                cmd_tx,
                evt_rx,
                evt_tx,
            },
            cmd_rx,
        )
    }
}
