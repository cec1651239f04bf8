#![no_main]

use core_types::ResourceId;
use html::dom_snapshot::PatchDom;
use html::html5::testing::{ManualHost, RecordingLoader};
use html::html5::{
    Html5ParseSession, Initiator, LoadError, LoadedResource, ParserConfig, ParserHost,
    SchedulerConfig,
};
use libfuzzer_sys::fuzz_target;
use std::collections::HashSet;

fuzz_target!(|data: &[u8]| {
    // First byte picks the chunk size and token budget, the rest is the document.
    let Some((&knobs, body)) = data.split_first() else {
        return;
    };
    let chunk_size = usize::from(knobs & 0x0f) + 1;
    let token_budget = match knobs >> 4 {
        0 => None,
        n => Some(u64::from(n)),
    };

    let (loader, loads) = RecordingLoader::new();
    let (host, host_log) = ManualHost::new();
    let config = ParserConfig {
        scheduler: SchedulerConfig {
            token_budget,
            ..SchedulerConfig::default()
        },
        ..ParserConfig::default()
    };
    let mut session =
        Html5ParseSession::new(config, ParserHost::new(Box::new(loader), Box::new(host)));

    for chunk in body.chunks(chunk_size) {
        session.push_bytes(chunk);
    }
    session.finish();

    let mut answered: HashSet<ResourceId> = HashSet::new();
    let mut rounds = 0usize;
    while !session.is_finished() {
        rounds += 1;
        assert!(rounds < 1 + body.len() * 64, "parse never completed");

        if session.is_scheduled_for_resume() {
            let task = host_log.borrow().live_task().expect("armed resume was posted");
            session.resume_parsing_after_yield(task);
            continue;
        }
        let next = loads
            .borrow()
            .requests
            .iter()
            .find(|req| req.initiator == Initiator::Parser && !answered.contains(&req.id))
            .cloned();
        let Some(req) = next else {
            panic!("parser blocked with nothing to deliver");
        };
        answered.insert(req.id);
        let body = if req.id.0 % 2 == 0 {
            Err(LoadError::Status(404))
        } else {
            Ok(r#"document.write("<p>w</p>")"#.to_string())
        };
        session.notify_finished(LoadedResource {
            id: req.id,
            kind: req.kind,
            url: req.url,
            body,
        });
    }

    let completion = session.take_completion().expect("finished parse has a completion");
    assert!(!completion.stopped);
    let mut dom = PatchDom::new();
    if let Err(err) = dom.apply_all(&session.take_patches()) {
        panic!("invalid patch stream: {err}");
    }
});
