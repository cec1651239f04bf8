use bus::{CoreCommand, CoreEvent};
use core_types::{ResourceId, ResourceKind};
use html::DomPatch;
use html::dom_snapshot::PatchDom;
use html::html5::{ParserConfig, SchedulerConfig};
use runtime_parse::{ParseRuntime, RuntimeConfig, start_parse_runtime};
use std::sync::mpsc;
use std::time::{Duration, Instant};

const TAB: u64 = 1;
const REQ: u64 = 7;

fn start() -> CoreCommand {
    CoreCommand::ParseHtmlStart {
        tab_id: TAB,
        request_id: REQ,
    }
}

fn chunk(text: &str) -> CoreCommand {
    CoreCommand::ParseHtmlChunk {
        tab_id: TAB,
        request_id: REQ,
        bytes: text.as_bytes().to_vec(),
    }
}

fn done() -> CoreCommand {
    CoreCommand::ParseHtmlDone {
        tab_id: TAB,
        request_id: REQ,
    }
}

fn loaded(resource_id: ResourceId, body: &str) -> CoreCommand {
    CoreCommand::ResourceLoaded {
        tab_id: TAB,
        request_id: REQ,
        resource_id,
        body: Ok(body.to_string()),
    }
}

#[derive(Default)]
struct Observed {
    patches: Vec<DomPatch>,
    fetches: Vec<(ResourceId, String, ResourceKind, bool)>,
    finished: Option<(u64, bool)>,
    errors: Vec<String>,
}

impl Observed {
    fn drain(&mut self, evt_rx: &mpsc::Receiver<CoreEvent>) {
        while let Ok(evt) = evt_rx.try_recv() {
            self.record(evt);
        }
    }

    fn record(&mut self, evt: CoreEvent) {
        match evt {
            CoreEvent::DomPatches { patches, .. } => self.patches.extend(patches),
            CoreEvent::FetchResource {
                resource_id,
                url,
                kind,
                speculative,
                ..
            } => self.fetches.push((resource_id, url, kind, speculative)),
            CoreEvent::ParseFinished {
                tokens, stopped, ..
            } => self.finished = Some((tokens, stopped)),
            CoreEvent::ParseError { error, .. } => self.errors.push(error),
        }
    }

    fn fetch(&self, url: &str) -> ResourceId {
        self.fetches
            .iter()
            .find(|(_, fetched, _, _)| fetched == url)
            .map(|(id, ..)| *id)
            .unwrap_or_else(|| panic!("{url} was never fetched"))
    }

    fn elements(&self) -> Vec<String> {
        PatchDom::from_patches(&self.patches).element_names()
    }
}

#[test]
fn plain_document_streams_patches_and_finishes() {
    let (evt_tx, evt_rx) = mpsc::channel();
    let mut runtime = ParseRuntime::new(RuntimeConfig::default(), evt_tx);
    let mut seen = Observed::default();

    runtime.handle_command(start());
    runtime.handle_command(chunk("<div><p>one</p>"));
    runtime.handle_command(chunk("<p>two</p></div>"));
    seen.drain(&evt_rx);
    assert!(!seen.patches.is_empty());
    assert!(seen.finished.is_none());

    runtime.handle_command(done());
    seen.drain(&evt_rx);
    assert_eq!(runtime.document_count(), 0);
    assert_eq!(seen.elements(), vec!["div", "p", "p"]);
    assert!(matches!(seen.finished, Some((_, false))));
}

#[test]
fn blocking_script_is_fetched_and_executed_on_load() {
    let (evt_tx, evt_rx) = mpsc::channel();
    let mut runtime = ParseRuntime::new(RuntimeConfig::default(), evt_tx);
    let mut seen = Observed::default();

    runtime.handle_command(start());
    runtime.handle_command(chunk(
        r#"<script src="app.js"></script><img src="hero.png"><p>after</p>"#,
    ));
    runtime.handle_command(done());
    seen.drain(&evt_rx);

    assert!(seen.finished.is_none(), "end must wait for the script");
    assert!(seen.fetches.iter().any(|(_, url, _, speculative)| url == "app.js" && !speculative));
    assert!(seen.fetches.iter().any(|(_, url, kind, speculative)| {
        url == "hero.png" && *kind == ResourceKind::Image && *speculative
    }));

    let id = seen.fetch("app.js");
    runtime.handle_command(loaded(id, r#"document.write("<b>w</b>")"#));
    seen.drain(&evt_rx);

    assert_eq!(seen.elements(), vec!["script", "b", "img", "p"]);
    assert!(matches!(seen.finished, Some((_, false))));
    assert_eq!(runtime.document_count(), 0);
}

#[test]
fn preloaded_script_body_is_reused_by_the_parser() {
    let (evt_tx, evt_rx) = mpsc::channel();
    let mut runtime = ParseRuntime::new(RuntimeConfig::default(), evt_tx);
    let mut seen = Observed::default();

    runtime.handle_command(start());
    runtime.handle_command(chunk(
        r#"<script src="a.js"></script><script src="b.js"></script>"#,
    ));
    seen.drain(&evt_rx);
    let b = seen.fetch("b.js");
    // b.js arrives first, while the parser still waits for a.js.
    runtime.handle_command(loaded(b, r#"document.write("<i>b</i>")"#));
    runtime.handle_command(loaded(seen.fetch("a.js"), r#"document.write("<u>a</u>")"#));
    runtime.handle_command(done());
    seen.drain(&evt_rx);

    assert_eq!(
        seen.fetches.iter().filter(|(_, url, ..)| url == "b.js").count(),
        1
    );
    assert_eq!(seen.elements(), vec!["script", "u", "script", "i"]);
    assert!(seen.finished.is_some());
}

#[test]
fn script_url_used_twice_runs_twice_from_one_fetch() {
    let (evt_tx, evt_rx) = mpsc::channel();
    let mut runtime = ParseRuntime::new(RuntimeConfig::default(), evt_tx);
    let mut seen = Observed::default();

    runtime.handle_command(start());
    runtime.handle_command(chunk(
        r#"<script src="a.js"></script><p>one</p><script src="a.js"></script><p>two</p>"#,
    ));
    runtime.handle_command(done());
    seen.drain(&evt_rx);
    runtime.handle_command(loaded(seen.fetch("a.js"), r#"document.write("<b>a</b>")"#));
    seen.drain(&evt_rx);

    assert_eq!(
        seen.fetches.iter().filter(|(_, url, ..)| url == "a.js").count(),
        1
    );
    assert_eq!(seen.elements(), vec!["script", "b", "p", "script", "b", "p"]);
    assert!(matches!(seen.finished, Some((_, false))));
    assert_eq!(runtime.document_count(), 0);
}

#[test]
fn stylesheet_repeated_after_its_load_still_releases_scripts() {
    let (evt_tx, evt_rx) = mpsc::channel();
    let mut runtime = ParseRuntime::new(RuntimeConfig::default(), evt_tx);
    let mut seen = Observed::default();

    runtime.handle_command(start());
    runtime.handle_command(chunk(r#"<link rel=stylesheet href="s.css">"#));
    seen.drain(&evt_rx);
    runtime.handle_command(loaded(seen.fetch("s.css"), "p {}"));
    runtime.handle_command(chunk(
        r#"<link rel=stylesheet href="s.css"><script>document.write('<i>x</i>')</script><p>end</p>"#,
    ));
    runtime.handle_command(done());
    seen.drain(&evt_rx);

    assert_eq!(
        seen.fetches.iter().filter(|(_, url, ..)| url == "s.css").count(),
        1
    );
    assert_eq!(seen.elements(), vec!["link", "link", "script", "i", "p"]);
    assert!(matches!(seen.finished, Some((_, false))));
    assert_eq!(runtime.document_count(), 0);
}

#[test]
fn resume_tasks_run_when_due() {
    let config = RuntimeConfig {
        parser: ParserConfig {
            scheduler: SchedulerConfig {
                token_budget: Some(4),
                ..SchedulerConfig::default()
            },
            ..ParserConfig::default()
        },
    };
    let (evt_tx, evt_rx) = mpsc::channel();
    let mut runtime = ParseRuntime::new(config, evt_tx);
    let mut seen = Observed::default();

    runtime.handle_command(start());
    runtime.handle_command(chunk(&"<p>x</p>".repeat(10)));
    runtime.handle_command(done());
    assert!(runtime.next_deadline().is_some());

    let mut rounds = 0;
    while runtime.document_count() > 0 {
        runtime.run_due_tasks(Instant::now() + Duration::from_secs(1));
        rounds += 1;
        assert!(rounds < 100, "resume tasks never finished the document");
    }
    seen.drain(&evt_rx);
    assert_eq!(seen.elements().len(), 10);
    assert!(rounds > 1);
    assert_eq!(runtime.next_deadline(), None);
}

#[test]
fn stop_parsing_reports_a_stopped_completion() {
    let (evt_tx, evt_rx) = mpsc::channel();
    let mut runtime = ParseRuntime::new(RuntimeConfig::default(), evt_tx);
    let mut seen = Observed::default();

    runtime.handle_command(start());
    runtime.handle_command(chunk(r#"<script src="never.js"></script><p>x</p>"#));
    runtime.handle_command(done());
    runtime.handle_command(CoreCommand::StopParsing {
        tab_id: TAB,
        request_id: REQ,
    });
    seen.drain(&evt_rx);
    assert!(matches!(seen.finished, Some((_, true))));
    assert_eq!(runtime.document_count(), 0);

    // The fetch answer arrives after the document is gone.
    runtime.handle_command(loaded(seen.fetch("never.js"), ""));
    seen.drain(&evt_rx);
    assert!(seen.errors.is_empty());
}

#[test]
fn protocol_misuse_is_reported_not_fatal() {
    let (evt_tx, evt_rx) = mpsc::channel();
    let mut runtime = ParseRuntime::new(RuntimeConfig::default(), evt_tx);
    let mut seen = Observed::default();

    runtime.handle_command(chunk("<p>"));
    runtime.handle_command(start());
    runtime.handle_command(start());
    runtime.handle_command(chunk(r#"<script src="a.js"></script>"#));
    runtime.handle_command(done());
    runtime.handle_command(chunk("late"));
    runtime.handle_command(done());
    seen.drain(&evt_rx);

    assert_eq!(
        seen.errors,
        vec![
            "chunk for unknown document",
            "parse already started",
            "chunk after end of body",
            "end of body reported twice",
        ]
    );
}

#[test]
fn runtime_thread_parses_until_the_channel_closes() {
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let (evt_tx, evt_rx) = mpsc::channel();
    let handle = start_parse_runtime(cmd_rx, evt_tx);

    cmd_tx.send(start()).expect("runtime alive");
    for piece in "<ul><li>a</li><li>b</li></ul>".as_bytes().chunks(3) {
        cmd_tx
            .send(CoreCommand::ParseHtmlChunk {
                tab_id: TAB,
                request_id: REQ,
                bytes: piece.to_vec(),
            })
            .expect("runtime alive");
    }
    cmd_tx.send(done()).expect("runtime alive");

    let mut seen = Observed::default();
    while seen.finished.is_none() {
        let evt = evt_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("runtime finished the document");
        seen.record(evt);
    }
    drop(cmd_tx);
    handle.join().expect("runtime thread exits cleanly");
    assert_eq!(seen.elements(), vec!["ul", "li", "li"]);
}
