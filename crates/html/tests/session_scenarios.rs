use html::dom_snapshot::PatchDom;
use html::html5::testing::{LoaderLog, ManualHost, RecordingLoader};
use html::html5::{
    DocumentWriteEngine, DocumentWriter, Html5ParseSession, Initiator, LoadError, LoadedResource,
    ParserConfig, ParserHost, ScriptEngine, ScriptError,
};
use serde::Deserialize;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::rc::Rc;

#[derive(Debug, Deserialize)]
struct Manifest {
    case: Vec<ScenarioCase>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum Deliver {
    #[default]
    Eager,
    AfterFinish,
}

#[derive(Debug, Deserialize)]
struct ScenarioCase {
    id: String,
    chunks: Vec<String>,
    #[serde(default)]
    deliver: Deliver,
    #[serde(default)]
    scripts: BTreeMap<String, String>,
    #[serde(default)]
    stylesheets: BTreeMap<String, String>,
    elements: Vec<String>,
    executed: usize,
    #[serde(default)]
    preloads: Option<Vec<String>>,
    #[serde(default)]
    outline: Option<String>,
}

/// `document.write` engine counting evaluations.
struct CountingEngine {
    runs: Rc<Cell<usize>>,
}

impl ScriptEngine for CountingEngine {
    fn evaluate(
        &mut self,
        source: &str,
        writer: &mut dyn DocumentWriter,
    ) -> Result<(), ScriptError> {
        self.runs.set(self.runs.get() + 1);
        DocumentWriteEngine.evaluate(source, writer)
    }
}

fn load_manifest(path: &Path) -> Manifest {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("failed to read scenario manifest {path:?}: {err}"));
    toml::from_str(&content)
        .unwrap_or_else(|err| panic!("failed to parse scenario manifest {path:?}: {err}"))
}

struct Driver<'a> {
    case: &'a ScenarioCase,
    session: Html5ParseSession,
    loads: Rc<RefCell<LoaderLog>>,
    delivered: HashSet<u64>,
}

impl Driver<'_> {
    /// Answer every parser request not answered yet, in request order.
    fn deliver_pending(&mut self) {
        loop {
            if self.session.is_finished() {
                return;
            }
            let next = self
                .loads
                .borrow()
                .requests
                .iter()
                .find(|req| req.initiator == Initiator::Parser && !self.delivered.contains(&req.id.0))
                .cloned();
            let Some(request) = next else {
                return;
            };
            self.delivered.insert(request.id.0);
            let body = match request.kind {
                core_types::ResourceKind::Stylesheet => Ok(self
                    .case
                    .stylesheets
                    .get(&request.url)
                    .cloned()
                    .unwrap_or_default()),
                _ => self
                    .case
                    .scripts
                    .get(&request.url)
                    .cloned()
                    .ok_or(LoadError::Status(404)),
            };
            self.session.notify_finished(LoadedResource {
                id: request.id,
                kind: request.kind,
                url: request.url,
                body,
            });
        }
    }
}

fn run_case(case: &ScenarioCase) {
    let (loader, loads) = RecordingLoader::new();
    let (host, _host_log) = ManualHost::new();
    let runs = Rc::new(Cell::new(0));
    let parser_host = ParserHost::new(Box::new(loader), Box::new(host)).with_engine(Box::new(
        CountingEngine {
            runs: Rc::clone(&runs),
        },
    ));
    let mut driver = Driver {
        case,
        session: Html5ParseSession::new(ParserConfig::default(), parser_host),
        loads,
        delivered: HashSet::new(),
    };

    for chunk in &case.chunks {
        driver.session.append(chunk);
        if case.deliver == Deliver::Eager {
            driver.deliver_pending();
        }
    }
    driver.session.finish();
    driver.deliver_pending();

    let id = &case.id;
    assert!(driver.session.is_finished(), "[{id}] document never ended");
    let completion = driver
        .session
        .take_completion()
        .unwrap_or_else(|| panic!("[{id}] no completion event"));
    assert!(!completion.stopped, "[{id}] unexpected stop");
    assert_eq!(runs.get(), case.executed, "[{id}] script executions");
    assert_eq!(
        driver.session.counters().max_active_pumps,
        1,
        "[{id}] pumps overlapped"
    );

    let dom = PatchDom::from_patches(&driver.session.take_patches());
    assert_eq!(dom.element_names(), case.elements, "[{id}] elements");
    if let Some(outline) = &case.outline {
        assert_eq!(&dom.snapshot().render(), outline, "[{id}] outline");
    }
    if let Some(preloads) = &case.preloads {
        let loads = driver.loads.borrow();
        assert_eq!(&loads.urls(Initiator::PreloadScanner), preloads, "[{id}] preloads");
    }
}

#[test]
fn scenario_manifest_cases() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/scenarios.toml");
    let manifest = load_manifest(&path);
    assert!(!manifest.case.is_empty(), "empty scenario manifest");
    for case in &manifest.case {
        run_case(case);
    }
}
