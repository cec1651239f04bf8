//! docpump: stream an HTML file through the parse runtime.
//!
//! Fetches the parser issues are answered from disk, relative to the input
//! file. Prints the resulting document outline, or parse statistics.

use anyhow::{Context, Result, bail};
use bus::{Bus, CoreCommand, CoreEvent};
use clap::{ArgAction, Parser};
use html::dom_snapshot::PatchDom;
use html::html5::{ParserConfig, SchedulerConfig};
use runtime_parse::{RuntimeConfig, start_parse_runtime_with_config};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const TAB: u64 = 1;
const REQUEST: u64 = 1;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// HTML document to parse
    input: PathBuf,

    /// Bytes per network chunk
    #[arg(long, default_value_t = 4096)]
    chunk_size: usize,

    /// Yield after this many tokens per pump
    #[arg(long)]
    token_budget: Option<u64>,

    /// Parse with scripting disabled
    #[arg(long = "no-scripts", action = ArgAction::SetTrue)]
    no_scripts: bool,

    /// Print parse statistics instead of the outline
    #[arg(long, action = ArgAction::SetTrue)]
    stats: bool,

    /// Log verbosity when RUST_LOG is unset (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn parser_config(cli: &Cli) -> ParserConfig {
    let mut config = ParserConfig {
        scheduler: SchedulerConfig {
            token_budget: cli.token_budget,
            ..SchedulerConfig::default()
        },
        ..ParserConfig::default()
    };
    if cli.no_scripts {
        config.tree_builder.scripting_enabled = false;
        config.script.scripting_enabled = false;
    }
    config
}

/// Body for a fetch, read relative to the document's directory.
fn load_subresource(base: &Path, url: &str) -> Result<String, String> {
    let path = base.join(url.trim_start_matches('/'));
    fs::read_to_string(&path).map_err(|err| format!("{}: {err}", path.display()))
}

struct Summary {
    dom: PatchDom,
    tokens: u64,
    lines: u32,
    nodes: u32,
    parse_errors: u64,
    fetches: usize,
    failed_fetches: usize,
    elapsed: Duration,
}

fn run(cli: &Cli) -> Result<Summary> {
    let source = fs::read(&cli.input).with_context(|| format!("reading {}", cli.input.display()))?;
    if cli.chunk_size == 0 {
        bail!("--chunk-size must be at least 1");
    }
    let base = cli
        .input
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let (bus, cmd_rx) = Bus::new();
    let Bus {
        cmd_tx,
        evt_rx,
        evt_tx,
    } = bus;
    let config = RuntimeConfig {
        parser: parser_config(cli),
    };
    let started = Instant::now();
    let runtime = start_parse_runtime_with_config(cmd_rx, evt_tx, config);

    cmd_tx.send(CoreCommand::ParseHtmlStart {
        tab_id: TAB,
        request_id: REQUEST,
    })?;
    for chunk in source.chunks(cli.chunk_size) {
        cmd_tx.send(CoreCommand::ParseHtmlChunk {
            tab_id: TAB,
            request_id: REQUEST,
            bytes: chunk.to_vec(),
        })?;
    }
    cmd_tx.send(CoreCommand::ParseHtmlDone {
        tab_id: TAB,
        request_id: REQUEST,
    })?;

    let mut dom = PatchDom::new();
    let mut fetches = 0;
    let mut failed_fetches = 0;
    let summary = loop {
        let evt = evt_rx.recv().context("parse runtime exited early")?;
        match evt {
            CoreEvent::DomPatches { patches, .. } => dom.apply_all(&patches)?,
            CoreEvent::FetchResource {
                resource_id, url, ..
            } => {
                fetches += 1;
                let body = load_subresource(&base, &url);
                if let Err(err) = &body {
                    failed_fetches += 1;
                    log::warn!(target: "docpump", "fetch failed: {err}");
                }
                cmd_tx.send(CoreCommand::ResourceLoaded {
                    tab_id: TAB,
                    request_id: REQUEST,
                    resource_id,
                    body,
                })?;
            }
            CoreEvent::ParseError { error, .. } => {
                log::warn!(target: "docpump", "runtime reported: {error}");
            }
            CoreEvent::ParseFinished {
                tokens,
                lines,
                nodes,
                parse_errors,
                ..
            } => {
                break Summary {
                    dom,
                    tokens,
                    lines,
                    nodes,
                    parse_errors,
                    fetches,
                    failed_fetches,
                    elapsed: started.elapsed(),
                };
            }
        }
    };

    drop(cmd_tx);
    runtime
        .join()
        .map_err(|_| anyhow::anyhow!("parse runtime panicked"))?;
    Ok(summary)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let summary = run(&cli)?;
    if cli.stats {
        println!("tokens:        {}", summary.tokens);
        println!("lines:         {}", summary.lines);
        println!("nodes:         {}", summary.nodes);
        println!("parse errors:  {}", summary.parse_errors);
        println!(
            "fetches:       {} ({} failed)",
            summary.fetches, summary.failed_fetches
        );
        println!("elapsed:       {:?}", summary.elapsed);
    } else {
        print!("{}", summary.dom.snapshot());
    }
    Ok(())
}
