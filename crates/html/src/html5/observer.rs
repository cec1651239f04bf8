//! Pump instrumentation hooks.

/// Side-effect-free observer of pump boundaries.
pub trait ParserObserver {
    /// A pump starts with `buffered_len` unconsumed bytes at tokenizer `line`.
    fn will_pump(&mut self, buffered_len: usize, line: u32) {
        let _ = (buffered_len, line);
    }

    fn did_pump(&mut self, line: u32) {
        let _ = line;
    }
}

/// Observer that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl ParserObserver for NoopObserver {}
